// ABOUTME: Library root for skiff - exposes the orchestrator for the binary and tests.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod deploy;
pub mod error;
pub mod runtime;
pub mod types;
