// ABOUTME: Test support utilities.
// ABOUTME: Tracing setup, runtime discovery and project fixtures for integration tests.

use skiff::runtime::{BollardRuntime, RuntimeConfig, detect_local};
use std::path::Path;
use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("skiff=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Local runtime, or `None` when no socket is present.
#[allow(dead_code)]
pub fn local_runtime() -> Option<BollardRuntime> {
    let info = detect_local(&RuntimeConfig::default()).ok()?;
    BollardRuntime::connect(&info).ok()
}

/// Skip the test if no local runtime is available.
#[allow(unused_macros)]
macro_rules! require_runtime {
    () => {
        match support::local_runtime() {
            Some(rt) => rt,
            None => {
                eprintln!("Skipping test: no local container runtime found");
                return;
            }
        }
    };
}

/// Write `files` (relative path, contents) under `root`.
#[allow(dead_code)]
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }
}
