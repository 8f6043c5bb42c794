// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use skiff::deploy::{DeployEvent, EventKind};
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

impl OutputMode {
    pub fn from_flags(quiet: bool, json: bool) -> Self {
        if json {
            OutputMode::Json
        } else if quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }

    /// Whether child process output should be echoed to the terminal.
    pub fn echoes_commands(&self) -> bool {
        *self == OutputMode::Normal
    }
}

/// Handles CLI output based on the configured mode.
#[derive(Debug, Clone)]
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    fn elapsed_secs(&self) -> Option<f64> {
        self.start_time.map(|t| t.elapsed().as_secs_f64())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a pipeline event as it arrives.
    pub fn event(&self, event: &DeployEvent) {
        match self.mode {
            OutputMode::Normal => match event.kind {
                EventKind::Progress => println!("  → {}", event.message),
                EventKind::Error => eprintln!("  ✗ {}", event.message),
            },
            OutputMode::Quiet => {
                if event.kind == EventKind::Error {
                    eprintln!("{}", event.message);
                }
            }
            OutputMode::Json => self.json_line("event", event),
        }
    }

    /// Print a single line of data (log lines, detection results).
    pub fn line(&self, line: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => println!("{line}"),
            OutputMode::Json => self.json_line("line", &line),
        }
    }

    /// Print a structured value, as JSON in json mode and via `render` otherwise.
    pub fn value<T: Serialize>(&self, kind: &str, value: &T, render: impl FnOnce(&T) -> String) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => println!("{}", render(value)),
            OutputMode::Json => self.json_line(kind, value),
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => match self.elapsed_secs() {
                Some(elapsed) => println!("{message} ({elapsed:.1}s)"),
                None => println!("{message}"),
            },
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "success",
                    message,
                    duration_secs: self.elapsed_secs(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    println!("{json}");
                }
            }
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.elapsed_secs(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    fn json_line<T: Serialize + ?Sized>(&self, kind: &str, data: &T) {
        let line = JsonData { event: kind, data };
        if let Ok(json) = serde_json::to_string(&line) {
            println!("{json}");
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct JsonData<'a, T: Serialize + ?Sized> {
    event: &'a str,
    data: &'a T,
}
