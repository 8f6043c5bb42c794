// ABOUTME: Narrow command runner seam for external tools (git, image builder).
// ABOUTME: Argument vector and working directory in, streamed output and exit code out.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// A command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Output from a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code of the command (-1 when killed by a signal).
    pub exit_code: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Last non-empty line of stderr, falling back to stdout.
    pub fn last_line(&self) -> &str {
        last_non_empty(&self.stderr)
            .or_else(|| last_non_empty(&self.stdout))
            .unwrap_or("")
    }
}

fn last_non_empty(s: &str) -> Option<&str> {
    s.lines().rev().map(str::trim).find(|l| !l.is_empty())
}

/// Runs external commands to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `cmd` and wait for it to exit.
    ///
    /// Only failure to launch or read the process is an `Err`; a non-zero exit
    /// is reported through [`CommandOutput::exit_code`].
    async fn run(&self, cmd: &CommandSpec) -> std::io::Result<CommandOutput>;
}

/// Runs commands as local child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    echo: bool,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self { echo: true }
    }
}

impl ProcessRunner {
    /// Runner that also copies child output to this process's stdout/stderr.
    pub fn new(echo: bool) -> Self {
        Self { echo }
    }
}

async fn pump<R: AsyncRead + Unpin>(
    reader: R,
    echo: bool,
    is_stderr: bool,
) -> std::io::Result<String> {
    let mut lines = BufReader::new(reader).lines();
    let mut collected = String::new();
    while let Some(line) = lines.next_line().await? {
        tracing::debug!("| {}", line);
        if echo {
            if is_stderr {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
        }
        collected.push_str(&line);
        collected.push('\n');
    }
    Ok(collected)
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, cmd: &CommandSpec) -> std::io::Result<CommandOutput> {
        tracing::debug!("running: {}", cmd);

        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &cmd.cwd {
            command.current_dir(dir);
        }

        let mut child = command.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("child stderr not captured"))?;

        let (stdout, stderr) = tokio::try_join!(
            pump(stdout, self.echo, false),
            pump(stderr, self.echo, true)
        )?;
        let status = child.wait().await?;

        Ok(CommandOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
        })
    }
}
