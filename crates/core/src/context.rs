//! The narrow workspace interface every strategy and the orchestrator
//! depend on.
//!
//! [`ExecutionContext`] exposes file read/write/exists/remove and shell
//! command execution for one project workspace. The engine crate provides
//! a local-filesystem implementation; [`MemoryContext`] is an in-memory
//! one with scripted command responses, used by tests and dry runs.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default wall-clock limit for a shell command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// A shell command to run inside the project workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    /// Command line passed to `sh -c`.
    pub command: String,
    /// Additional environment variables for the child process.
    pub env_vars: Vec<(String, String)>,
    /// Maximum wall-clock time before the process is killed.
    pub timeout: Duration,
}

impl ShellCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            env_vars: Vec::new(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// `-1` if the process was killed by a signal.
    pub exit_code: i32,
}

impl CommandOutput {
    /// Stdout and stderr joined, for pattern matching on tool output.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Errors raised by an execution context.
#[derive(Debug)]
pub enum ContextError {
    /// The path does not exist.
    NotFound(String),
    /// The path resolves outside the project workspace.
    OutsideWorkspace(String),
    /// The command exceeded its timeout and was killed.
    Timeout { command: String, elapsed_ms: u64 },
    /// An I/O error occurred while touching the filesystem or spawning.
    Io(std::io::Error),
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "File not found: {path}"),
            Self::OutsideWorkspace(path) => write!(f, "Path escapes the workspace: {path}"),
            Self::Timeout {
                command,
                elapsed_ms,
            } => write!(f, "Command `{command}` timed out after {elapsed_ms}ms"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for ContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// File and shell access to a single project workspace.
///
/// Paths are relative to the workspace root.
#[async_trait]
pub trait ExecutionContext: Send + Sync {
    async fn read_file(&self, path: &str) -> Result<String, ContextError>;

    async fn write_file(&self, path: &str, content: &str) -> Result<(), ContextError>;

    async fn file_exists(&self, path: &str) -> bool;

    async fn remove_file(&self, path: &str) -> Result<(), ContextError>;

    async fn execute_command(&self, command: &ShellCommand) -> Result<CommandOutput, ContextError>;

    /// Read a file, treating a missing file as `None`.
    async fn read_optional(&self, path: &str) -> Result<Option<String>, ContextError> {
        match self.read_file(path).await {
            Ok(content) => Ok(Some(content)),
            Err(ContextError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory context
// ---------------------------------------------------------------------------

/// In-memory [`ExecutionContext`].
///
/// Commands are answered from a script of `(prefix, output)` pairs: the
/// first entry whose prefix matches the start of the command line wins.
/// Unmatched commands succeed with empty output. Every executed command is
/// recorded and can be inspected with [`MemoryContext::commands`].
#[derive(Debug, Default)]
pub struct MemoryContext {
    files: Mutex<BTreeMap<String, String>>,
    responses: Mutex<Vec<(String, CommandOutput)>>,
    executed: Mutex<Vec<ShellCommand>>,
}

impl MemoryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let ctx = Self::new();
        {
            let mut map = lock(&ctx.files);
            for (path, content) in files {
                map.insert(path.into(), content.into());
            }
        }
        ctx
    }

    /// Script the output for every command starting with `prefix`.
    pub fn respond(&self, prefix: impl Into<String>, output: CommandOutput) {
        lock(&self.responses).push((prefix.into(), output));
    }

    /// Script a failing command with the given stderr.
    pub fn fail(&self, prefix: impl Into<String>, stderr: impl Into<String>) {
        self.respond(
            prefix,
            CommandOutput {
                success: false,
                stdout: String::new(),
                stderr: stderr.into(),
                exit_code: 1,
            },
        );
    }

    /// Snapshot of every file.
    pub fn files(&self) -> BTreeMap<String, String> {
        lock(&self.files).clone()
    }

    pub fn file(&self, path: &str) -> Option<String> {
        lock(&self.files).get(path).cloned()
    }

    /// Command lines executed so far, in order.
    pub fn commands(&self) -> Vec<String> {
        lock(&self.executed)
            .iter()
            .map(|cmd| cmd.command.clone())
            .collect()
    }

    /// Full commands executed so far, including their environment.
    pub fn executed(&self) -> Vec<ShellCommand> {
        lock(&self.executed).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // A poisoned lock only means another test thread panicked.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ExecutionContext for MemoryContext {
    async fn read_file(&self, path: &str) -> Result<String, ContextError> {
        lock(&self.files)
            .get(path)
            .cloned()
            .ok_or_else(|| ContextError::NotFound(path.to_string()))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), ContextError> {
        lock(&self.files).insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn file_exists(&self, path: &str) -> bool {
        let files = lock(&self.files);
        if files.contains_key(path) {
            return true;
        }
        // Directories exist implicitly when any file lives beneath them.
        let dir = format!("{}/", path.trim_end_matches('/'));
        files.keys().any(|key| key.starts_with(&dir))
    }

    async fn remove_file(&self, path: &str) -> Result<(), ContextError> {
        lock(&self.files)
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| ContextError::NotFound(path.to_string()))
    }

    async fn execute_command(&self, command: &ShellCommand) -> Result<CommandOutput, ContextError> {
        lock(&self.executed).push(command.clone());
        let responses = lock(&self.responses);
        let scripted = responses
            .iter()
            .find(|(prefix, _)| command.command.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone());
        Ok(scripted.unwrap_or(CommandOutput {
            success: true,
            ..CommandOutput::default()
        }))
    }
}
