//! Local-filesystem [`ExecutionContext`].
//!
//! Every path is resolved relative to the project root and rejected if it
//! escapes it. Commands run through `sh -c` with the project root as the
//! working directory, output capped per stream, and are killed when their
//! timeout expires.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use dbprov_core::analysis::{is_skipped_path, ProjectFiles, MAX_SCAN_BYTES};
use dbprov_core::context::{CommandOutput, ContextError, ExecutionContext, ShellCommand};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use walkdir::WalkDir;

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Directory names never descended into when collecting project files.
const PRUNED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".next",
    "dist",
    "build",
    "vendor",
    "__pycache__",
];

/// A project checked out on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a workspace-relative path, rejecting absolute paths and
    /// `..` segments that climb above the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ContextError> {
        let relative = Path::new(path);
        let mut resolved = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !resolved.pop() {
                        return Err(ContextError::OutsideWorkspace(path.to_string()));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(ContextError::OutsideWorkspace(path.to_string()));
                }
            }
        }
        Ok(self.root.join(resolved))
    }

    /// Read every source file of the project into a map keyed by
    /// workspace-relative path.
    ///
    /// Dependency, build and VCS directories are pruned; lockfiles, binary
    /// assets, non-UTF-8 files and files larger than the analyzer's scan cap
    /// are skipped.
    pub async fn collect_files(&self) -> Result<ProjectFiles, ContextError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || collect_files_blocking(&root))
            .await
            .map_err(|e| ContextError::Io(std::io::Error::other(e)))?
    }
}

fn collect_files_blocking(root: &Path) -> Result<ProjectFiles, ContextError> {
    if !root.is_dir() {
        return Err(ContextError::NotFound(root.display().to_string()));
    }

    let mut files = ProjectFiles::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_pruned_dir(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        if is_skipped_path(&relative) {
            continue;
        }
        let too_large = entry
            .metadata()
            .map(|meta| meta.len() > MAX_SCAN_BYTES as u64)
            .unwrap_or(true);
        if too_large {
            continue;
        }
        if let Ok(content) = std::fs::read_to_string(entry.path()) {
            files.insert(relative, content);
        }
    }

    tracing::debug!(root = %root.display(), count = files.len(), "Collected project files");
    Ok(files)
}

fn is_pruned_dir(entry: &walkdir::DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.file_type().is_dir() && PRUNED_DIRS.iter().any(|dir| *dir == name)
}

fn io_error(path: &str, err: std::io::Error) -> ContextError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ContextError::NotFound(path.to_string())
    } else {
        ContextError::Io(err)
    }
}

#[async_trait]
impl ExecutionContext for LocalWorkspace {
    async fn read_file(&self, path: &str) -> Result<String, ContextError> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| io_error(path, e))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), ContextError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ContextError::Io)?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(ContextError::Io)
    }

    async fn file_exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(full) => tokio::fs::try_exists(full).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn remove_file(&self, path: &str) -> Result<(), ContextError> {
        let full = self.resolve(path)?;
        tokio::fs::remove_file(&full)
            .await
            .map_err(|e| io_error(path, e))
    }

    async fn execute_command(&self, command: &ShellCommand) -> Result<CommandOutput, ContextError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&command.command)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &command.env_vars {
            cmd.env(key, value);
        }

        let start = Instant::now();
        tracing::debug!(command = %command.command, "Running workspace command");
        let mut child = cmd.spawn().map_err(ContextError::Io)?;

        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();
        let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
        let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

        // On timeout `child` is dropped, which kills the process.
        match tokio::time::timeout(command.timeout, child.wait()).await {
            Ok(Ok(status)) => {
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = stderr_task.await.unwrap_or_default();
                Ok(CommandOutput {
                    success: status.success(),
                    stdout: String::from_utf8_lossy(&stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr).into_owned(),
                    exit_code: status.code().unwrap_or(-1),
                })
            }
            Ok(Err(e)) => Err(ContextError::Io(e)),
            Err(_elapsed) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                tracing::warn!(command = %command.command, elapsed_ms, "Workspace command timed out");
                Err(ContextError::Timeout {
                    command: command.command.clone(),
                    elapsed_ms,
                })
            }
        }
    }
}

/// Read an entire output stream, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let _ = h.take(MAX_OUTPUT_BYTES).read_to_end(&mut buf).await;
    }
    buf
}
