//! Script execution inside the working directory

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::path_guard::{absolute, resolve_in_workspace};
use super::{parse_args, ToolError, ToolErrorKind, ToolResult, ToolSettings, ToolTrait};

/// Runs a script with the configured interpreter, bounded by a timeout
pub struct RunPythonFileTool {
    workspace: PathBuf,
    timeout: Duration,
    interpreter: String,
    extension: String,
    language: String,
}

impl RunPythonFileTool {
    pub fn from_settings(workspace: PathBuf, settings: &ToolSettings) -> Self {
        Self {
            workspace,
            timeout: settings.exec_timeout,
            interpreter: settings.interpreter.clone(),
            extension: settings.script_extension.clone(),
            language: settings.script_language.clone(),
        }
    }

    pub async fn run(&self, file_path: &str, args: &[String]) -> ToolResult {
        let path = resolve_in_workspace(&self.workspace, file_path)
            .await
            .ok_or_else(|| {
                ToolError::new(
                    ToolErrorKind::OutsideWorkspace,
                    format!(
                        "Cannot execute \"{}\" as it is outside the permitted working directory",
                        file_path
                    ),
                )
            })?;

        if tokio::fs::metadata(&path).await.is_err() {
            return Err(ToolError::new(
                ToolErrorKind::NotFound,
                format!("File \"{}\" not found.", file_path),
            ));
        }
        if !file_path.ends_with(&format!(".{}", self.extension)) {
            return Err(ToolError::new(
                ToolErrorKind::WrongType,
                format!("\"{}\" is not a {} file.", file_path, self.language),
            ));
        }

        // The script is addressed relative to the workspace, which is also its cwd.
        let root = absolute(&self.workspace).unwrap_or_else(|| self.workspace.clone());
        let script = path
            .strip_prefix(&root)
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|_| path.clone());

        debug!("Running {} {:?} {:?}", self.interpreter, script, args);
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&script)
            .args(args)
            .current_dir(&root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(execution_error)?;
        let pid = child.id();
        let mut stdout = child.stdout.take().map(|out| tokio::spawn(read_all(out)));
        let mut stderr = child.stderr.take().map(|err| tokio::spawn(read_all(err)));

        // One deadline covers the script and every holder of its pipes.
        let deadline = Instant::now() + self.timeout;
        let exited = tokio::time::timeout_at(deadline, leader_exit(&mut child))
            .await
            .is_ok();

        // Only signal the group while the leader is unreaped and still owns the pgid.
        if !exited || LEADER_KEPT_AFTER_EXIT {
            kill_group(pid);
        }
        if !exited {
            warn!(
                "{} exceeded {}s, killed process group",
                file_path,
                self.timeout.as_secs()
            );
            let _ = child.kill().await;
            abort_readers(stdout, stderr);
            return Err(self.timed_out());
        }
        let status = child.wait().await.map_err(execution_error)?;

        let collected = tokio::time::timeout_at(deadline, async {
            (collect(&mut stdout).await, collect(&mut stderr).await)
        })
        .await;
        match collected {
            Ok((out, err)) => Ok(format_output(out.trim(), err.trim(), exit_code(&status))),
            Err(_) => {
                warn!(
                    "{} exited but its output was still held open after {}s",
                    file_path,
                    self.timeout.as_secs()
                );
                abort_readers(stdout, stderr);
                Err(self.timed_out())
            }
        }
    }

    fn timed_out(&self) -> ToolError {
        ToolError::new(
            ToolErrorKind::Timeout,
            format!(
                "Script execution timed out after {} seconds",
                self.timeout.as_secs()
            ),
        )
    }
}

/// Whether `leader_exit` returns with the leader still a zombie
const LEADER_KEPT_AFTER_EXIT: bool = cfg!(target_os = "linux");

/// Wait for the script to exit without reaping it
#[cfg(target_os = "linux")]
async fn leader_exit(child: &mut Child) {
    use nix::errno::Errno;
    use nix::sys::wait::{waitid, Id, WaitPidFlag};

    let Some(pid) = child.id() else {
        return;
    };
    let pid = nix::unistd::Pid::from_raw(pid as i32);
    let _ = tokio::task::spawn_blocking(move || loop {
        match waitid(Id::Pid(pid), WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT) {
            Err(Errno::EINTR) => continue,
            _ => break,
        }
    })
    .await;
}

/// Elsewhere exit is observed by reaping, so the group is left alone afterwards
#[cfg(not(target_os = "linux"))]
async fn leader_exit(child: &mut Child) {
    let _ = child.wait().await;
}

fn execution_error(err: std::io::Error) -> ToolError {
    ToolError::new(
        ToolErrorKind::Execution,
        format!("executing Python file: {}", err),
    )
}

async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut buf = Vec::new();
    let _ = reader.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

async fn collect(task: &mut Option<JoinHandle<String>>) -> String {
    match task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

fn abort_readers(stdout: Option<JoinHandle<String>>, stderr: Option<JoinHandle<String>>) {
    for task in [stdout, stderr].into_iter().flatten() {
        task.abort();
    }
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        let pgid = nix::unistd::Pid::from_raw(pid as i32);
        let _ = nix::sys::signal::killpg(pgid, nix::sys::signal::Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

fn exit_code(status: &std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// Combine trimmed output streams and a non-zero exit code
pub fn format_output(stdout: &str, stderr: &str, code: i32) -> String {
    if stdout.is_empty() && stderr.is_empty() && code == 0 {
        return "No output produced.".to_string();
    }

    let mut parts = Vec::new();
    if !stdout.is_empty() {
        parts.push(format!("STDOUT:\n{}", stdout));
    }
    if !stderr.is_empty() {
        parts.push(format!("STDERR:\n{}", stderr));
    }
    if code != 0 {
        parts.push(format!("Process exited with code {}", code));
    }
    parts.join("\n")
}

#[derive(Deserialize)]
struct RunArgs {
    file_path: String,
    #[serde(default)]
    args: Vec<Value>,
}

#[async_trait]
impl ToolTrait for RunPythonFileTool {
    fn name(&self) -> &str {
        "run_python_file"
    }
    fn description(&self) -> &str {
        "Executes a Python file with optional args, returning STDOUT/STDERR and exit code."
    }
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Relative path of the Python file to execute."
                },
                "args": {
                    "type": "array",
                    "description": "Optional list of string args to pass to the program.",
                    "items": { "type": "string" }
                }
            },
            "required": ["file_path"]
        })
    }
    async fn execute(&self, args: Value) -> ToolResult {
        let args: RunArgs = parse_args(self.name(), args)?;
        let argv: Vec<String> = args
            .args
            .into_iter()
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();
        self.run(&args.file_path, &argv).await
    }
}
