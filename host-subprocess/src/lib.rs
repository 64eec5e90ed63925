//! The subprocess runner (§4.11): isolates short-lived engine/checker/master
//! invocations behind a serialized call point, so the main service's network
//! sockets never leak into a child's file descriptor table and concurrent
//! callers queue rather than racing to spawn.
//!
//! The source isolates this behind a long-lived forked helper process talking
//! over a pipe, because in C++ newly-`accept`ed file descriptors cannot
//! reliably be marked close-on-exec ahead of a `fork`. `tokio::process::Command`
//! sets `CLOEXEC` on its own plumbing fds by construction, so that isolation
//! layer can be omitted per the source's own design note (§9) — this crate
//! keeps the serialization and the graded-shutdown contract (§5) without the
//! extra process hop.

use host_core::{HostError, HostResult};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::Mutex;

pub use host_core::{SUBPROCESS_KILL_AFTER_MS, SUBPROCESS_TERM_AFTER_MS};

/// A command to execute (mirrors the source's `ProcessRunner::Command`).
#[derive(Debug, Clone)]
pub struct Command {
    pub program: String,
    pub args: Vec<String>,
    pub work_directory: Option<String>,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_directory: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn work_directory(mut self, dir: impl Into<String>) -> Self {
        self.work_directory = Some(dir.into());
        self
    }
}

/// Exit classification (source's `ProcessRunner::run` doc comment):
/// 0..255 for a regular exit, 1000+ for signal death, 1999 for unknown.
#[derive(Debug, Clone)]
pub struct Output {
    pub stdout: String,
    pub exit_code: i32,
}

/// Serializes invocations through an internal mutex (§4.11 "concurrent
/// callers queue on a mutex internal to the runner") and tracks the
/// currently-running child so shutdown can escalate against it.
#[derive(Default)]
pub struct ProcessRunner {
    serialize: Mutex<()>,
    current_pid: Arc<Mutex<Option<u32>>>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run(&self, cmd: &Command) -> HostResult<Output> {
        let _permit = self.serialize.lock().await;
        log::debug!("[subprocess] running {} {:?}", cmd.program, cmd.args);

        let mut builder = tokio::process::Command::new(&cmd.program);
        builder.args(&cmd.args).stdout(Stdio::piped()).stderr(Stdio::null());
        if let Some(dir) = &cmd.work_directory {
            builder.current_dir(dir);
        }

        let mut child: Child = builder
            .spawn()
            .map_err(|e| HostError::BadRequest(format!("failed to spawn {}: {e}", cmd.program)))?;

        if let Some(pid) = child.id() {
            *self.current_pid.lock().await = Some(pid);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| HostError::BadRequest(format!("subprocess io error: {e}")))?;

        *self.current_pid.lock().await = None;

        let exit_code = classify_exit(&output.status);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        log::debug!("[subprocess] {} exited {exit_code}", cmd.program);
        Ok(Output { stdout, exit_code })
    }

    /// Stops whatever is currently running via the graded escalation of §5:
    /// a grace period, then TERM, then KILL. No-op if nothing is running.
    pub async fn shutdown(&self) {
        let Some(pid) = *self.current_pid.lock().await else {
            return;
        };
        log::info!("[subprocess] shutting down, pid {pid} still running");
        tokio::time::sleep(Duration::from_millis(host_core::SUBPROCESS_TERM_AFTER_MS)).await;
        if self.current_pid.lock().await.is_none() {
            return;
        }
        send_signal(pid, Signal::Term);
        tokio::time::sleep(Duration::from_millis(
            host_core::SUBPROCESS_KILL_AFTER_MS - host_core::SUBPROCESS_TERM_AFTER_MS,
        ))
        .await;
        if self.current_pid.lock().await.is_none() {
            return;
        }
        send_signal(pid, Signal::Kill);
    }
}

enum Signal {
    Term,
    Kill,
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: Signal) {
    let sig = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // SAFETY: sending a signal to a pid we observed as our own child's is well-defined;
    // a stale pid simply yields ESRCH, which we do not treat as fatal.
    unsafe {
        libc::kill(pid as libc::pid_t, sig);
    }
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, _signal: Signal) {}

fn classify_exit(status: &std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 1000 + signal;
        }
    }
    1999
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_and_captures_stdout() {
        let runner = ProcessRunner::new();
        let cmd = Command::new("echo").arg("hi");
        let output = runner.run(&cmd).await.unwrap();
        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout.trim(), "hi");
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported() {
        let runner = ProcessRunner::new();
        let cmd = Command::new("sh").arg("-c").arg("exit 3");
        let output = runner.run(&cmd).await.unwrap();
        assert_eq!(output.exit_code, 3);
    }

    #[tokio::test]
    async fn calls_are_serialized() {
        let runner = Arc::new(ProcessRunner::new());
        let a = runner.clone();
        let b = runner.clone();
        let (r1, r2) = tokio::join!(
            a.run(&Command::new("echo").arg("a")),
            b.run(&Command::new("echo").arg("b")),
        );
        assert_eq!(r1.unwrap().exit_code, 0);
        assert_eq!(r2.unwrap().exit_code, 0);
    }
}
