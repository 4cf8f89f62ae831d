//! External process execution.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rosh_types::error::{Result, RoshError};

use crate::services::{LineSink, ProcessLauncher};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Time a foreground child gets to exit on its own after an interrupt.
const INTERRUPT_GRACE: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Interrupt flag shared between the signal handler and the launcher.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Consume a pending interrupt.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Background streams
// ---------------------------------------------------------------------------

/// A running background process and the thread draining its output.
pub struct StreamHandle {
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
}

impl StreamHandle {
    /// Wrap a child and its reader thread. Either may be absent (tests).
    pub fn new(child: Option<Child>, reader: Option<JoinHandle<()>>) -> Self {
        Self { child, reader }
    }

    pub fn is_running(&self) -> bool {
        self.reader.as_ref().is_some_and(|r| !r.is_finished())
    }

    /// Kill the process and wait for the reader. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                log::debug!("kill of pid {} failed: {e}", child.id());
            }
            if let Err(e) = child.wait() {
                log::debug!("wait for pid {} failed: {e}", child.id());
            }
        }
        if let Some(reader) = self.reader.take()
            && reader.join().is_err()
        {
            log::warn!("stream reader thread panicked");
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// System launcher
// ---------------------------------------------------------------------------

/// Runs tools on the host.
///
/// A foreground child shares the terminal, so Ctrl-C reaches it directly. The
/// shell's own handler only raises `cancel`; if the child is still alive after
/// a grace period it gets killed.
pub struct SystemLauncher {
    cancel: CancelToken,
}

impl SystemLauncher {
    pub fn new(cancel: CancelToken) -> Self {
        Self { cancel }
    }
}

impl ProcessLauncher for SystemLauncher {
    fn spawn(&self, executable: &Path, args: &[String], env: &[(String, String)]) -> Result<i32> {
        log::debug!("spawn {} {}", executable.display(), args.join(" "));
        self.cancel.take();

        let mut child = Command::new(executable)
            .args(args)
            .envs(env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                RoshError::Process(format!("failed to run {}: {e}", executable.display()))
            })?;

        let mut deadline: Option<Instant> = None;
        loop {
            if let Some(status) = child.try_wait()? {
                self.cancel.take();
                return Ok(status.code().unwrap_or(-1));
            }
            if self.cancel.take() && deadline.is_none() {
                deadline = Some(Instant::now() + INTERRUPT_GRACE);
            }
            if let Some(at) = deadline
                && Instant::now() >= at
            {
                log::debug!("killing pid {} after interrupt", child.id());
                child.kill()?;
                let status = child.wait()?;
                return Ok(status.code().unwrap_or(-1));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn stream(
        &self,
        executable: &Path,
        args: &[String],
        mut on_line: LineSink,
    ) -> Result<StreamHandle> {
        log::debug!("stream {} {}", executable.display(), args.join(" "));
        let mut cmd = Command::new(executable);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        // Own process group: terminal interrupts must not reach it.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|e| {
            RoshError::Process(format!("failed to run {}: {e}", executable.display()))
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RoshError::Process("child stdout not captured".into()))?;

        let reader = std::thread::Builder::new()
            .name("rosh-stream".into())
            .spawn(move || {
                for line in BufReader::new(stdout).lines().map_while(|l| l.ok()) {
                    on_line(&line);
                }
            })?;

        Ok(StreamHandle::new(Some(child), Some(reader)))
    }
}

/// Locate an executable on `PATH`.
pub fn which(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|full| is_executable(full))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn cancel_token_take_resets() {
        let t = CancelToken::new();
        assert!(!t.take());
        t.cancel();
        assert!(t.is_cancelled());
        assert!(t.take());
        assert!(!t.is_cancelled());
    }

    #[test]
    fn cancel_token_clones_share_state() {
        let a = CancelToken::new();
        let b = a.clone();
        b.cancel();
        assert!(a.is_cancelled());
    }

    #[cfg(unix)]
    #[test]
    fn which_finds_sh() {
        let sh = which("sh").expect("sh on PATH");
        assert!(sh.ends_with("sh"));
        assert!(which("definitely-not-a-rosh-tool").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn spawn_returns_exit_code() {
        let launcher = SystemLauncher::new(CancelToken::new());
        let code = launcher
            .spawn(Path::new("sh"), &["-c".into(), "exit 3".into()], &[])
            .unwrap();
        assert_eq!(code, 3);
    }

    #[cfg(unix)]
    #[test]
    fn spawn_passes_environment() {
        let launcher = SystemLauncher::new(CancelToken::new());
        let code = launcher
            .spawn(
                Path::new("sh"),
                &["-c".into(), "test \"$ROSH_TEST\" = yes".into()],
                &[("ROSH_TEST".into(), "yes".into())],
            )
            .unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn spawn_missing_executable_is_process_error() {
        let launcher = SystemLauncher::new(CancelToken::new());
        let err = launcher
            .spawn(Path::new("/nonexistent/rosh-tool"), &[], &[])
            .unwrap_err();
        assert!(matches!(err, RoshError::Process(_)));
    }

    #[cfg(unix)]
    #[test]
    fn stream_delivers_lines_and_stops() {
        let launcher = SystemLauncher::new(CancelToken::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut handle = launcher
            .stream(
                Path::new("sh"),
                &["-c".into(), "echo one; echo two".into()],
                Box::new(move |line| sink.lock().unwrap().push(line.to_string())),
            )
            .unwrap();

        let start = Instant::now();
        while handle.is_running() && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(POLL_INTERVAL);
        }
        handle.stop();
        handle.stop();
        assert_eq!(*seen.lock().unwrap(), vec!["one", "two"]);
        assert!(!handle.is_running());
    }

    #[cfg(unix)]
    #[test]
    fn stop_kills_long_running_stream() {
        let launcher = SystemLauncher::new(CancelToken::new());
        let mut handle = launcher
            .stream(Path::new("sleep"), &["30".into()], Box::new(|_| {}))
            .unwrap();
        assert!(handle.is_running());
        handle.stop();
        assert!(!handle.is_running());
    }
}
