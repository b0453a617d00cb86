//! Command execution primitives.
//!
//! Programs are always started with an explicit argument vector, never
//! through a shell, so argument values are passed through verbatim.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Output captured from a finished (or killed) process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.is_some_and(|s| s.success())
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }

    /// stdout followed by stderr, the way a terminal would show them.
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr.trim_end()),
            (false, true) => self.stdout.trim_end().to_string(),
            (true, false) => self.stderr.trim_end().to_string(),
            (true, true) => String::new(),
        }
    }
}

/// Run `program` with `args`, killing it if it outlives `timeout`.
///
/// Spawn and wait failures are returned as `Err`; a non-zero exit or a
/// timeout is reported through [`ProcessOutput`].
#[instrument(skip_all, fields(program = %program, timeout_secs = timeout.as_secs()))]
pub fn run_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
) -> std::io::Result<ProcessOutput> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    debug!(pid = child.id(), "spawned child process");

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_handle = thread::spawn(move || drain(stdout));
    let stderr_handle = thread::spawn(move || drain(stderr));

    let (status, timed_out) = match child.wait_timeout(timeout)? {
        Some(status) => (Some(status), false),
        None => {
            warn!("child process timed out, killing");
            (stop(&mut child), true)
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();

    debug!(exit_code = ?status.and_then(|s| s.code()), timed_out, "child process finished");
    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

/// Kill and reap a child that outlived its deadline. A failed kill is
/// logged; the child may have exited on its own in the meantime.
fn stop(child: &mut Child) -> Option<ExitStatus> {
    if let Err(e) = child.kill() {
        warn!(error = %e, "could not kill child process");
    }
    child.wait().ok()
}

fn drain<R: Read>(stream: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        let _ = stream.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Whether `program args` can be started and exits zero within `timeout`.
pub fn succeeds(program: &str, args: &[String], timeout: Duration) -> bool {
    run_with_timeout(program, args, timeout)
        .map(|out| out.success())
        .unwrap_or(false)
}
