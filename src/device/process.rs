//! System process runner
//!
//! Runs helper binaries with `std::process`, draining stdout and stderr on
//! reader threads so a chatty child can never block on a full pipe. The
//! parent polls the child until it exits or the timeout passes; a timed-out
//! child is killed and given a short grace period to be reaped before
//! control returns to the caller.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use log::{debug, trace, warn};

use crate::device::traits::{CommandOutput, ProcessRunner};

/// How often the child is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default time a killed child gets to exit before we stop waiting for it
const DEFAULT_KILL_GRACE: Duration = Duration::from_millis(500);

/// `ProcessRunner` backed by real OS processes
#[derive(Debug, Clone)]
pub struct SystemProcessRunner {
    kill_grace: Duration,
}

impl SystemProcessRunner {
    pub fn new() -> Self {
        Self {
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    /// Set the grace period granted to killed or exiting children
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn kill_grace(&self) -> Duration {
        self.kill_grace
    }

    /// Kill a child and wait (bounded) for it to go away
    fn kill_child(&self, mut child: Child) {
        if let Err(e) = child.kill() {
            // Already exited between the last poll and the kill
            trace!("kill failed: {}", e);
        }

        let deadline = Instant::now() + self.kill_grace;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to reap killed process: {}", e);
                    return;
                }
            }
        }

        // Still around after the grace period: reap it off the caller's thread
        warn!(
            "Process {} did not exit within grace period after kill",
            child.id()
        );
        thread::spawn(move || {
            let _ = child.wait();
        });
    }
}

impl Default for SystemProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, program: &Path, args: &[&str], timeout: Duration) -> CommandOutput {
        trace!("exec: {} {}", program.display(), args.join(" "));

        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                let reason = spawn_failure_reason(&e);
                debug!("Could not start {}: {}", program.display(), reason);
                return CommandOutput::spawn_failed(&reason);
            }
        };

        let stdout_rx = spawn_reader(child.stdout.take());
        let stderr_rx = spawn_reader(child.stderr.take());

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break None;
                    }
                    thread::sleep(POLL_INTERVAL.min(deadline - now));
                }
                Err(e) => {
                    warn!("Failed to poll {}: {}", program.display(), e);
                    self.kill_child(child);
                    return CommandOutput::signaled("", &e.to_string());
                }
            }
        };

        let Some(status) = status else {
            debug!(
                "{} {} timed out after {:?}, killing",
                program.display(),
                args.join(" "),
                timeout
            );
            self.kill_child(child);
            return CommandOutput::timed_out();
        };

        // Pipes close when the child exits; a grandchild still holding them
        // must not stall the caller past the grace period.
        let drain_deadline = Instant::now() + self.kill_grace;
        let stdout = collect_output(&stdout_rx, drain_deadline);
        let stderr = collect_output(&stderr_rx, drain_deadline);

        match status.code() {
            Some(code) => CommandOutput::exited(code, &stdout, &stderr),
            None => CommandOutput::signaled(&stdout, &stderr),
        }
    }
}

/// Read a pipe to EOF on a background thread
fn spawn_reader<P>(pipe: Option<P>) -> Receiver<Vec<u8>>
where
    P: Read + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            let mut buf = Vec::new();
            if let Err(e) = pipe.read_to_end(&mut buf) {
                trace!("pipe read error: {}", e);
            }
            let _ = tx.send(buf);
        });
    }
    rx
}

fn collect_output(rx: &Receiver<Vec<u8>>, deadline: Instant) -> String {
    rx.recv_deadline(deadline)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn spawn_failure_reason(err: &std::io::Error) -> String {
    match err.kind() {
        std::io::ErrorKind::NotFound => format!("binary not found ({})", err),
        std::io::ErrorKind::PermissionDenied => format!("permission denied ({})", err),
        _ => err.to_string(),
    }
}
