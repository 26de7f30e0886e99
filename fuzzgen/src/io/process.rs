//! Child process execution for validator commands.
//!
//! Output is captured on reader threads into shared buffers so a stuck pipe
//! never holds up the caller: once the child has exited (or been killed after
//! its timeout) the readers get a short grace period, after which whatever was
//! captured so far is returned.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How long readers may keep draining after the child is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_lossy(&self) -> String {
        lossy_with_notice("stdout", &self.stdout, self.stdout_truncated)
    }

    pub fn stderr_lossy(&self) -> String {
        lossy_with_notice("stderr", &self.stderr, self.stderr_truncated)
    }
}

fn lossy_with_notice(stream: &str, bytes: &[u8], truncated: usize) -> String {
    let mut text = String::from_utf8_lossy(bytes).into_owned();
    if truncated > 0 {
        text.push_str(&format!("\n[{stream} truncated {truncated} bytes]\n"));
    }
    text
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: usize,
}

impl Captured {
    fn push(&mut self, chunk: &[u8], limit: usize) {
        let keep = chunk.len().min(limit.saturating_sub(self.bytes.len()));
        self.bytes.extend_from_slice(&chunk[..keep]);
        self.truncated += chunk.len() - keep;
    }
}

type SharedCapture = Arc<Mutex<Captured>>;

/// Run `cmd` to completion or until `timeout` elapses, capturing at most
/// `output_limit_bytes` of each output stream.
///
/// On unix the child leads its own process group, and the whole group is
/// killed on timeout so helpers it spawned cannot keep the pipes open. The
/// call returns within `timeout` plus a short drain grace period.
#[instrument(skip_all, fields(timeout_ms = timeout.as_millis() as u64, output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

    let program = cmd.get_program().to_string_lossy().into_owned();
    debug!(%program, "spawning validator process");
    let mut child = cmd.spawn().map_err(|err| {
        error!(%err, %program, "failed to spawn command");
        anyhow::Error::new(err).context(format!("spawn {program}"))
    })?;

    let (done_tx, done_rx) = mpsc::channel();
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_capture = spawn_reader("stdout", stdout, output_limit_bytes, done_tx.clone())?;
    let stderr_capture = spawn_reader("stderr", stderr, output_limit_bytes, done_tx)?;

    let (status, timed_out) = wait_or_kill(&mut child, timeout)?;

    let drain_deadline = Instant::now() + DRAIN_GRACE;
    let mut pending = 2;
    while pending > 0 {
        let wait = drain_deadline.saturating_duration_since(Instant::now());
        match done_rx.recv_timeout(wait) {
            Ok((_, Ok(()))) => pending -= 1,
            Ok((stream, Err(err))) => return Err(err.context(format!("read {stream}"))),
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    pending,
                    "output pipes still open after command exit, keeping partial output"
                );
                kill_process_group(&child);
                break;
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(anyhow!("output reader thread panicked"));
            }
        }
    }

    let stdout = take_captured(&stdout_capture);
    let stderr = take_captured(&stderr_capture);
    if stdout.truncated > 0 || stderr.truncated > 0 {
        warn!(
            stdout_truncated = stdout.truncated,
            stderr_truncated = stderr.truncated,
            "output truncated"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout: stdout.bytes,
        stderr: stderr.bytes,
        stdout_truncated: stdout.truncated,
        stderr_truncated: stderr.truncated,
        timed_out,
    })
}

fn wait_or_kill(child: &mut Child, timeout: Duration) -> Result<(ExitStatus, bool)> {
    if let Some(status) = child.wait_timeout(timeout).context("wait for command")? {
        return Ok((status, false));
    }
    warn!(timeout_ms = timeout.as_millis() as u64, "command timed out, killing");
    kill_process_group(child);
    child.kill().context("kill command")?;
    let status = child.wait().context("wait command after kill")?;
    Ok((status, true))
}

fn spawn_reader<R>(
    stream: &'static str,
    mut reader: R,
    limit: usize,
    done: Sender<(&'static str, Result<()>)>,
) -> Result<SharedCapture>
where
    R: Read + Send + 'static,
{
    let capture = SharedCapture::default();
    let sink = Arc::clone(&capture);
    thread::Builder::new()
        .name(format!("fuzzgen-{stream}"))
        .spawn(move || {
            let mut chunk = [0u8; 8192];
            let result = loop {
                match reader.read(&mut chunk) {
                    Ok(0) => break Ok(()),
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(&chunk[..n], limit),
                    Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                    Err(err) => break Err(anyhow::Error::new(err)),
                }
            };
            // The receiver is gone once the caller stopped waiting.
            let _ = done.send((stream, result));
        })
        .with_context(|| format!("spawn {stream} reader"))?;
    Ok(capture)
}

fn take_captured(capture: &SharedCapture) -> Captured {
    std::mem::take(&mut *capture.lock().unwrap_or_else(PoisonError::into_inner))
}

/// Best-effort SIGKILL for every process in the child's group.
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let group = format!("-{}", child.id());
    let result = Command::new("kill")
        .args(["-s", "KILL", "--", &group])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match result {
        Ok(status) => debug!(pgid = child.id(), exit_code = ?status.code(), "signalled process group"),
        Err(err) => warn!(%err, pgid = child.id(), "could not signal process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_stdout_and_exit_status() {
        let output = run_command_with_timeout(
            sh("printf hello; printf oops >&2; exit 3"),
            Duration::from_secs(10),
            1_000,
        )
        .expect("run command");

        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stdout, b"hello");
        assert_eq!(output.stderr, b"oops");
        assert!(!output.timed_out);
    }

    #[test]
    fn truncates_output_beyond_limit() {
        let output = run_command_with_timeout(sh("printf 0123456789"), Duration::from_secs(10), 4)
            .expect("run command");

        assert_eq!(output.stdout, b"0123");
        assert_eq!(output.stdout_truncated, 6);
        assert!(output.stdout_lossy().contains("[stdout truncated 6 bytes]"));
    }

    #[test]
    fn kills_command_on_timeout() {
        let output =
            run_command_with_timeout(sh("exec sleep 5"), Duration::from_millis(100), 1_000)
                .expect("run command");

        assert!(output.timed_out);
    }

    #[test]
    fn timeout_also_stops_grandchildren_holding_the_pipes() {
        let started = Instant::now();
        let output = run_command_with_timeout(
            sh("sleep 4; exit 1"),
            Duration::from_millis(200),
            1_000,
        )
        .expect("run command");

        assert!(output.timed_out);
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn background_process_does_not_hold_up_a_finished_command() {
        let started = Instant::now();
        let output = run_command_with_timeout(
            sh("sleep 4 & printf done"),
            Duration::from_secs(10),
            1_000,
        )
        .expect("run command");

        assert!(!output.timed_out);
        assert_eq!(output.status.code(), Some(0));
        assert_eq!(output.stdout, b"done");
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let cmd = Command::new("fuzzgen-definitely-missing-binary");
        let err = run_command_with_timeout(cmd, Duration::from_secs(1), 1_000).unwrap_err();
        assert!(format!("{err:#}").contains("spawn fuzzgen-definitely-missing-binary"));
    }
}
