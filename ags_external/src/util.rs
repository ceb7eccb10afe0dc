use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, bounded};

use crate::error::{CollabError, Result};

/// Poll interval used while waiting on a collaborator process.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A collaborator command line: program plus fixed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Split a whitespace-separated command line. No shell quoting is applied.
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(CollabError::EmptyCommand)?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Captured result of a finished collaborator process.
#[derive(Debug)]
pub struct Finished {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Extra time allowed for output readers after the child has exited or been killed.
pub const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Kill the child and, on unix, every process in its group. Collaborators are
/// spawned as group leaders so wrapper scripts cannot leave a grandchild behind.
fn kill_tree(child: &mut Child, program: &str) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;
        if let Ok(pgid) = i32::try_from(child.id())
            && let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL)
        {
            tracing::debug!(program, error = %e, "killpg failed; killing child only");
        }
    }
    if let Err(e) = child.kill() {
        tracing::warn!(program, error = %e, "failed to kill timed-out collaborator");
    }
}

/// Wait for `child` to exit, or kill its process group once `timeout` expires.
/// Sleeps `poll_interval` between checks to avoid spinning.
pub fn wait_with_timeout(
    child: &mut Child,
    program: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            kill_tree(child, program);
            let _ = child.wait();
            return Err(CollabError::Timeout {
                program: program.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }
        std::thread::sleep(poll_interval);
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<String> {
    let (tx, rx) = bounded(1);
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut p) = pipe {
            let _ = p.read_to_end(&mut buf);
        }
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Collect drained output, giving up at `deadline`. A descendant that escaped
/// the kill may still hold the pipe; its reader thread is left to finish alone.
fn collect(rx: &Receiver<String>, program: &str, stream: &str, deadline: Instant) -> String {
    match rx.recv_deadline(deadline) {
        Ok(s) => s,
        Err(_) => {
            tracing::warn!(program, stream, "collaborator output still open; dropping it");
            String::new()
        }
    }
}

/// Run `spec` to completion with a bounded wait and capture its output.
/// Pipes are drained on helper threads so a chatty child cannot block on a full pipe.
/// The call returns no later than `timeout` plus `DRAIN_GRACE`.
pub fn run_command(spec: &CommandSpec, timeout: Duration) -> Result<Finished> {
    let started = Instant::now();
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    tracing::debug!(program = %spec.program, args = ?spec.args, "spawning collaborator");
    let mut child = cmd.spawn().map_err(|source| CollabError::Spawn {
        program: spec.program.clone(),
        source,
    })?;

    let out = drain(child.stdout.take());
    let err = drain(child.stderr.take());
    let status = wait_with_timeout(&mut child, &spec.program, timeout, POLL_INTERVAL);
    let drain_deadline = Instant::now().max(started + timeout) + DRAIN_GRACE;
    let stdout = collect(&out, &spec.program, "stdout", drain_deadline);
    let stderr = collect(&err, &spec.program, "stderr", drain_deadline);
    let status = status?;
    Ok(Finished {
        status,
        stdout,
        stderr,
    })
}

/// Like `run_command`, but a non-zero exit becomes `CollabError::Exit`.
pub fn run_checked(spec: &CommandSpec, timeout: Duration) -> Result<String> {
    let done = run_command(spec, timeout)?;
    if !done.status.success() {
        return Err(CollabError::Exit {
            program: spec.program.clone(),
            status: done.status.to_string(),
            stderr: done.stderr.trim().to_string(),
        });
    }
    Ok(done.stdout)
}
