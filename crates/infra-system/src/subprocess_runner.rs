// Subprocess runner
// reason: tokio for async process management, nix for process-group signals
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use reconbridge_core::port::{ExecutionError, ProcessOutput, ProcessRunner, ProcessSpec};

/// How long to keep reading pipes after a timed-out process was killed
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Runs external tools as child processes.
///
/// Each child gets its own process group. A guard kills that whole group on
/// every exit path that does not end in a clean exit (timeout, I/O error,
/// caller dropping the future), so tools that fork helpers cannot outlive
/// the call.
#[derive(Debug, Clone, Default)]
pub struct SubprocessRunner {
    env_allowlist: Option<Vec<String>>,
}

impl SubprocessRunner {
    /// Runner whose children inherit the full environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Only pass the listed environment variables to children
    ///
    /// # Example
    /// ```ignore
    /// let runner = SubprocessRunner::new()
    ///     .with_env_allowlist(vec!["PATH".to_string(), "HOME".to_string()]);
    /// ```
    pub fn with_env_allowlist(mut self, allowlist: Vec<String>) -> Self {
        self.env_allowlist = Some(allowlist);
        self
    }

    /// Filter environment variables to allowlist only
    fn filter_env<I>(&self, vars: I) -> Option<Vec<(String, String)>>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let allowlist = self.env_allowlist.as_ref()?;
        Some(
            vars.into_iter()
                .filter(|(k, _)| allowlist.contains(k))
                .collect(),
        )
    }

    fn build_command(&self, spec: &ProcessSpec) -> Command {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        command.process_group(0);

        if let Some(env) = self.filter_env(std::env::vars()) {
            command.env_clear().envs(env);
        }
        command
    }
}

/// Kills the child's process group when dropped, unless disarmed
struct ProcessGroupGuard {
    pgid: Option<i32>,
}

impl ProcessGroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.and_then(|pid| i32::try_from(pid).ok()),
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }

    fn kill_now(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill_now();
    }
}

#[cfg(unix)]
fn kill_group(pgid: i32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) => debug!(pgid = %pgid, "Killed process group"),
        Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid = %pgid, error = %e, "Failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: i32) {
    // kill_on_drop covers the direct child
}

/// Exited but not yet reaped (possibly by someone else, e.g. init)
#[cfg(target_os = "linux")]
fn is_zombie(pid: i32) -> bool {
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .ok()
        .and_then(|stat| {
            let (_, rest) = stat.rsplit_once(')')?;
            rest.trim_start().chars().next()
        })
        .map(|state| state == 'Z' || state == 'X')
        .unwrap_or(false)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_zombie(_pid: i32) -> bool {
    false
}

async fn read_into<R: AsyncRead + Unpin>(pipe: &mut Option<R>, buf: &mut Vec<u8>) -> std::io::Result<()> {
    if let Some(pipe) = pipe.as_mut() {
        pipe.read_to_end(buf).await?;
    }
    Ok(())
}

fn lossy(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf).into_owned()
}

#[async_trait]
impl ProcessRunner for SubprocessRunner {
    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ExecutionError> {
        let started = Instant::now();
        let timeout_ms = spec.timeout.as_millis() as u64;

        info!(
            program = %spec.program,
            args = ?spec.args,
            timeout_ms = %timeout_ms,
            "Starting subprocess execution"
        );

        let mut child = self
            .build_command(spec)
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed(format!("{}: {}", spec.program, e)))?;

        let pid = child.id();
        let mut group = ProcessGroupGuard::new(pid);
        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();

        let collected = timeout(spec.timeout, async {
            tokio::try_join!(
                child.wait(),
                read_into(&mut stdout, &mut out_buf),
                read_into(&mut stderr, &mut err_buf),
            )
        })
        .await;

        match collected {
            Ok(Ok((status, _, _))) => {
                // Leader exited and both pipes hit EOF
                group.disarm();
                let duration_ms = started.elapsed().as_millis() as i64;

                info!(
                    program = %spec.program,
                    pid = ?pid,
                    duration_ms = %duration_ms,
                    exit_code = ?status.code(),
                    "Subprocess execution completed"
                );

                Ok(ProcessOutput {
                    pid,
                    exit_code: status.code(),
                    duration_ms,
                    stdout: lossy(&out_buf),
                    stderr: lossy(&err_buf),
                })
            }
            Ok(Err(e)) => Err(ExecutionError::IoError(e.to_string())),
            Err(_) => {
                warn!(program = %spec.program, pid = ?pid, timeout_ms = %timeout_ms, "Subprocess timed out, killing");

                group.kill_now();
                if let Err(e) = child.kill().await {
                    debug!(pid = ?pid, error = %e, "Child already gone");
                }

                let _ = timeout(DRAIN_TIMEOUT, async {
                    let _ = tokio::join!(
                        read_into(&mut stdout, &mut out_buf),
                        read_into(&mut stderr, &mut err_buf),
                    );
                })
                .await;

                debug!(
                    pid = ?pid,
                    stdout_bytes = out_buf.len(),
                    stderr_bytes = err_buf.len(),
                    "Discarded partial output"
                );

                Err(ExecutionError::Timeout(timeout_ms))
            }
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        #[cfg(unix)]
        {
            use nix::sys::signal::kill;
            use nix::unistd::Pid;

            let Ok(pid) = i32::try_from(pid) else {
                return false;
            };
            // Signal 0 checks if process exists without actually sending a signal
            kill(Pid::from_raw(pid), None).is_ok() && !is_zombie(pid)
        }

        #[cfg(not(unix))]
        {
            let _ = pid;
            false
        }
    }
}
