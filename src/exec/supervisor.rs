// src/exec/supervisor.rs

//! Spawn, watch and terminate a single test process.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{Result, SpeedwatchError};
use crate::exec::process_group::{kill_group, ProcessGroup};

/// What to run: program and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

}

/// A running test binary isolated in its own process group.
///
/// Dropping a handle whose process has not been reaped kills the group, so
/// an outer timeout that drops the future never leaks the process.
#[derive(Debug)]
pub struct SupervisedProcess {
    program: String,
    child: Child,
    group: Option<ProcessGroup>,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    reaped: bool,
}

impl SupervisedProcess {
    /// Spawn `spec` with piped stdout/stderr.
    ///
    /// Stderr is drained in the background and logged at debug so the pipe
    /// never fills.
    pub fn spawn(spec: &ProcessSpec) -> Result<Self> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| SpeedwatchError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let group = if cfg!(unix) {
            child.id().map(ProcessGroup::from_leader)
        } else {
            None
        };

        info!(
            program = %spec.program,
            args = ?spec.args,
            pid = ?child.id(),
            "spawned test process"
        );

        if let Some(stderr) = child.stderr.take() {
            let program = spec.program.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(program = %program, "stderr: {}", line);
                }
            });
        }

        let stdout = child.stdout.take().map(|s| BufReader::new(s).lines());

        Ok(Self {
            program: spec.program.clone(),
            child,
            group,
            stdout,
            reaped: false,
        })
    }

    pub fn group(&self) -> Option<ProcessGroup> {
        self.group
    }

    /// Forcefully terminate the process and its group.
    ///
    /// Safe to call any number of times, including after the process
    /// exited.
    pub fn kill(&mut self) -> Result<()> {
        let group_result = kill_group(self.group);

        if !self.reaped {
            // Covers platforms without process groups, and a leader that
            // left its group.
            if let Err(e) = self.child.start_kill() {
                debug!(program = %self.program, error = %e, "start_kill on child failed");
            }
        }

        group_result
    }

    /// Feed stdout lines to `on_line` until the process exits.
    ///
    /// Lines are delivered as the tool prints them. The process group is
    /// killed before returning if `cancel` fires ([`SpeedwatchError::Cancelled`])
    /// or `deadline` passes ([`SpeedwatchError::Timeout`]).
    ///
    /// Exit of the tool itself ends the run even when a forked helper still
    /// holds stdout open: the group is swept, then whatever is left in the
    /// pipe is delivered before the status is returned.
    pub async fn run<F>(
        &mut self,
        deadline: Duration,
        cancel: &CancellationToken,
        mut on_line: F,
    ) -> Result<ExitStatus>
    where
        F: FnMut(&str),
    {
        let sleep = tokio::time::sleep(deadline);
        tokio::pin!(sleep);

        let mut stdout = self.stdout.take();

        let status = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!(program = %self.program, "cancellation requested; killing process group");
                    self.terminate();
                    return Err(SpeedwatchError::Cancelled);
                }

                _ = &mut sleep => {
                    warn!(program = %self.program, ?deadline, "deadline exceeded; killing process group");
                    self.terminate();
                    return Err(SpeedwatchError::Timeout {
                        program: self.program.clone(),
                        after: deadline,
                    });
                }

                line = next_line(&mut stdout) => {
                    match line {
                        Ok(Some(line)) => on_line(&line),
                        Ok(None) => stdout = None,
                        Err(e) => {
                            debug!(program = %self.program, error = %e, "stdout read failed; ignoring rest");
                            stdout = None;
                        }
                    }
                }

                status = self.child.wait() => {
                    let status = status?;
                    self.reaped = true;
                    break status;
                }
            }
        };

        // Sweep anything the tool left behind in its group. This also closes
        // pipe ends inherited by forked helpers.
        if let Err(e) = kill_group(self.group) {
            debug!(program = %self.program, error = %e, "post-exit group sweep failed");
        }

        while stdout.is_some() {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Err(SpeedwatchError::Cancelled),

                _ = &mut sleep => {
                    warn!(program = %self.program, "stdout still open after exit; dropping rest");
                    break;
                }

                line = next_line(&mut stdout) => {
                    match line {
                        Ok(Some(line)) => on_line(&line),
                        Ok(None) => stdout = None,
                        Err(e) => {
                            debug!(program = %self.program, error = %e, "stdout read failed; ignoring rest");
                            stdout = None;
                        }
                    }
                }
            }
        }

        info!(
            program = %self.program,
            exit_code = ?status.code(),
            success = status.success(),
            "test process exited"
        );
        Ok(status)
    }

    fn terminate(&mut self) {
        if let Err(e) = self.kill() {
            warn!(program = %self.program, error = %e, "failed to kill process group");
        }
    }
}

impl Drop for SupervisedProcess {
    fn drop(&mut self) {
        if !self.reaped {
            self.terminate();
        }
    }
}

async fn next_line(
    lines: &mut Option<Lines<BufReader<ChildStdout>>>,
) -> std::io::Result<Option<String>> {
    match lines {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}
