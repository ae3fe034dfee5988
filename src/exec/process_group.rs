// src/exec/process_group.rs

//! Kill capability for a spawned test process and everything it forked.
//!
//! On unix every test binary is started as the leader of its own process
//! group, so signalling the negative group id reaches helpers that ping or
//! trace tools fork. Elsewhere there is no group to signal and the
//! supervisor falls back to killing the single child (degraded).

use crate::errors::Result;

/// Handle on the process group led by a spawned test binary.
///
/// `kill` is idempotent: a group that no longer exists is already in the
/// desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessGroup {
    pgid: i32,
}

impl ProcessGroup {
    /// Group led by `pid` (the child was spawned with `process_group(0)`).
    pub fn from_leader(pid: u32) -> Self {
        Self { pgid: pid as i32 }
    }

    pub fn id(&self) -> i32 {
        self.pgid
    }
}

#[cfg(unix)]
mod imp {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use tracing::{debug, warn};

    use super::ProcessGroup;
    use crate::errors::{Result, SpeedwatchError};

    impl ProcessGroup {
        /// Send SIGKILL to the whole group.
        ///
        /// ESRCH means the group is gone and counts as success. EPERM can be
        /// a stale answer for a group whose members already exited, so the
        /// group is checked again before the error is reported.
        pub fn kill(&self) -> Result<()> {
            let target = Pid::from_raw(-self.pgid);
            match kill(target, Signal::SIGKILL) {
                Ok(()) => {
                    debug!(pgid = self.pgid, "sent SIGKILL to process group");
                    Ok(())
                }
                Err(Errno::ESRCH) => {
                    debug!(pgid = self.pgid, "process group already gone");
                    Ok(())
                }
                Err(Errno::EPERM) => {
                    if self.is_alive() {
                        warn!(pgid = self.pgid, "permission denied killing live process group");
                        Err(SpeedwatchError::ProcessGroup {
                            pgid: self.pgid,
                            reason: Errno::EPERM.desc().to_string(),
                        })
                    } else {
                        debug!(pgid = self.pgid, "EPERM for exited process group; treating as killed");
                        Ok(())
                    }
                }
                Err(e) => Err(SpeedwatchError::ProcessGroup {
                    pgid: self.pgid,
                    reason: e.desc().to_string(),
                }),
            }
        }

        /// Signal-0 liveness check of the group.
        pub fn is_alive(&self) -> bool {
            match kill(Pid::from_raw(-self.pgid), None) {
                Ok(()) => true,
                Err(Errno::ESRCH) => false,
                // Members exist but belong to someone else (setuid tools).
                Err(Errno::EPERM) => true,
                Err(_) => false,
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use super::ProcessGroup;
    use crate::errors::Result;

    impl ProcessGroup {
        /// No process groups here; the supervisor kills the child itself.
        pub fn kill(&self) -> Result<()> {
            Ok(())
        }

        pub fn is_alive(&self) -> bool {
            false
        }
    }
}

/// Kill an optional group; `None` (no group support) is a no-op.
pub fn kill_group(group: Option<ProcessGroup>) -> Result<()> {
    match group {
        Some(g) => g.kill(),
        None => Ok(()),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn killing_missing_group_is_success() {
        // Far above any default pid_max.
        let group = ProcessGroup::from_leader(i32::MAX as u32 - 7);
        assert!(!group.is_alive());
        assert!(group.kill().is_ok());
        assert!(group.kill().is_ok());
    }

    #[test]
    fn kill_group_none_is_noop() {
        assert!(kill_group(None).is_ok());
    }
}
