//! Unix process control via kill(2)

use super::{PlatformError, ProcessProbe};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::debug;

pub struct UnixProcessProbe;

impl UnixProcessProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UnixProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Only positive PIDs address a single process; 0 and negatives address groups.
fn to_pid(pid: u32) -> Option<Pid> {
    i32::try_from(pid).ok().filter(|raw| *raw > 0).map(Pid::from_raw)
}

impl ProcessProbe for UnixProcessProbe {
    fn is_alive(&self, pid: u32) -> bool {
        let Some(target) = to_pid(pid) else {
            return false;
        };

        match kill(target, None::<Signal>) {
            Ok(()) => true,
            // exists, but belongs to someone else
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    fn terminate(&self, pid: u32) -> Result<(), PlatformError> {
        let target = to_pid(pid).ok_or_else(|| PlatformError::SignalError {
            pid,
            message: "not a valid process id".to_string(),
        })?;

        match kill(target, Signal::SIGTERM) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => {
                debug!("Process {} already gone", pid);
                Ok(())
            }
            Err(e) => Err(PlatformError::SignalError {
                pid,
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_current_process_is_alive() {
        assert!(UnixProcessProbe::new().is_alive(std::process::id()));
    }

    #[test]
    fn test_invalid_pids_not_alive() {
        let probe = UnixProcessProbe::new();
        assert!(!probe.is_alive(0));
        assert!(!probe.is_alive(u32::MAX));
    }

    #[test]
    fn test_terminate_rejects_group_pid() {
        let err = UnixProcessProbe::new().terminate(0).unwrap_err();
        assert!(matches!(err, PlatformError::SignalError { pid: 0, .. }));
    }

    #[test]
    fn test_terminate_child() {
        let probe = UnixProcessProbe::new();
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();
        assert!(probe.is_alive(pid));

        probe.terminate(pid).unwrap();
        child.wait().unwrap();
        assert!(!probe.is_alive(pid));

        // reaped and gone: terminating again is a no-op
        probe.terminate(pid).unwrap();
    }
}
