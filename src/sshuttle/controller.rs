//! Profile lifecycle: start, stop, restart, status
//!
//! A profile is RUNNING when its PID file exists and the recorded process
//! is alive, and STOPPED otherwise. The controller never owns the tunnel
//! process: sshuttle daemonizes and reports its own PID through the PID
//! file, and every action starts from what is on disk.
//!
//! # Known races
//!
//! Starting a profile that is already running is not prevented here;
//! sshuttle refuses a PID file that names a live process, but two
//! invocations racing on the same profile can still interleave. The PID
//! file is a liveness hint, not a lock.

use super::launcher::{LaunchError, Launcher};
use super::pidfile::{PidFileError, PidFileStore};
use crate::config::Config;
use crate::endpoint::Endpoint;
use crate::platform::{PlatformError, ProcessProbe};
use std::fmt;
use std::path::{self, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Delay between liveness checks while waiting for a tunnel to exit
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("No endpoint by name '{0}'")]
    UnknownProfile(String),
    #[error(transparent)]
    PidFile(#[from] PidFileError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("{profile} (PID {pid}) did not exit within {waited:?}")]
    StopTimeout {
        profile: String,
        pid: u32,
        waited: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Restart,
    Status,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Restart => "restart",
            Action::Status => "status",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileStatus {
    Running { pid: u32 },
    Stopped,
}

impl ProfileStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ProfileStatus::Running { .. })
    }
}

impl fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileStatus::Running { .. } => f.write_str("ON"),
            ProfileStatus::Stopped => f.write_str("OFF"),
        }
    }
}

/// What an action did to one profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Launched; the PID is known if sshuttle already wrote it
    Started { pid: Option<u32> },
    Stopped { pid: u32 },
    /// Nothing to stop
    NotRunning,
    Restarted { pid: Option<u32> },
    Status(ProfileStatus),
}

/// Per-profile results of one action, in processing order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<(String, Result<Outcome, ControlError>)>,
}

impl BatchReport {
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_err()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }
}

pub struct ProcessController<'a> {
    config: &'a Config,
    store: PidFileStore,
    launcher: &'a dyn Launcher,
    probe: &'a dyn ProcessProbe,
    poll_interval: Duration,
    stop_timeout: Duration,
}

impl<'a> ProcessController<'a> {
    pub fn new(config: &'a Config, launcher: &'a dyn Launcher, probe: &'a dyn ProcessProbe) -> Self {
        Self {
            config,
            store: PidFileStore::new(config.pid_dir.clone()),
            launcher,
            probe,
            poll_interval: POLL_INTERVAL,
            stop_timeout: config.stop_timeout,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn store(&self) -> &PidFileStore {
        &self.store
    }

    fn endpoint(&self, profile: &str) -> Result<&'a Endpoint, ControlError> {
        self.config
            .endpoint(profile)
            .ok_or_else(|| ControlError::UnknownProfile(profile.to_string()))
    }

    /// Launch sshuttle for `profile` in daemon mode
    pub fn start(&self, profile: &str) -> Result<Option<u32>, ControlError> {
        let endpoint = self.endpoint(profile)?;
        let pidfile = self.pidfile_arg(profile);

        let mut args = endpoint.sshuttle_args();
        args.push("--daemon".to_string());
        args.push("--pidfile".to_string());
        args.push(pidfile.display().to_string());

        info!("Starting {}", profile);
        self.launcher.launch(&self.config.sshuttle_dir, &args)?;

        // sshuttle writes the PID from its daemonized grandchild, which may
        // land just after the launcher returns.
        let pid = match self.store.read(profile) {
            Ok(pid) => pid,
            Err(e) => {
                warn!("{} launched, but its PID file is unreadable: {}", profile, e);
                None
            }
        };
        match pid {
            Some(pid) => info!("Started {} (PID {})", profile, pid),
            None => debug!("Started {}, PID not recorded yet", profile),
        }
        Ok(pid)
    }

    /// Absolute PID file path handed to sshuttle
    fn pidfile_arg(&self, profile: &str) -> PathBuf {
        let path = self.store.path(profile);
        path::absolute(&path).unwrap_or(path)
    }

    /// Terminate the tunnel of `profile` and wait for it to exit.
    ///
    /// Returns `None` when there was nothing running.
    pub fn stop(&self, profile: &str) -> Result<Option<u32>, ControlError> {
        self.endpoint(profile)?;

        let Some(pid) = self.store.read(profile)? else {
            debug!("{} has no PID file, already stopped", profile);
            return Ok(None);
        };

        if !self.probe.is_alive(pid) {
            info!("{} is not running, removing stale PID file", profile);
            self.store.delete(profile)?;
            return Ok(None);
        }

        info!("Stopping {} (PID {})", profile, pid);
        self.probe.terminate(pid)?;
        self.wait_for_exit(profile, pid)?;
        self.store.delete(profile)?;
        info!("Stopped {}", profile);

        Ok(Some(pid))
    }

    fn wait_for_exit(&self, profile: &str, pid: u32) -> Result<(), ControlError> {
        let started = Instant::now();
        while self.probe.is_alive(pid) {
            debug!("Waiting for {} (PID {}) to exit", profile, pid);
            thread::sleep(self.poll_interval);

            // at least one poll interval passes before giving up
            let waited = started.elapsed();
            if waited >= self.stop_timeout && self.probe.is_alive(pid) {
                return Err(ControlError::StopTimeout {
                    profile: profile.to_string(),
                    pid,
                    waited,
                });
            }
        }
        Ok(())
    }

    /// Stop, then start once the old tunnel is confirmed gone
    pub fn restart(&self, profile: &str) -> Result<Option<u32>, ControlError> {
        self.stop(profile)?;
        self.start(profile)
    }

    /// Current state of `profile`; never touches the PID file
    pub fn status(&self, profile: &str) -> Result<ProfileStatus, ControlError> {
        self.endpoint(profile)?;

        let status = match self.store.read(profile)? {
            Some(pid) if self.probe.is_alive(pid) => ProfileStatus::Running { pid },
            _ => ProfileStatus::Stopped,
        };
        Ok(status)
    }

    pub fn apply(&self, action: Action, profile: &str) -> Result<Outcome, ControlError> {
        match action {
            Action::Start => self.start(profile).map(|pid| Outcome::Started { pid }),
            Action::Stop => self.stop(profile).map(|pid| match pid {
                Some(pid) => Outcome::Stopped { pid },
                None => Outcome::NotRunning,
            }),
            Action::Restart => self.restart(profile).map(|pid| Outcome::Restarted { pid }),
            Action::Status => self.status(profile).map(Outcome::Status),
        }
    }

    /// Apply `action` to one profile, or to every profile in declaration
    /// order when none is named. A failing profile does not stop the rest.
    pub fn run(&self, action: Action, profile: Option<&str>) -> BatchReport {
        let profiles: Vec<String> = match profile {
            Some(profile) => vec![profile.to_string()],
            None => self
                .config
                .profile_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        };

        let mut report = BatchReport::default();
        for profile in profiles {
            let result = self.apply(action, &profile);
            if let Err(e) = &result {
                error!("Failed to {} {}: {}", action, profile, e);
            }
            report.results.push((profile, result));
        }
        report
    }
}
