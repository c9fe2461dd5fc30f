//! sshuttle integration
//!
//! Each profile runs as one daemonized sshuttle process, tracked through a
//! PID file at `/tmp/sshuttle.pid.<profile>`:
//!
//! ```bash
//! sshuttle -r bastion -x 10.0.0.5/32 10.0.0.0/24 \
//!   --daemon --pidfile /tmp/sshuttle.pid.work
//! ```

pub mod controller;
pub mod launcher;
pub mod pidfile;
pub mod setup;

pub use controller::{Action, BatchReport, ControlError, Outcome, ProcessController, ProfileStatus};
pub use launcher::{LaunchError, Launcher, SshuttleLauncher};
pub use pidfile::{PidFileError, PidFileStore};
pub use setup::{do_setup, SetupError};
