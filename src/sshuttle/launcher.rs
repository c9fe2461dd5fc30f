//! Running the sshuttle binary
//!
//! sshuttle is taken from `PATH` when installed system-wide, otherwise
//! from the virtualenv that `setup-sshuttle` creates inside the install
//! directory. The venv binary is run with the environment `activate`
//! would have set up.

use std::env;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;
use tracing::{debug, info};

pub const SSHUTTLE_BIN: &str = "sshuttle";

/// Virtualenv directory inside the install directory
pub const VENV_DIR: &str = ".venv";

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("sshuttle is not installed ({0} does not exist), run `sshmole setup-sshuttle` first, then re-try")]
    ExternalToolMissing(PathBuf),
    #[error("sshuttle virtual environment ({0}) is incomplete, re-run `sshmole setup-sshuttle`, then re-try")]
    InstallationIncomplete(PathBuf),
    #[error("Failed to run {program}: {source}")]
    SpawnFailed {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("sshuttle exited unsuccessfully ({0})")]
    ExitStatus(ExitStatus),
}

/// Runs the external tunneling tool
pub trait Launcher {
    /// Run the tool with `args` from `workdir`, returning once its
    /// foreground process has exited (it daemonizes itself).
    fn launch(&self, workdir: &Path, args: &[String]) -> Result<(), LaunchError>;
}

/// Which sshuttle binary will be run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Executable {
    System(PathBuf),
    Venv { bin: PathBuf, venv: PathBuf },
}

impl Executable {
    pub fn path(&self) -> &Path {
        match self {
            Executable::System(path) => path,
            Executable::Venv { bin, .. } => bin,
        }
    }
}

pub struct SshuttleLauncher {
    install_dir: PathBuf,
}

impl SshuttleLauncher {
    pub fn new(install_dir: PathBuf) -> Self {
        Self { install_dir }
    }

    /// Find sshuttle, preferring a system-wide install
    pub fn locate(&self) -> Result<Executable, LaunchError> {
        if let Some(path) = find_in_path(SSHUTTLE_BIN) {
            debug!("Using system sshuttle at {}", path.display());
            return Ok(Executable::System(path));
        }
        self.locate_venv()
    }

    fn locate_venv(&self) -> Result<Executable, LaunchError> {
        if !self.install_dir.exists() {
            return Err(LaunchError::ExternalToolMissing(self.install_dir.clone()));
        }

        let venv = self.install_dir.join(VENV_DIR);
        let bin = venv.join("bin").join(SSHUTTLE_BIN);
        if !venv.is_dir() || !bin.is_file() {
            return Err(LaunchError::InstallationIncomplete(venv));
        }

        debug!("Using sshuttle from {}", venv.display());
        Ok(Executable::Venv { bin, venv })
    }
}

impl Launcher for SshuttleLauncher {
    fn launch(&self, workdir: &Path, args: &[String]) -> Result<(), LaunchError> {
        let exe = self.locate()?;
        run(&exe, workdir, args)
    }
}

/// Build the command line for `exe`, with the venv activated if it has one
fn command(exe: &Executable, workdir: &Path, args: &[String]) -> Command {
    let mut command = Command::new(exe.path());
    command.args(args);

    if workdir.is_dir() {
        command.current_dir(workdir);
    } else {
        debug!(
            "{} does not exist, running from the current directory",
            workdir.display()
        );
    }

    if let Executable::Venv { venv, .. } = exe {
        command.env("VIRTUAL_ENV", venv);
        command.env("PATH", venv_path(venv));
    }
    command
}

/// Run `exe` in the foreground and wait for it to exit
fn run(exe: &Executable, workdir: &Path, args: &[String]) -> Result<(), LaunchError> {
    info!("Running: {} {}", exe.path().display(), args.join(" "));
    let status = command(exe, workdir, args)
        .status()
        .map_err(|source| LaunchError::SpawnFailed {
            program: exe.path().to_path_buf(),
            source,
        })?;

    if !status.success() {
        return Err(LaunchError::ExitStatus(status));
    }
    Ok(())
}

/// `PATH` with the venv's bin directory in front
fn venv_path(venv: &Path) -> OsString {
    let current = env::var_os("PATH").unwrap_or_default();
    let paths = std::iter::once(venv.join("bin")).chain(env::split_paths(&current));
    env::join_paths(paths).unwrap_or(current)
}

/// Locate an executable on `PATH`
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let output = Command::new("which").arg(name).output().ok()?;
    if !output.status.success() {
        return None;
    }

    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}
