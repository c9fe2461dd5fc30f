//! `setup-sshuttle`: install sshuttle into the configured directory
//!
//! 1. Clone sshuttle from its upstream repository at a pinned tag
//! 2. Create a virtualenv inside the checkout
//! 3. Install sshuttle's requirements (re-run whenever they change)
//! 4. Install a NOPASSWD sudoers entry so tunnels start unattended
//!
//! Every step is skipped when its result is already present, so setup can
//! be re-run safely.

use super::launcher::{find_in_path, VENV_DIR};
use crate::config::Config;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

pub const SSHUTTLE_REPO: &str = "https://github.com/sshuttle/sshuttle.git";
pub const SSHUTTLE_TAG: &str = "tags/v1.0.5";

const REQUIREMENTS_FILE: &str = "requirements.txt";
const INSTALLED_MARKER: &str = ".requirements.installed.txt";

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Cannot find a Python 3 interpreter (tried '{0}')")]
    PythonNotFound(String),
    #[error("Installation failed: {0}")]
    InstallFailed(String),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

/// Resolve the configured interpreter hint to a working Python 3.
///
/// An absolute path is used as-is; anything else is looked up on `PATH`.
pub fn resolve_python(hint: &str) -> Result<PathBuf, SetupError> {
    let candidate = if Path::new(hint).is_absolute() {
        Some(PathBuf::from(hint))
    } else {
        find_in_path(hint)
    };

    candidate
        .filter(|path| is_python3(path))
        .ok_or_else(|| SetupError::PythonNotFound(hint.to_string()))
}

fn is_python3(python: &Path) -> bool {
    if !python.exists() {
        return false;
    }
    Command::new(python)
        .args(["-c", "import sys; sys.exit(sys.version_info[0] != 3)"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn has_venv_module(python: &Path) -> Result<bool, SetupError> {
    let output = Command::new(python).args(["-c", "import venv"]).output()?;
    if output.status.success() {
        return Ok(true);
    }
    if String::from_utf8_lossy(&output.stderr).contains("No module named 'venv'") {
        return Ok(false);
    }
    Err(SetupError::InstallFailed(format!(
        "unexpected error probing {} for venv",
        python.display()
    )))
}

/// Run a setup step, failing with the step's name
fn run(step: &str, command: &mut Command) -> Result<(), SetupError> {
    debug!("{}: {:?}", step, command);
    let status = command
        .status()
        .map_err(|e| SetupError::InstallFailed(format!("{}: {}", step, e)))?;
    if !status.success() {
        return Err(SetupError::InstallFailed(format!("{} ({})", step, status)));
    }
    Ok(())
}

/// Digest of a file's content, `None` if it cannot be read
fn file_digest(path: &Path) -> Option<Vec<u8>> {
    let content = fs::read(path).ok()?;
    Some(Sha256::digest(&content).to_vec())
}

/// Whether the requirements recorded at the last install match the current ones
pub fn requirements_installed(install_dir: &Path) -> bool {
    let current = file_digest(&install_dir.join(REQUIREMENTS_FILE));
    let installed = file_digest(&install_dir.join(VENV_DIR).join(INSTALLED_MARKER));
    current.is_some() && current == installed
}

/// Run `script` inside the venv via bash, as `activate` requires a shell
fn in_venv(install_dir: &Path, bash: &Path, script: &str) -> Command {
    let mut command = Command::new(bash);
    command
        .arg("-c")
        .arg(format!("source {}/bin/activate && {}", VENV_DIR, script))
        .current_dir(install_dir);
    command
}

fn current_user() -> Result<String, SetupError> {
    #[cfg(unix)]
    {
        use nix::unistd::{getuid, User};
        if let Ok(Some(user)) = User::from_uid(getuid()) {
            return Ok(user.name);
        }
    }
    std::env::var("USER").map_err(|_| SetupError::InstallFailed("cannot determine user name".into()))
}

pub fn do_setup(config: &Config) -> Result<(), SetupError> {
    let install_dir = &config.sshuttle_dir;
    let bash = find_in_path("bash").ok_or_else(|| {
        SetupError::InstallFailed("cannot find bash, needed to run commands in the venv".into())
    })?;

    if !install_dir.exists() {
        let git = find_in_path("git").ok_or_else(|| {
            SetupError::InstallFailed("cannot clone sshuttle because 'git' cannot be found".into())
        })?;
        info!("Cloning sshuttle into {}", install_dir.display());
        run(
            "git clone",
            Command::new(&git).arg("clone").arg(SSHUTTLE_REPO).arg(install_dir),
        )?;
        run(
            "git checkout",
            Command::new(&git)
                .args(["checkout", SSHUTTLE_TAG])
                .current_dir(install_dir),
        )?;
    } else {
        debug!("{} exists, skipping clone", install_dir.display());
    }

    let venv = install_dir.join(VENV_DIR);
    if !venv.exists() {
        let python = resolve_python(&config.python)?;
        if !has_venv_module(&python)? {
            return Err(SetupError::InstallFailed(
                "python installation lacks the 'venv' module, install it through your system's package manager and re-try".into(),
            ));
        }
        info!("Creating virtualenv with {}", python.display());
        run(
            "create venv",
            Command::new(&python)
                .args(["-m", "venv", VENV_DIR])
                .current_dir(install_dir),
        )?;
    }

    let requirements = install_dir.join(REQUIREMENTS_FILE);
    if !requirements.exists() {
        return Err(SetupError::InstallFailed(format!(
            "could not find sshuttle's {}",
            requirements.display()
        )));
    }

    if requirements_installed(install_dir) {
        debug!("sshuttle requirements up to date");
    } else {
        info!("Installing sshuttle requirements");
        run(
            "pip install requirements",
            &mut in_venv(install_dir, &bash, "pip install -r requirements.txt"),
        )?;
        fs::copy(&requirements, venv.join(INSTALLED_MARKER))?;
        run("pip install sshuttle", &mut in_venv(install_dir, &bash, "pip install ."))?;
    }

    let user = current_user()?;
    info!("Installing sudoers entry for {}", user);
    run(
        "install sudoers",
        &mut in_venv(
            install_dir,
            &bash,
            &format!("sshuttle --sudoers --sudoers-filename sshmole_{}", user),
        ),
    )?;

    info!("sshuttle is set up in {}", install_dir.display());
    Ok(())
}
