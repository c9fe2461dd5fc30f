//! Platform-specific process control

#[cfg(unix)]
pub mod unix;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Failed to signal process {pid}: {message}")]
    SignalError { pid: u32, message: String },
    #[error("Unsupported platform")]
    UnsupportedPlatform,
}

/// Platform-agnostic process liveness and termination
pub trait ProcessProbe {
    /// Whether `pid` names a running process; never disturbs it.
    fn is_alive(&self, pid: u32) -> bool;

    /// Ask `pid` to terminate. A process that is already gone is not an error.
    fn terminate(&self, pid: u32) -> Result<(), PlatformError>;
}

/// Get the appropriate process probe for the current platform
pub fn get_process_probe() -> Result<Box<dyn ProcessProbe>, PlatformError> {
    #[cfg(unix)]
    {
        Ok(Box::new(unix::UnixProcessProbe::new()))
    }

    #[cfg(not(unix))]
    {
        Err(PlatformError::UnsupportedPlatform)
    }
}
