//! Per-profile PID files
//!
//! sshuttle is started with `--pidfile <path>` and writes its own PID
//! there after daemonizing. The file's existence only means the profile
//! *may* be running; the controller always probes the PID before trusting
//! it. Nothing here is locked, so two invocations racing on one profile
//! can see each other's half-finished work.

use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Default directory holding the PID files
pub const DEFAULT_PID_DIR: &str = "/tmp";

const PID_FILE_PREFIX: &str = "sshuttle.pid.";

#[derive(Error, Debug)]
pub enum PidFileError {
    #[error("Failed to access PID file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed PID file {path}: {content:?}")]
    MalformedPidFile { path: PathBuf, content: String },
}

#[derive(Debug, Clone)]
pub struct PidFileStore {
    dir: PathBuf,
}

impl PidFileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// `<dir>/sshuttle.pid.<profile>`
    pub fn path(&self, profile: &str) -> PathBuf {
        self.dir.join(format!("{}{}", PID_FILE_PREFIX, profile))
    }

    pub fn write(&self, profile: &str, pid: u32) -> Result<(), PidFileError> {
        let path = self.path(profile);
        fs::write(&path, format!("{}\n", pid)).map_err(|source| PidFileError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("Wrote PID {} to {}", pid, path.display());
        Ok(())
    }

    /// Recorded PID, or `None` if there is no PID file
    pub fn read(&self, profile: &str) -> Result<Option<u32>, PidFileError> {
        let path = self.path(profile);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(PidFileError::Io { path, source }),
        };
        let content = String::from_utf8_lossy(&bytes).into_owned();

        parse_pid(&content)
            .map(Some)
            .ok_or(PidFileError::MalformedPidFile { path, content })
    }

    /// Remove the PID file; a missing file is fine.
    pub fn delete(&self, profile: &str) -> Result<(), PidFileError> {
        let path = self.path(profile);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PidFileError::Io { path, source }),
        }
    }
}

impl Default for PidFileStore {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_PID_DIR))
    }
}

/// First line as a positive decimal PID
fn parse_pid(content: &str) -> Option<u32> {
    let line = content.lines().next()?.trim();
    let pid: i32 = line.parse().ok()?;
    u32::try_from(pid).ok().filter(|pid| *pid > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir) -> PidFileStore {
        PidFileStore::new(temp_dir.path().to_path_buf())
    }

    #[test]
    fn test_default_path() {
        let store = PidFileStore::default();
        assert_eq!(store.path("work"), PathBuf::from("/tmp/sshuttle.pid.work"));
    }

    #[test]
    fn test_paths_are_distinct_per_profile() {
        let store = PidFileStore::default();
        assert_ne!(store.path("work"), store.path("home"));
        assert_ne!(store.path("work"), store.path("work2"));
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        store.write("work", 4242).unwrap();
        assert_eq!(store.read("work").unwrap(), Some(4242));
        assert_eq!(fs::read_to_string(store.path("work")).unwrap(), "4242\n");
    }

    #[test]
    fn test_write_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        store.write("work", 1).unwrap();
        store.write("work", 2).unwrap();
        assert_eq!(store.read("work").unwrap(), Some(2));
    }

    #[test]
    fn test_read_absent() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(store(&temp_dir).read("work").unwrap(), None);
    }

    #[test]
    fn test_read_without_trailing_newline() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        fs::write(store.path("work"), "1234").unwrap();
        assert_eq!(store.read("work").unwrap(), Some(1234));
    }

    #[test]
    fn test_read_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        for content in ["", "abc\n", "12 34\n", "0\n", "-5\n", "99999999999\n"] {
            fs::write(store.path("work"), content).unwrap();
            let err = store.read("work").unwrap_err();
            assert!(
                matches!(err, PidFileError::MalformedPidFile { .. }),
                "content {:?}",
                content
            );
        }
    }

    #[test]
    fn test_read_binary_content_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        fs::write(store.path("work"), [0xff, 0xfe, b'\n']).unwrap();

        match store.read("work").unwrap_err() {
            PidFileError::MalformedPidFile { path, content } => {
                assert_eq!(path, store.path("work"));
                assert!(content.contains('\u{fffd}'));
            }
            other => panic!("expected MalformedPidFile, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        store.write("work", 10).unwrap();
        store.delete("work").unwrap();
        assert!(!store.path("work").exists());
        store.delete("work").unwrap();
    }

    #[test]
    fn test_delete_leaves_other_profiles() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        store.write("work", 10).unwrap();
        store.write("home", 11).unwrap();
        store.delete("work").unwrap();
        assert_eq!(store.read("home").unwrap(), Some(11));
    }
}
