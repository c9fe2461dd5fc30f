//! sshmole - profile manager for sshuttle tunnels
//!
//! Reads named tunnel profiles from `~/.sshmole.yml` and starts, stops,
//! restarts or queries one daemonized sshuttle per profile.
//!
//! # Architecture
//!
//! - `config`: Configuration file handling (YAML)
//! - `endpoint`: Profile model, validation and sshuttle argument derivation
//! - `resolve`: Remote resolution with ~/.ssh/config alias fallback
//! - `platform`: Process liveness and termination
//! - `sshuttle`: PID files, launching, lifecycle control and setup
//!
//! # Usage
//!
//! ```bash
//! sshmole start work
//! sshmole status
//! sshmole stop
//! ```

pub mod config;
pub mod endpoint;
pub mod platform;
pub mod resolve;
pub mod sshuttle;

pub use config::Config;
pub use endpoint::Endpoint;
pub use sshuttle::ProcessController;
