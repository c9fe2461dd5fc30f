//! Remote hostname resolution
//!
//! A profile's `remote` is either a DNS name, an IP literal, or an alias
//! from `~/.ssh/config`. System DNS is tried first; if that fails the ssh
//! config is consulted and the alias's `HostName` is resolved in turn,
//! which may itself be another alias.

pub mod ssh_config;

pub use ssh_config::SshConfig;

use std::io;
use std::net::{IpAddr, ToSocketAddrs};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

/// Longest alias chain followed before giving up
const MAX_ALIAS_DEPTH: usize = 8;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(
        "invalid remote '{0}', it is neither a valid DNS hostname nor an alias for a config entry in ~/.ssh/config"
    )]
    InvalidRemote(String),
}

/// Remote-to-address lookup used by the validator
pub trait Resolver {
    fn resolve(&self, remote: &str) -> Result<IpAddr, ResolveError>;
}

/// Resolver backed by the system resolver and the user's ssh config
pub struct SystemResolver {
    ssh_config: Option<PathBuf>,
}

impl SystemResolver {
    pub fn new() -> Self {
        Self {
            ssh_config: ssh_config::default_ssh_config_path(),
        }
    }

    pub fn with_ssh_config(path: PathBuf) -> Self {
        Self {
            ssh_config: Some(path),
        }
    }

    fn load_ssh_config(&self) -> SshConfig {
        let Some(path) = &self.ssh_config else {
            debug!("No home directory, skipping ssh config");
            return SshConfig::default();
        };

        match SshConfig::load(path) {
            Ok(config) => config,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No ssh config at {}", path.display());
                SshConfig::default()
            }
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                SshConfig::default()
            }
        }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for SystemResolver {
    fn resolve(&self, remote: &str) -> Result<IpAddr, ResolveError> {
        resolve_chain(remote, system_lookup, || self.load_ssh_config())
    }
}

/// Resolve via system DNS, preferring an IPv4 answer
fn system_lookup(host: &str) -> Option<IpAddr> {
    let addrs: Vec<IpAddr> = (host, 0u16)
        .to_socket_addrs()
        .map_err(|e| debug!("System DNS failed for {}: {}", host, e))
        .ok()?
        .map(|addr| addr.ip())
        .collect();

    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
}

/// Resolve `remote`, following ssh config aliases when direct lookup fails.
///
/// The ssh config is only loaded if the direct lookup fails.
pub fn resolve_chain<L, C>(remote: &str, lookup: L, load_config: C) -> Result<IpAddr, ResolveError>
where
    L: Fn(&str) -> Option<IpAddr>,
    C: FnOnce() -> SshConfig,
{
    if let Some(ip) = lookup(remote) {
        debug!("Resolved {} -> {}", remote, ip);
        return Ok(ip);
    }

    let config = load_config();
    let mut token = remote;
    for _ in 0..MAX_ALIAS_DEPTH {
        let Some(hostname) = config.hostname(token) else {
            break;
        };
        debug!("ssh config alias {} -> {}", token, hostname);
        if let Some(ip) = lookup(hostname) {
            debug!("Resolved {} -> {} (via ssh config)", remote, ip);
            return Ok(ip);
        }
        token = hostname;
    }

    Err(ResolveError::InvalidRemote(remote.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::net::Ipv4Addr;

    fn dns(entries: &[(&str, [u8; 4])]) -> impl Fn(&str) -> Option<IpAddr> {
        let table: HashMap<String, IpAddr> = entries
            .iter()
            .map(|(name, octets)| (name.to_string(), IpAddr::V4(Ipv4Addr::from(*octets))))
            .collect();
        move |host: &str| table.get(host).copied()
    }

    #[test]
    fn test_direct_lookup_skips_ssh_config() {
        let loaded = Cell::new(false);
        let ip = resolve_chain("host", dns(&[("host", [10, 0, 0, 1])]), || {
            loaded.set(true);
            SshConfig::default()
        })
        .unwrap();

        assert_eq!(ip.to_string(), "10.0.0.1");
        assert!(!loaded.get());
    }

    #[test]
    fn test_alias_fallback() {
        let config = SshConfig::parse("Host work\n  HostName bastion.example.com\n");
        let ip = resolve_chain(
            "work",
            dns(&[("bastion.example.com", [192, 0, 2, 7])]),
            || config,
        )
        .unwrap();
        assert_eq!(ip.to_string(), "192.0.2.7");
    }

    #[test]
    fn test_alias_chain() {
        let config = SshConfig::parse(
            "Host work\n  HostName jump\nHost jump\n  HostName gw.example.com\n",
        );
        let ip = resolve_chain("work", dns(&[("gw.example.com", [192, 0, 2, 9])]), || config)
            .unwrap();
        assert_eq!(ip.to_string(), "192.0.2.9");
    }

    #[test]
    fn test_alias_loop_fails() {
        let config = SshConfig::parse("Host a\n  HostName b\nHost b\n  HostName a\n");
        let result = resolve_chain("a", dns(&[]), || config);
        assert!(matches!(result, Err(ResolveError::InvalidRemote(r)) if r == "a"));
    }

    #[test]
    fn test_unknown_remote() {
        let result = resolve_chain("nowhere", dns(&[]), SshConfig::default);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("'nowhere'"));
    }

    #[test]
    fn test_system_resolver_ip_literal() {
        let resolver = SystemResolver::with_ssh_config(PathBuf::from("/nonexistent/ssh/config"));
        let ip = resolver.resolve("10.0.0.5").unwrap();
        assert_eq!(ip.to_string(), "10.0.0.5");
    }

    #[test]
    fn test_system_resolver_uses_ssh_config_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config");
        std::fs::write(&path, "Host my-box-alias.invalid\n  HostName 192.0.2.33\n").unwrap();

        let resolver = SystemResolver::with_ssh_config(path);
        let ip = resolver.resolve("my-box-alias.invalid").unwrap();
        assert_eq!(ip.to_string(), "192.0.2.33");
    }
}
