//! Tunnel profile model
//!
//! An [`Endpoint`] is one validated sshuttle profile. It is only ever built
//! by the validation pipeline in [`validate`], and is read-only afterwards.
//!
//! # Example profile
//!
//! ```yaml
//! - name: work
//!   remote: bastion.example.com
//!   seed_hosts: [git.internal, wiki.internal]
//!   subnets: [10.0.0.0/24]
//! ```

pub mod subnet;
pub mod validate;

pub use validate::{validate_endpoint, validate_endpoints, ValidationError};

use serde::Deserialize;

/// Default ssh command; sshuttle only needs `--ssh-cmd` when it differs.
pub const DEFAULT_SSH_COMMAND: &str = "ssh";

/// Endpoint as it appears in the config file, before validation
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawEndpoint {
    pub name: String,
    /// Hostname or alias for an entry in ~/.ssh/config
    pub remote: String,
    #[serde(rename = "ssh_cmd", alias = "ssh_command", default = "default_ssh_command")]
    pub ssh_command: String,
    #[serde(default)]
    pub forward_dns_requests: bool,
    #[serde(default = "default_true")]
    pub latency_control: bool,
    #[serde(default)]
    pub seed_hosts: Vec<String>,
    #[serde(default)]
    pub auto_hosts: bool,
    #[serde(default)]
    pub auto_nets: bool,
    #[serde(default)]
    pub subnets: Vec<String>,
    #[serde(default)]
    pub exclude_subnets: Vec<String>,
}

fn default_ssh_command() -> String {
    DEFAULT_SSH_COMMAND.to_string()
}

fn default_true() -> bool {
    true
}

impl RawEndpoint {
    /// Minimal raw endpoint with every optional field at its default
    pub fn new(name: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote: remote.into(),
            ssh_command: default_ssh_command(),
            forward_dns_requests: false,
            latency_control: true,
            seed_hosts: Vec::new(),
            auto_hosts: false,
            auto_nets: false,
            subnets: Vec::new(),
            exclude_subnets: Vec::new(),
        }
    }
}

/// A validated tunnel profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    name: String,
    remote: String,
    ssh_command: String,
    forward_dns_requests: bool,
    latency_control: bool,
    seed_hosts: Vec<String>,
    auto_hosts: bool,
    auto_nets: bool,
    subnets: Vec<String>,
    exclude_subnets: Vec<String>,
}

impl Endpoint {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn ssh_command(&self) -> &str {
        &self.ssh_command
    }

    pub fn forward_dns_requests(&self) -> bool {
        self.forward_dns_requests
    }

    pub fn latency_control(&self) -> bool {
        self.latency_control
    }

    pub fn seed_hosts(&self) -> &[String] {
        &self.seed_hosts
    }

    pub fn auto_hosts(&self) -> bool {
        self.auto_hosts
    }

    pub fn auto_nets(&self) -> bool {
        self.auto_nets
    }

    /// Canonical CIDR strings routed through the tunnel
    pub fn subnets(&self) -> &[String] {
        &self.subnets
    }

    /// Canonical CIDR strings kept off the tunnel, including the remote itself
    pub fn exclude_subnets(&self) -> &[String] {
        &self.exclude_subnets
    }

    /// Arguments for sshuttle, without the binary and without the
    /// `--daemon`/`--pidfile` pair the controller adds.
    ///
    /// The order is fixed so that identical profiles always produce
    /// identical command lines.
    pub fn sshuttle_args(&self) -> Vec<String> {
        let mut args = vec!["-r".to_string(), self.remote.clone()];

        if self.ssh_command != DEFAULT_SSH_COMMAND {
            args.push("--ssh-cmd".to_string());
            args.push(self.ssh_command.clone());
        }
        if self.forward_dns_requests {
            args.push("--dns".to_string());
        }
        if !self.latency_control {
            args.push("--no-latency-control".to_string());
        }
        if !self.seed_hosts.is_empty() {
            args.push("--seed-hosts".to_string());
            args.push(self.seed_hosts.join(","));
        }
        if self.auto_hosts {
            args.push("--auto-hosts".to_string());
        }
        if self.auto_nets {
            args.push("--auto-nets".to_string());
        }
        for subnet in &self.exclude_subnets {
            args.push("-x".to_string());
            args.push(subnet.clone());
        }
        args.extend(self.subnets.iter().cloned());

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint {
            name: "work".to_string(),
            remote: "bastion".to_string(),
            ssh_command: "ssh".to_string(),
            forward_dns_requests: false,
            latency_control: true,
            seed_hosts: vec![],
            auto_hosts: false,
            auto_nets: false,
            subnets: vec![],
            exclude_subnets: vec![],
        }
    }

    #[test]
    fn test_minimal_args() {
        assert_eq!(endpoint().sshuttle_args(), vec!["-r", "bastion"]);
    }

    #[test]
    fn test_full_args_order() {
        let ep = Endpoint {
            ssh_command: "ssh -i ~/.ssh/work".to_string(),
            forward_dns_requests: true,
            latency_control: false,
            seed_hosts: vec!["a".to_string(), "b".to_string()],
            auto_hosts: true,
            auto_nets: true,
            subnets: vec!["10.0.0.0/24".to_string(), "10.1.0.0/16".to_string()],
            exclude_subnets: vec!["10.0.0.5/32".to_string(), "10.0.0.6/32".to_string()],
            ..endpoint()
        };

        assert_eq!(
            ep.sshuttle_args(),
            vec![
                "-r",
                "bastion",
                "--ssh-cmd",
                "ssh -i ~/.ssh/work",
                "--dns",
                "--no-latency-control",
                "--seed-hosts",
                "a,b",
                "--auto-hosts",
                "--auto-nets",
                "-x",
                "10.0.0.5/32",
                "-x",
                "10.0.0.6/32",
                "10.0.0.0/24",
                "10.1.0.0/16",
            ]
        );
    }

    #[test]
    fn test_raw_endpoint_yaml_defaults() {
        let raw: RawEndpoint = serde_yaml::from_str("name: work\nremote: bastion\n").unwrap();
        assert_eq!(raw.ssh_command, "ssh");
        assert!(raw.latency_control);
        assert!(!raw.forward_dns_requests);
        assert!(!raw.auto_hosts);
        assert!(raw.seed_hosts.is_empty());
    }

    #[test]
    fn test_raw_endpoint_rejects_unknown_keys() {
        let result: Result<RawEndpoint, _> =
            serde_yaml::from_str("name: work\nremote: bastion\nsubnet: 10.0.0.0/8\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_raw_endpoint_ssh_cmd_key() {
        let raw: RawEndpoint =
            serde_yaml::from_str("name: work\nremote: bastion\nssh_cmd: ssh -p 2222\n").unwrap();
        assert_eq!(raw.ssh_command, "ssh -p 2222");
    }
}
