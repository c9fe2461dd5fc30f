//! Endpoint validation pipeline
//!
//! A [`RawEndpoint`] is turned into an [`Endpoint`] by running an ordered
//! list of steps over a draft. Each step takes the draft by value and
//! either hands back the (possibly rewritten) draft or fails. Later steps
//! may rely on what earlier ones did, e.g. `auto_hosts` is only forced
//! once `seed_hosts` has been cleaned.

use super::subnet::{canonicalize, host_network};
use super::{Endpoint, RawEndpoint};
use crate::resolve::Resolver;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Endpoint name '{0}' is not usable as a profile name")]
    InvalidName(String),
    #[error("Endpoint '{endpoint}': empty host entry in seed_hosts (item {index})")]
    EmptyHostEntry { endpoint: String, index: usize },
    #[error("Endpoint '{endpoint}': invalid entry '{value}' in {field}: {reason}")]
    InvalidSubnet {
        endpoint: String,
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("Duplicate endpoint name: {0}")]
    DuplicateProfile(String),
}

type Draft = RawEndpoint;
type Step = fn(Draft, &dyn Resolver) -> Result<Draft, ValidationError>;

/// Validation steps, in execution order
const STEPS: &[(&str, Step)] = &[
    ("name", check_name),
    ("ssh_cmd", trim_ssh_command),
    ("seed_hosts", trim_seed_hosts),
    ("auto_hosts", force_auto_hosts),
    ("subnets", canonicalize_subnets),
    ("exclude_subnets", exclude_remote),
];

/// Validate a single endpoint
pub fn validate_endpoint(
    raw: RawEndpoint,
    resolver: &dyn Resolver,
) -> Result<Endpoint, ValidationError> {
    let mut draft = raw;
    for (field, step) in STEPS {
        debug!("Validating {} of endpoint '{}'", field, draft.name);
        draft = step(draft, resolver)?;
    }

    Ok(Endpoint {
        name: draft.name,
        remote: draft.remote,
        ssh_command: draft.ssh_command,
        forward_dns_requests: draft.forward_dns_requests,
        latency_control: draft.latency_control,
        seed_hosts: draft.seed_hosts,
        auto_hosts: draft.auto_hosts,
        auto_nets: draft.auto_nets,
        subnets: draft.subnets,
        exclude_subnets: draft.exclude_subnets,
    })
}

/// Validate every endpoint and check that names are unique
pub fn validate_endpoints(
    raws: Vec<RawEndpoint>,
    resolver: &dyn Resolver,
) -> Result<Vec<Endpoint>, ValidationError> {
    let mut seen = HashSet::new();
    let mut endpoints = Vec::with_capacity(raws.len());

    for raw in raws {
        if !seen.insert(raw.name.clone()) {
            return Err(ValidationError::DuplicateProfile(raw.name));
        }
        endpoints.push(validate_endpoint(raw, resolver)?);
    }

    Ok(endpoints)
}

/// The name ends up as a PID file suffix, so it must be a plain file name.
fn check_name(draft: Draft, _: &dyn Resolver) -> Result<Draft, ValidationError> {
    let name = draft.name.as_str();
    if name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\0')
    {
        return Err(ValidationError::InvalidName(draft.name));
    }
    Ok(draft)
}

fn trim_ssh_command(mut draft: Draft, _: &dyn Resolver) -> Result<Draft, ValidationError> {
    draft.ssh_command = draft.ssh_command.trim().to_string();
    Ok(draft)
}

fn trim_seed_hosts(mut draft: Draft, _: &dyn Resolver) -> Result<Draft, ValidationError> {
    let mut hosts = Vec::with_capacity(draft.seed_hosts.len());
    for (index, host) in draft.seed_hosts.iter().enumerate() {
        let host = host.trim();
        if host.is_empty() {
            return Err(ValidationError::EmptyHostEntry {
                endpoint: draft.name.clone(),
                index,
            });
        }
        hosts.push(host.to_string());
    }
    draft.seed_hosts = hosts;
    Ok(draft)
}

fn force_auto_hosts(mut draft: Draft, _: &dyn Resolver) -> Result<Draft, ValidationError> {
    if !draft.seed_hosts.is_empty() && !draft.auto_hosts {
        debug!("Enabling auto_hosts for '{}' (seed_hosts set)", draft.name);
        draft.auto_hosts = true;
    }
    Ok(draft)
}

fn canonicalize_subnets(mut draft: Draft, _: &dyn Resolver) -> Result<Draft, ValidationError> {
    draft.subnets = canonicalize_all(&draft.name, "subnets", &draft.subnets)?;
    draft.exclude_subnets = canonicalize_all(&draft.name, "exclude_subnets", &draft.exclude_subnets)?;
    Ok(draft)
}

fn canonicalize_all(
    endpoint: &str,
    field: &'static str,
    subnets: &[String],
) -> Result<Vec<String>, ValidationError> {
    subnets
        .iter()
        .map(|value| {
            canonicalize(value).map_err(|e| ValidationError::InvalidSubnet {
                endpoint: endpoint.to_string(),
                field,
                value: value.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Keep traffic to the remote itself off the tunnel.
///
/// An unresolvable remote is only a warning: DNS may simply be down right
/// now, and the tunnel can still be managed.
fn exclude_remote(mut draft: Draft, resolver: &dyn Resolver) -> Result<Draft, ValidationError> {
    match resolver.resolve(&draft.remote) {
        Ok(ip) => {
            let bare = ip.to_string();
            let host = host_network(ip);
            let present = draft
                .exclude_subnets
                .iter()
                .any(|subnet| *subnet == bare || *subnet == host);
            if !present {
                debug!("Excluding remote {} of '{}'", host, draft.name);
                draft.exclude_subnets.push(host);
            }
        }
        Err(e) => {
            warn!("Endpoint '{}': {}", draft.name, e);
        }
    }
    Ok(draft)
}
