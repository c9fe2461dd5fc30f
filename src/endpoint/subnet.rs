//! CIDR canonicalization

use ipnetwork::{IpNetwork, IpNetworkError};
use std::net::IpAddr;

/// Normalize a subnet string to `network/prefix` form.
///
/// A bare address becomes a host network (`/32` or `/128`). An address
/// with bits set below the prefix, such as `10.0.0.7/24`, is rejected.
pub fn canonicalize(subnet: &str) -> Result<String, IpNetworkError> {
    let subnet = subnet.trim();
    let network: IpNetwork = subnet.parse()?;
    if network.ip() != network.network() {
        return Err(IpNetworkError::InvalidCidrFormat(format!(
            "{} has host bits set",
            subnet
        )));
    }
    Ok(network.to_string())
}

/// Host network for a single address (`10.0.0.5/32`, `fd00::1/128`)
pub fn host_network(ip: IpAddr) -> String {
    IpNetwork::from(ip).to_string()
}
