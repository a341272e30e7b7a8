//! IP address and CIDR matching

use crate::error::{Result, WardenError};
use ipnet::IpNet;
use std::net::IpAddr;

fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}

/// Check whether `ip1` equals `ip2`, or falls inside `ip2` when it is a CIDR
///
/// Malformed input on either side is an error so that misconfiguration is
/// distinguishable from a non-match. Mismatched address families simply
/// don't match.
///
/// # Examples
/// ```
/// use warden_rs::functions::ip_match;
///
/// assert!(ip_match("192.168.2.123", "192.168.2.0/24").unwrap());
/// assert!(!ip_match("11.0.0.123", "10.0.0.0/8").unwrap());
/// assert!(ip_match("not-an-ip", "10.0.0.0/8").is_err());
/// ```
pub fn ip_match(ip1: &str, ip2: &str) -> Result<bool> {
    let addr: IpAddr = ip1
        .trim()
        .parse()
        .map_err(|_| WardenError::InvalidIp(format!("ip1 '{}' is not an IP address", ip1)))?;

    let ip2 = ip2.trim();
    if ip2.contains('/') {
        let net: IpNet = ip2
            .parse()
            .map_err(|_| WardenError::InvalidIp(format!("ip2 '{}' is not a CIDR", ip2)))?;
        let addr = match (net, addr) {
            (IpNet::V4(_), IpAddr::V6(_)) => normalize(addr),
            _ => addr,
        };
        return Ok(net.contains(&addr));
    }

    let other: IpAddr = ip2.parse().map_err(|_| {
        WardenError::InvalidIp(format!("ip2 '{}' is neither an IP address nor a CIDR", ip2))
    })?;
    Ok(normalize(addr) == normalize(other))
}
