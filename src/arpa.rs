//! Reverse-DNS name codec.
//!
//! Converts IP addresses, CIDR networks, and existing ARPA names into the
//! reverse-zone names used for PTR records, including RFC 2317 classless
//! delegation for IPv4 networks smaller than a /24.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::ZoneNameError;

const IP4_SUFFIX: &str = ".in-addr.arpa";
const IP6_SUFFIX: &str = ".ip6.arpa";

/// Convert an address, CIDR, or existing ARPA name into a reverse-zone name.
///
/// Inputs already ending in `.in-addr.arpa` or `.ip6.arpa` (with or without
/// a final dot) are validated by reconstructing the address they imply and
/// returned as given, dot-terminated; casing and spacing of the labels are
/// not canonicalized. Anything else is parsed as an IP address (implying a
/// host-length mask) or a CIDR and converted to the delegated zone name for
/// that network.
pub fn zone_name(input: &str) -> Result<String, ZoneNameError> {
    let bare = input.strip_suffix('.').unwrap_or(input);
    if let Some(labels) = bare.strip_suffix(IP4_SUFFIX) {
        return reverse_v4_zone(input, labels);
    }
    if let Some(labels) = bare.strip_suffix(IP6_SUFFIX) {
        return reverse_v6_zone(input, labels);
    }
    cidr_zone(input)
}

/// Full host reverse name for an address: the `/32` (v4) or `/128` (v6) form.
pub fn reverse_name(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            format!("{}.{}.{}.{}{}.", o[3], o[2], o[1], o[0], IP4_SUFFIX)
        }
        IpAddr::V6(v6) => {
            let mut labels = Vec::with_capacity(32);
            for byte in v6.octets().iter().rev() {
                labels.push(format!("{:x}", byte & 0x0f));
                labels.push(format!("{:x}", byte >> 4));
            }
            format!("{}{}.", labels.join("."), IP6_SUFFIX)
        }
    }
}

/// Validate a claimed v4 zone name by un-reversing its octet labels.
fn reverse_v4_zone(original: &str, labels: &str) -> Result<String, ZoneNameError> {
    let mut parts: Vec<&str> = labels.split('.').collect();
    parts.reverse();
    let candidate = parts.join(".");
    if candidate.parse::<IpAddr>().is_err() {
        return Err(ZoneNameError::InvalidZoneName(original.to_string()));
    }
    Ok(add_term(original))
}

/// Validate a claimed v6 zone name by un-reversing its nibble labels.
///
/// Nibbles regroup into hextets four at a time; a label count that is not a
/// multiple of four (a partial zone) cannot rebuild a full address and is
/// rejected by the parse below.
fn reverse_v6_zone(original: &str, labels: &str) -> Result<String, ZoneNameError> {
    let mut parts: Vec<&str> = labels.split('.').collect();
    parts.reverse();
    let hextets: Vec<String> = parts.chunks_exact(4).map(|chunk| chunk.concat()).collect();
    let candidate = hextets.join(":");
    if candidate.parse::<IpAddr>().is_err() {
        return Err(ZoneNameError::InvalidZoneName(original.to_string()));
    }
    Ok(add_term(original))
}

/// Convert an IP or CIDR into the reverse-zone name delegated for it.
fn cidr_zone(input: &str) -> Result<String, ZoneNameError> {
    let (addr, prefix) = match input.split_once('/') {
        Some((addr_text, mask_text)) => {
            let addr: IpAddr = addr_text
                .parse()
                .map_err(|_| ZoneNameError::InvalidAddr(input.to_string()))?;
            let prefix: u8 = mask_text
                .parse()
                .map_err(|_| ZoneNameError::InvalidAddr(input.to_string()))?;
            (addr, prefix)
        }
        None => {
            let addr: IpAddr = input
                .parse()
                .map_err(|_| ZoneNameError::InvalidAddr(input.to_string()))?;
            let prefix = match addr {
                IpAddr::V4(_) => 32,
                IpAddr::V6(_) => 128,
            };
            (addr, prefix)
        }
    };

    let (total, unit) = match addr {
        IpAddr::V4(_) => (32u16, 8u16),
        IpAddr::V6(_) => (128u16, 4u16),
    };
    if u16::from(prefix) > total {
        return Err(ZoneNameError::InvalidAddr(input.to_string()));
    }
    if addr != mask_addr(addr, prefix) {
        return Err(ZoneNameError::HostBitsSet(input.to_string()));
    }
    if prefix == 0 {
        return Err(ZoneNameError::ZeroPrefix);
    }

    // RFC 2317 classless delegation for v4 networks smaller than a /24.
    if let IpAddr::V4(v4) = addr {
        if (25..32).contains(&prefix) {
            let o = v4.octets();
            return Ok(format!(
                "{}/{}.{}.{}.{}{}.",
                o[3], prefix, o[2], o[1], o[0], IP4_SUFFIX
            ));
        }
    }

    if u16::from(prefix) % unit != 0 {
        return Err(ZoneNameError::UnalignedMask(prefix));
    }

    // Drop one leading label per delegation unit outside the prefix.
    let full = reverse_name(addr);
    let base = full.trim_end_matches('.');
    let trim = usize::from((total - u16::from(prefix)) / unit);
    let zone = base.splitn(trim + 1, '.').last().unwrap_or(base);
    Ok(format!("{zone}."))
}

/// Zero out every bit beyond the prefix.
fn mask_addr(addr: IpAddr, prefix: u8) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let mask = if prefix == 0 {
                0
            } else {
                u32::MAX << (32 - u32::from(prefix))
            };
            IpAddr::V4(Ipv4Addr::from(u32::from(v4) & mask))
        }
        IpAddr::V6(v6) => {
            let mask = if prefix == 0 {
                0
            } else {
                u128::MAX << (128 - u32::from(prefix))
            };
            IpAddr::V6(Ipv6Addr::from(u128::from(v6) & mask))
        }
    }
}

fn add_term(s: &str) -> String {
    if s.ends_with('.') {
        s.to_string()
    } else {
        format!("{s}.")
    }
}
