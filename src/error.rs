//! Error types for homestead-dns.

use thiserror::Error;

/// Errors that can occur in the DNS server.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Reverse-zone name conversion error
    #[error("Zone name error: {0}")]
    Zone(#[from] ZoneNameError),

    /// Upstream nameserver exchange failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Record source fetch failed
    #[error("Source error: {0}")]
    Source(String),
}

/// Errors from converting addresses and CIDRs to reverse-DNS zone names.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ZoneNameError {
    /// Input parsed as neither an IP address nor a CIDR.
    #[error("not a valid IP address or CIDR: {0}")]
    InvalidAddr(String),

    /// Input looked like an ARPA zone name but does not reverse to a real address.
    #[error("{0} does not reverse to a valid address")]
    InvalidZoneName(String),

    /// CIDR prefix is neither octet-aligned (v4), nibble-aligned (v6), nor RFC 2317.
    #[error("prefix /{0} does not align to a delegatable reverse zone")]
    UnalignedMask(u8),

    /// A /0 covers every address and has no reverse zone.
    #[error("zero-length prefix has no reverse zone")]
    ZeroPrefix,

    /// CIDR address has bits set beyond its mask.
    #[error("{0} has host bits set beyond the mask")]
    HostBitsSet(String),
}
