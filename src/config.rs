//! Configuration types for homestead-dns.

use serde::Deserialize;
use std::net::SocketAddr;

use crate::records::{DomainRecords, NetPort, DEFAULT_DOMAIN};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    #[serde(default)]
    pub dns: DnsConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// DNS server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DnsConfig {
    /// Listener endpoints; empty means UDP on 0.0.0.0:53.
    #[serde(default)]
    pub listeners: Vec<NetPort>,

    /// Upstream nameservers, tried in order for names outside owned zones.
    #[serde(default)]
    pub nameservers: Vec<NetPort>,

    /// Static zones served from this file, in precedence order.
    #[serde(default)]
    pub zones: Vec<StaticZone>,

    /// TTL in seconds for locally-answered records.
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Log every routing decision at info level instead of debug.
    #[serde(default)]
    pub trace: bool,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            nameservers: Vec::new(),
            zones: Vec::new(),
            ttl: default_ttl(),
            trace: false,
        }
    }
}

/// One static zone: an owned domain and the records under it.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticZone {
    /// Domain the zone's records default to.
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Records served for this zone.
    #[serde(default)]
    pub records: DomainRecords,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "homestead_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ttl() -> u32 {
    60
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}
