//! Record data model: the four record families, the per-refresh bundle a
//! source returns, and the immutable lookup snapshot built from it.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::DnsError;

/// Port used when a listener or nameserver does not name one.
pub const DEFAULT_DNS_PORT: u16 = 53;

/// Domain used when a source or record does not name one.
pub const DEFAULT_DOMAIN: &str = "home";

/// Transport protocol for a listener or an upstream nameserver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Proto {
    /// Datagram transport, the DNS default.
    #[default]
    Udp,
    /// Stream transport with two-byte length framing.
    Tcp,
}

impl FromStr for Proto {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            // An unset protocol means UDP.
            "" | "udp" => Ok(Proto::Udp),
            "tcp" => Ok(Proto::Tcp),
            other => Err(DnsError::Config(format!("unknown protocol {other:?}"))),
        }
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proto::Udp => f.write_str("udp"),
            Proto::Tcp => f.write_str("tcp"),
        }
    }
}

impl<'de> Deserialize<'de> for Proto {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A listener address or upstream nameserver endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetPort {
    /// Address to bind or dial.
    pub ip: IpAddr,
    /// Port; 0 falls back to the DNS default of 53.
    #[serde(default)]
    pub port: u16,
    /// Transport protocol.
    #[serde(default)]
    pub proto: Proto,
}

impl NetPort {
    /// Socket address with the default DNS port applied when unset.
    pub fn socket_addr(&self) -> SocketAddr {
        let port = if self.port == 0 {
            DEFAULT_DNS_PORT
        } else {
            self.port
        };
        SocketAddr::new(self.ip, port)
    }
}

impl fmt::Display for NetPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.socket_addr(), self.proto)
    }
}

/// An address record; the A and AAAA families share this shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AddressRecord {
    /// Domain the hostname lives under; blank means the source's owned domain.
    pub domain: String,
    /// Bare hostname, normalized before the key is derived.
    pub hostname: String,
    /// Address value as text, parsed only when an answer is built.
    pub ip: String,
    /// Tag identifying which source produced the record.
    pub src: String,
}

impl AddressRecord {
    /// Lookup key: normalized `hostname.domain.`.
    pub fn key(&self) -> String {
        record_key(&self.hostname, &self.domain)
    }
}

/// A reverse-lookup record, keyed directly by its ARPA zone name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PtrRecord {
    /// Fully-qualified reverse-zone name, e.g. `10.1.168.192.in-addr.arpa.`.
    pub arpa: String,
    /// Bare hostname the address points back to.
    pub hostname: String,
    /// Domain the hostname lives under; blank means the source's owned domain.
    pub domain: String,
    /// Tag identifying which source produced the record.
    pub src: String,
}

impl PtrRecord {
    /// Lookup key: the ARPA name itself, lowercased and dot-terminated.
    pub fn key(&self) -> String {
        ptr_key(&self.arpa)
    }

    /// Normalized `hostname.domain.` this reverse name points back to.
    pub fn target_fqdn(&self) -> String {
        record_key(&self.hostname, &self.domain)
    }
}

/// An alias record mapping one FQDN onto another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CnameRecord {
    /// Bare alias hostname.
    pub alias_hostname: String,
    /// Domain of the alias; blank means the source's owned domain.
    pub alias_domain: String,
    /// Bare target hostname.
    pub target_hostname: String,
    /// Domain of the target; blank means the source's owned domain.
    pub target_domain: String,
    /// Tag identifying which source produced the record.
    pub src: String,
}

impl CnameRecord {
    /// Lookup key: normalized alias FQDN.
    pub fn key(&self) -> String {
        record_key(&self.alias_hostname, &self.alias_domain)
    }

    /// Normalized target FQDN this alias points at.
    pub fn target_fqdn(&self) -> String {
        record_key(&self.target_hostname, &self.target_domain)
    }
}

/// Everything one refresh of one source produced.
///
/// Also the on-disk shape of a static zone's `records` table, so every field
/// deserializes with defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DomainRecords {
    /// IPv4 address records.
    pub a: Vec<AddressRecord>,
    /// IPv6 address records.
    pub aaaa: Vec<AddressRecord>,
    /// Reverse-lookup records.
    pub ptr: Vec<PtrRecord>,
    /// Alias records.
    pub cname: Vec<CnameRecord>,
}

impl DomainRecords {
    /// Total records across the four families.
    pub fn len(&self) -> usize {
        self.a.len() + self.aaaa.len() + self.ptr.len() + self.cname.len()
    }

    /// True when no family has any records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append every record from `other`.
    pub fn extend(&mut self, other: DomainRecords) {
        self.a.extend(other.a);
        self.aaaa.extend(other.aaaa);
        self.ptr.extend(other.ptr);
        self.cname.extend(other.cname);
    }
}

/// The record families answered from local data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// IPv4 address records.
    A,
    /// IPv6 address records.
    Aaaa,
    /// Reverse-lookup records.
    Ptr,
    /// Alias records.
    Cname,
}

/// Immutable lookup maps built from one successful refresh.
///
/// A snapshot is constructed entirely off to the side and published by
/// pointer swap, so readers never observe a partially-built one.
#[derive(Debug, Default, PartialEq)]
pub struct Snapshot {
    a: HashMap<String, AddressRecord>,
    aaaa: HashMap<String, AddressRecord>,
    ptr: HashMap<String, PtrRecord>,
    cname: HashMap<String, CnameRecord>,
}

impl Snapshot {
    /// Build the lookup maps from one refresh.
    ///
    /// Records are cloned before mutation, blank domains (for CNAMEs, both
    /// the alias and target domain independently) default to `owned_domain`,
    /// and later records with the same key overwrite earlier ones.
    pub fn build(records: &DomainRecords, owned_domain: &str) -> Self {
        let mut snap = Snapshot::default();
        for rec in &records.a {
            let mut rec = rec.clone();
            if rec.domain.is_empty() {
                rec.domain = owned_domain.to_string();
            }
            snap.a.insert(rec.key(), rec);
        }
        for rec in &records.aaaa {
            let mut rec = rec.clone();
            if rec.domain.is_empty() {
                rec.domain = owned_domain.to_string();
            }
            snap.aaaa.insert(rec.key(), rec);
        }
        for rec in &records.ptr {
            let mut rec = rec.clone();
            if rec.domain.is_empty() {
                rec.domain = owned_domain.to_string();
            }
            snap.ptr.insert(rec.key(), rec);
        }
        for rec in &records.cname {
            let mut rec = rec.clone();
            if rec.alias_domain.is_empty() {
                rec.alias_domain = owned_domain.to_string();
            }
            if rec.target_domain.is_empty() {
                rec.target_domain = owned_domain.to_string();
            }
            snap.cname.insert(rec.key(), rec);
        }
        snap
    }

    /// Look up an A record by lowercased FQDN.
    pub fn a(&self, key: &str) -> Option<&AddressRecord> {
        self.a.get(key)
    }

    /// Look up an AAAA record by lowercased FQDN.
    pub fn aaaa(&self, key: &str) -> Option<&AddressRecord> {
        self.aaaa.get(key)
    }

    /// Look up a PTR record by lowercased ARPA name.
    pub fn ptr(&self, key: &str) -> Option<&PtrRecord> {
        self.ptr.get(key)
    }

    /// Look up a CNAME record by lowercased alias FQDN.
    pub fn cname(&self, key: &str) -> Option<&CnameRecord> {
        self.cname.get(key)
    }

    /// Total records across the four families.
    pub fn len(&self) -> usize {
        self.a.len() + self.aaaa.len() + self.ptr.len() + self.cname.len()
    }

    /// True when no family has any records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten back into a per-source bundle for inventory consumers.
    pub fn to_domain_records(&self) -> DomainRecords {
        DomainRecords {
            a: self.a.values().cloned().collect(),
            aaaa: self.aaaa.values().cloned().collect(),
            ptr: self.ptr.values().cloned().collect(),
            cname: self.cname.values().cloned().collect(),
        }
    }
}

/// Normalize a bare hostname: lowercase with whitespace runs collapsed to `-`.
pub fn clean_hostname(hostname: &str) -> String {
    hostname
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Derive the lookup key `hostname.domain.` with exactly one trailing dot.
pub fn record_key(hostname: &str, domain: &str) -> String {
    format!(
        "{}.{}.",
        clean_hostname(hostname),
        domain.trim().trim_end_matches('.').to_lowercase()
    )
}

/// Normalize an ARPA name for use as a lookup key.
pub fn ptr_key(arpa: &str) -> String {
    let arpa = arpa.trim().to_lowercase();
    if arpa.ends_with('.') {
        arpa
    } else {
        format!("{arpa}.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a_record(hostname: &str, domain: &str, ip: &str) -> AddressRecord {
        AddressRecord {
            domain: domain.to_string(),
            hostname: hostname.to_string(),
            ip: ip.to_string(),
            src: "test".to_string(),
        }
    }

    #[test]
    fn test_clean_hostname_collapses_whitespace() {
        assert_eq!(clean_hostname("My Cool  Printer"), "my-cool-printer");
        assert_eq!(clean_hostname("  web  "), "web");
        assert_eq!(clean_hostname("WEB"), "web");
    }

    #[test]
    fn test_record_key_normalizes_domain() {
        assert_eq!(record_key("Web", "Home"), "web.home.");
        assert_eq!(record_key("web", "home."), "web.home.");
        assert_eq!(record_key("web", " home "), "web.home.");
    }

    #[test]
    fn test_ptr_key_appends_missing_dot() {
        assert_eq!(ptr_key("10.1.168.192.in-addr.arpa"), "10.1.168.192.in-addr.arpa.");
        assert_eq!(ptr_key("10.1.168.192.IN-ADDR.ARPA."), "10.1.168.192.in-addr.arpa.");
    }

    #[test]
    fn test_proto_from_str() {
        assert_eq!("udp".parse::<Proto>().unwrap(), Proto::Udp);
        assert_eq!("TCP".parse::<Proto>().unwrap(), Proto::Tcp);
        assert_eq!("".parse::<Proto>().unwrap(), Proto::Udp);
        assert!("sctp".parse::<Proto>().is_err());
    }

    #[test]
    fn test_netport_socket_addr_defaults_port() {
        let np = NetPort {
            ip: "10.0.0.53".parse().unwrap(),
            port: 0,
            proto: Proto::Udp,
        };
        assert_eq!(np.socket_addr().port(), 53);

        let np = NetPort {
            ip: "10.0.0.53".parse().unwrap(),
            port: 5353,
            proto: Proto::Tcp,
        };
        assert_eq!(np.socket_addr().port(), 5353);
    }

    #[test]
    fn test_snapshot_defaults_blank_domains() {
        let mut records = DomainRecords::default();
        records.a.push(a_record("web", "", "192.168.1.10"));
        records.cname.push(CnameRecord {
            alias_hostname: "www".to_string(),
            alias_domain: String::new(),
            target_hostname: "web".to_string(),
            target_domain: String::new(),
            src: "test".to_string(),
        });

        let snap = Snapshot::build(&records, "home");
        assert!(snap.a("web.home.").is_some());

        let cname = snap.cname("www.home.").unwrap();
        assert_eq!(cname.target_fqdn(), "web.home.");
    }

    #[test]
    fn test_snapshot_keeps_explicit_domains() {
        let mut records = DomainRecords::default();
        records.a.push(a_record("web", "lan", "192.168.1.10"));

        let snap = Snapshot::build(&records, "home");
        assert!(snap.a("web.home.").is_none());
        assert!(snap.a("web.lan.").is_some());
    }

    #[test]
    fn test_snapshot_later_duplicate_wins() {
        let mut records = DomainRecords::default();
        records.a.push(a_record("web", "home", "192.168.1.10"));
        records.a.push(a_record("web", "home", "192.168.1.20"));

        let snap = Snapshot::build(&records, "home");
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.a("web.home.").unwrap().ip, "192.168.1.20");
    }

    #[test]
    fn test_snapshot_flattens_back_to_records() {
        let mut records = DomainRecords::default();
        records.a.push(a_record("web", "home", "192.168.1.10"));
        records.ptr.push(PtrRecord {
            arpa: "10.1.168.192.in-addr.arpa.".to_string(),
            hostname: "web".to_string(),
            domain: "home".to_string(),
            src: "test".to_string(),
        });

        let snap = Snapshot::build(&records, "home");
        let flat = snap.to_domain_records();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat.a.len(), 1);
        assert_eq!(flat.ptr.len(), 1);
    }

    #[test]
    fn test_source_records_never_mutated() {
        let mut records = DomainRecords::default();
        records.a.push(a_record("web", "", "192.168.1.10"));

        let _ = Snapshot::build(&records, "home");
        assert_eq!(records.a[0].domain, "");
    }
}
