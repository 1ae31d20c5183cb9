//! Record sources.
//!
//! A source produces a fresh [`DomainRecords`] bundle on demand; the record
//! store schedules those fetches and publishes the results. Network-backed
//! inventories live outside this crate and plug in through the same trait;
//! the built-in [`StaticSource`] serves records written directly in the
//! configuration file.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::arpa;
use crate::config::StaticZone;
use crate::error::DnsError;
use crate::records::{AddressRecord, CnameRecord, DomainRecords, PtrRecord, DEFAULT_DOMAIN};

/// Source tag for records written directly in static config.
pub const SRC_STATIC: &str = "config:static";
/// Source tag for PTR records derived from configured address records.
pub const SRC_DYNAMIC: &str = "config:dynamic";
/// Source tag for an explicit PTR that also matched a derived one.
pub const SRC_STATIC_AND_DYNAMIC: &str = "config:static-and-dynamic";

/// A provider of DNS records for one owned domain.
#[async_trait]
pub trait Source: Send + Sync {
    /// Short name for logs and metrics.
    fn name(&self) -> &str;

    /// Domain that blank record domains default to.
    fn domain(&self) -> &str;

    /// Refresh cadence; `None` or a zero duration means fetch exactly once
    /// at startup.
    fn refresh_interval(&self) -> Option<Duration>;

    /// Produce a fresh bundle of records.
    async fn fetch_records(&self) -> Result<DomainRecords, DnsError>;
}

/// Source backed by one static zone from the configuration file.
///
/// Every fetch re-validates the configured records, derives a PTR record for
/// each address record, and normalizes explicitly configured PTR names
/// through the reverse-name codec. Any invalid record fails the whole batch;
/// static zones are one-shot sources, so a bad zone aborts startup instead
/// of serving a partial domain.
pub struct StaticSource {
    domain: String,
    records: DomainRecords,
}

impl StaticSource {
    /// Build a source from one configured zone, defaulting a blank domain.
    pub fn new(zone: StaticZone) -> Self {
        let domain = if zone.domain.is_empty() {
            DEFAULT_DOMAIN.to_string()
        } else {
            zone.domain
        };
        Self {
            domain,
            records: zone.records,
        }
    }

    /// Validate and tag a configured address record.
    fn address_record(&self, rec: &AddressRecord) -> Result<AddressRecord, DnsError> {
        if rec.hostname.is_empty() || rec.ip.is_empty() {
            return Err(DnsError::Config(format!(
                "static zone {:?}: address record missing hostname or ip",
                self.domain
            )));
        }
        let mut rec = rec.clone();
        if rec.domain.is_empty() {
            rec.domain = self.domain.clone();
        }
        rec.src = SRC_STATIC.to_string();
        Ok(rec)
    }

    /// Derive the reverse-lookup record for an address record.
    fn derived_ptr(&self, rec: &AddressRecord) -> Result<PtrRecord, DnsError> {
        let arpa = arpa::zone_name(&rec.ip)?;
        Ok(PtrRecord {
            arpa,
            hostname: rec.hostname.clone(),
            domain: rec.domain.clone(),
            src: SRC_DYNAMIC.to_string(),
        })
    }

    /// Validate and tag a configured alias record.
    fn cname_record(&self, rec: &CnameRecord) -> Result<CnameRecord, DnsError> {
        if rec.alias_hostname.is_empty() || rec.target_hostname.is_empty() {
            return Err(DnsError::Config(format!(
                "static zone {:?}: cname record missing alias or target hostname",
                self.domain
            )));
        }
        let mut rec = rec.clone();
        if rec.alias_domain.is_empty() {
            rec.alias_domain = self.domain.clone();
        }
        if rec.target_domain.is_empty() {
            rec.target_domain = self.domain.clone();
        }
        rec.src = SRC_STATIC.to_string();
        Ok(rec)
    }
}

#[async_trait]
impl Source for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    fn domain(&self) -> &str {
        &self.domain
    }

    fn refresh_interval(&self) -> Option<Duration> {
        None
    }

    async fn fetch_records(&self) -> Result<DomainRecords, DnsError> {
        let mut out = DomainRecords::default();
        let mut derived: HashMap<String, PtrRecord> = HashMap::new();

        for rec in &self.records.a {
            let rec = self.address_record(rec)?;
            let ptr = self.derived_ptr(&rec)?;
            derived.insert(ptr.key(), ptr);
            out.a.push(rec);
        }
        for rec in &self.records.aaaa {
            let rec = self.address_record(rec)?;
            let ptr = self.derived_ptr(&rec)?;
            derived.insert(ptr.key(), ptr);
            out.aaaa.push(rec);
        }
        for rec in &self.records.cname {
            out.cname.push(self.cname_record(rec)?);
        }

        // Explicit PTRs override derived ones for the same reverse name; the
        // surviving record is tagged as coming from both.
        let mut explicit = Vec::new();
        for rec in &self.records.ptr {
            if rec.hostname.is_empty() {
                return Err(DnsError::Config(format!(
                    "static zone {:?}: ptr record missing hostname",
                    self.domain
                )));
            }
            let mut rec = rec.clone();
            rec.arpa = arpa::zone_name(&rec.arpa)?;
            if rec.domain.is_empty() {
                rec.domain = self.domain.clone();
            }
            rec.src = if derived.remove(&rec.key()).is_some() {
                SRC_STATIC_AND_DYNAMIC.to_string()
            } else {
                SRC_STATIC.to_string()
            };
            explicit.push(rec);
        }

        out.ptr = derived.into_values().collect();
        out.ptr.extend(explicit);
        Ok(out)
    }
}
