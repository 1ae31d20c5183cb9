//! Homestead DNS - A local resolver for owned domains and private reverse zones.
//!
//! This crate provides a DNS server that answers queries for configured local
//! domains (and the private reverse zones) from locally-aggregated records,
//! and forwards every other query to a list of upstream nameservers tried in
//! order.
//!
//! ## Features
//!
//! - Static records from configuration, with PTR records derived automatically
//! - Pluggable record sources refreshed on their own schedules
//! - Ordered upstream forwarding over UDP or TCP with failover
//! - Graceful shutdown support
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                         homestead-dns                          │
//! │                                                                │
//! │  ┌────────────────┐     ┌─────────────────┐                    │
//! │  │ Record sources │────▶│  Record stores  │                    │
//! │  │ (periodic      │     │  (snapshots)    │                    │
//! │  │  refresh)      │     └────────┬────────┘                    │
//! │  └────────────────┘              │ owned zones                 │
//! │                                  ▼                             │
//! │    upstream                ┌──────────────┐                    │
//! │   nameservers ◀────────────│ Query router │◀── UDP/TCP :53     │
//! │   (everything else)        └──────────────┘                    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Resolution
//!
//! ```text
//! web.home. A
//!   → under an owned zone (configured domains + private reverse zones)
//!   → first provider holding the record answers; miss is an empty NoError
//!
//! example.com. A
//!   → outside every owned zone
//!   → forwarded to the first upstream that answers successfully
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use homestead_dns::{DnsConfig, DnsServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = DnsConfig::default();
//!     let cancel = CancellationToken::new();
//!
//!     let server = DnsServer::new(config).unwrap();
//!     server.run(cancel).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod arpa;
pub mod config;
pub mod error;
pub mod forward;
pub mod metrics;
pub mod records;
pub mod router;
pub mod server;
pub mod source;
pub mod store;
pub mod telemetry;

// Re-export main types
pub use config::{Config, DnsConfig, StaticZone, TelemetryConfig};
pub use error::{DnsError, ZoneNameError};
pub use records::{AddressRecord, CnameRecord, DomainRecords, NetPort, Proto, PtrRecord};
pub use router::QueryRouter;
pub use server::DnsServer;
pub use source::{Source, StaticSource};
pub use store::RecordStore;
