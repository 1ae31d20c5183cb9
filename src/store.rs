//! Per-source record cache with scheduled refresh.
//!
//! Each store wraps one [`Source`], keeps the latest successfully fetched
//! snapshot behind a reader/writer lock, and reschedules itself after every
//! fetch. Lookups read whatever snapshot is currently published and are
//! never blocked by an in-flight fetch.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::DnsError;
use crate::metrics::{self, RefreshResult, Timer};
use crate::records::{RecordKind, Snapshot};
use crate::source::Source;

/// Delay before retrying after a failed refresh, regardless of the source's
/// normal cadence. Bounds recovery latency without busy-looping.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// One matched record, reduced to what an answer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAnswer {
    /// Address text for A/AAAA, target FQDN for PTR/CNAME.
    pub value: String,
    /// Source tag of the matched record.
    pub src: String,
}

/// Caches records from one source and keeps them fresh.
pub struct RecordStore {
    source: Arc<dyn Source>,
    snapshot: RwLock<Arc<Snapshot>>,
    cancel: CancellationToken,
}

impl RecordStore {
    /// Wrap a source, starting with an empty published snapshot.
    pub fn new(source: Arc<dyn Source>) -> Self {
        Self {
            source,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            cancel: CancellationToken::new(),
        }
    }

    /// Source name, for logs and metrics.
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Owned domain this store answers for.
    pub fn domain(&self) -> &str {
        self.source.domain()
    }

    /// Run the initial fetch and, for refreshing sources, start the
    /// background refresh task.
    ///
    /// One-shot sources (no refresh interval, or a zero one) fetch
    /// synchronously here and any failure is fatal: they would otherwise
    /// never recover. Refreshing sources tolerate a failed initial fetch,
    /// serving empty records until the retry fires.
    pub async fn start(self: &Arc<Self>) -> Result<(), DnsError> {
        let interval = match self.source.refresh_interval() {
            Some(interval) if !interval.is_zero() => interval,
            // A zero interval would arm a zero-delay timer and spin.
            _ => {
                self.refresh().await?;
                return Ok(());
            }
        };

        let first = match self.refresh().await {
            Ok(()) => interval,
            Err(e) => {
                warn!(
                    source = self.source.name(),
                    domain = self.source.domain(),
                    error = %e,
                    retry_secs = RETRY_INTERVAL.as_secs(),
                    "initial fetch failed, serving empty records until retry"
                );
                RETRY_INTERVAL
            }
        };

        let store = Arc::clone(self);
        tokio::spawn(async move { store.refresh_loop(interval, first).await });
        Ok(())
    }

    /// Background refresh task. Fetches are strictly sequential: the next
    /// timer is armed only after the previous result was published.
    async fn refresh_loop(self: Arc<Self>, interval: Duration, mut next: Duration) {
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!(
                        source = self.source.name(),
                        domain = self.source.domain(),
                        "refresh task stopping"
                    );
                    return;
                }

                _ = sleep(next) => {}
            }

            next = match self.refresh().await {
                Ok(()) => interval,
                Err(e) => {
                    warn!(
                        source = self.source.name(),
                        domain = self.source.domain(),
                        error = %e,
                        retry_secs = RETRY_INTERVAL.as_secs(),
                        "refresh failed, keeping previous records"
                    );
                    RETRY_INTERVAL
                }
            };
        }
    }

    /// Fetch once and publish the resulting snapshot.
    ///
    /// The snapshot is built completely before the write lock is taken; the
    /// lock covers only the pointer swap, and a failed fetch leaves the
    /// previous snapshot untouched.
    async fn refresh(&self) -> Result<(), DnsError> {
        let timer = Timer::start();
        let records = match self.source.fetch_records().await {
            Ok(records) => records,
            Err(e) => {
                metrics::record_refresh(self.source.name(), RefreshResult::Error, timer.elapsed());
                return Err(e);
            }
        };

        let snapshot = Arc::new(Snapshot::build(&records, self.source.domain()));
        let count = snapshot.len();
        *self.snapshot.write() = snapshot;

        metrics::record_refresh(self.source.name(), RefreshResult::Success, timer.elapsed());
        metrics::record_store_records(self.source.name(), self.source.domain(), count);
        debug!(
            source = self.source.name(),
            domain = self.source.domain(),
            records = count,
            "published records snapshot"
        );
        Ok(())
    }

    /// Look up one record in the current snapshot.
    ///
    /// `key` must be a lowercased FQDN (an ARPA name for PTR lookups).
    pub fn lookup(&self, kind: RecordKind, key: &str) -> Option<LocalAnswer> {
        let snapshot = self.snapshot();
        match kind {
            RecordKind::A => snapshot.a(key).map(|r| LocalAnswer {
                value: r.ip.clone(),
                src: r.src.clone(),
            }),
            RecordKind::Aaaa => snapshot.aaaa(key).map(|r| LocalAnswer {
                value: r.ip.clone(),
                src: r.src.clone(),
            }),
            RecordKind::Ptr => snapshot.ptr(key).map(|r| LocalAnswer {
                value: r.target_fqdn(),
                src: r.src.clone(),
            }),
            RecordKind::Cname => snapshot.cname(key).map(|r| LocalAnswer {
                value: r.target_fqdn(),
                src: r.src.clone(),
            }),
        }
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Stop the background refresh task. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
