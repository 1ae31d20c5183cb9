//! DNS server setup and lifecycle management.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use hickory_server::ServerFuture;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::DnsConfig;
use crate::error::DnsError;
use crate::records::{NetPort, Proto, DEFAULT_DNS_PORT};
use crate::router::QueryRouter;
use crate::source::StaticSource;
use crate::store::RecordStore;

/// Idle timeout for accepted TCP connections.
const TCP_TIMEOUT: Duration = Duration::from_secs(30);

/// The listeners to bind, defaulting to UDP on every interface.
fn effective_listeners(config: &DnsConfig) -> Vec<NetPort> {
    if config.listeners.is_empty() {
        vec![NetPort {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_DNS_PORT,
            proto: Proto::Udp,
        }]
    } else {
        config.listeners.clone()
    }
}

/// DNS server answering owned zones from local record stores and forwarding
/// the rest upstream.
pub struct DnsServer {
    config: DnsConfig,
    providers: Vec<Arc<RecordStore>>,
    router: QueryRouter,
}

impl DnsServer {
    /// Create a new DNS server with the given configuration.
    ///
    /// Each configured zone becomes a provider backed by the static source;
    /// provider order follows configuration order.
    pub fn new(config: DnsConfig) -> Result<Self, DnsError> {
        let providers: Vec<Arc<RecordStore>> = config
            .zones
            .iter()
            .cloned()
            .map(|zone| Arc::new(RecordStore::new(Arc::new(StaticSource::new(zone)))))
            .collect();

        let router = QueryRouter::new(
            providers.clone(),
            config.nameservers.clone(),
            config.ttl,
            config.trace,
        )?;

        Ok(Self {
            config,
            providers,
            router,
        })
    }

    /// Get a handle to the query router.
    pub fn router(&self) -> &QueryRouter {
        &self.router
    }

    /// Run the DNS server until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), DnsError> {
        info!(
            zones = self.router.zones().len(),
            nameservers = self.config.nameservers.len(),
            "starting dns server"
        );

        // A provider whose initial load fails is fatal; scheduled refreshes
        // retry on their own after this point.
        for store in &self.providers {
            if let Err(e) = store.start().await {
                self.shutdown_stores();
                return Err(e);
            }
            info!(
                source = store.source_name(),
                domain = store.domain(),
                "record store started"
            );
        }

        let mut server = match self.bind_listeners().await {
            Ok(server) => server,
            // Stores may already be running refresh tasks at this point.
            Err(e) => {
                self.shutdown_stores();
                return Err(e);
            }
        };

        info!("dns server ready to serve queries");

        // A listener fault is the only process-fatal runtime error; it still
        // goes through the store shutdown below before surfacing.
        let mut serve_result = Ok(());
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("dns server shutdown requested");
            }
            result = server.block_until_done() => {
                if let Err(e) = result {
                    error!(error = %e, "dns server error");
                    serve_result = Err(DnsError::from(e));
                }
            }
        }

        self.shutdown_stores();

        info!("dns server stopped");
        serve_result
    }

    /// Bind every configured listener onto a server driving the router.
    async fn bind_listeners(&self) -> Result<ServerFuture<QueryRouter>, DnsError> {
        let mut server = ServerFuture::new(self.router.clone());
        for listener in effective_listeners(&self.config) {
            let addr = listener.socket_addr();
            match listener.proto {
                Proto::Udp => {
                    let socket = UdpSocket::bind(addr).await?;
                    info!(%addr, "dns udp listening");
                    server.register_socket(socket);
                }
                Proto::Tcp => {
                    let tcp = TcpListener::bind(addr).await?;
                    info!(%addr, "dns tcp listening");
                    server.register_listener(tcp, TCP_TIMEOUT);
                }
            }
        }
        Ok(server)
    }

    /// Stop every provider's refresh task.
    fn shutdown_stores(&self) {
        for store in &self.providers {
            store.shutdown();
        }
    }
}
