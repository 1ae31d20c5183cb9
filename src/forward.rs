//! Upstream DNS exchange clients.
//!
//! One client exists per transport mode and is shared by every forwarded
//! query; each exchange opens an ephemeral socket, so the clients carry no
//! connection state and need no locking.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use hickory_proto::op::Message;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;

use crate::error::DnsError;
use crate::records::Proto;

/// Fixed per-exchange deadline covering connect, send, and receive.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest UDP payload accepted from an upstream.
const MAX_UDP_PAYLOAD: usize = 4096;

/// Client for one transport mode, safe for concurrent use.
#[derive(Debug, Clone, Copy)]
pub struct ForwardClient {
    proto: Proto,
}

impl ForwardClient {
    /// Client for the given transport mode.
    pub fn new(proto: Proto) -> Self {
        Self { proto }
    }

    /// Send `query` to `upstream` and await its reply.
    pub async fn exchange(
        &self,
        query: &Message,
        upstream: SocketAddr,
    ) -> Result<Message, DnsError> {
        let exchange = async {
            match self.proto {
                Proto::Udp => self.exchange_udp(query, upstream).await,
                Proto::Tcp => self.exchange_tcp(query, upstream).await,
            }
        };
        match timeout(EXCHANGE_TIMEOUT, exchange).await {
            Ok(result) => result,
            Err(_) => Err(DnsError::Upstream(format!("{upstream}: exchange timed out"))),
        }
    }

    async fn exchange_udp(
        &self,
        query: &Message,
        upstream: SocketAddr,
    ) -> Result<Message, DnsError> {
        // Bind in the upstream's address family; the connect filters out
        // datagrams from anyone else.
        let bind: SocketAddr = match upstream.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(upstream).await?;
        socket.send(&query.to_vec()?).await?;

        let mut buf = vec![0u8; MAX_UDP_PAYLOAD];
        let len = socket.recv(&mut buf).await?;
        let reply = Message::from_vec(&buf[..len])?;
        if reply.id() != query.id() {
            return Err(DnsError::Upstream(format!(
                "{upstream}: response id {} does not match query id {}",
                reply.id(),
                query.id()
            )));
        }
        Ok(reply)
    }

    async fn exchange_tcp(
        &self,
        query: &Message,
        upstream: SocketAddr,
    ) -> Result<Message, DnsError> {
        let mut stream = TcpStream::connect(upstream).await?;

        let wire = query.to_vec()?;
        let frame_len = u16::try_from(wire.len()).map_err(|_| {
            DnsError::Upstream(format!("{upstream}: query too large for tcp framing"))
        })?;
        stream.write_all(&frame_len.to_be_bytes()).await?;
        stream.write_all(&wire).await?;

        let mut len_buf = [0u8; 2];
        stream.read_exact(&mut len_buf).await?;
        let mut reply_buf = vec![0u8; usize::from(u16::from_be_bytes(len_buf))];
        stream.read_exact(&mut reply_buf).await?;

        let reply = Message::from_vec(&reply_buf)?;
        if reply.id() != query.id() {
            return Err(DnsError::Upstream(format!(
                "{upstream}: response id {} does not match query id {}",
                reply.id(),
                query.id()
            )));
        }
        Ok(reply)
    }
}
