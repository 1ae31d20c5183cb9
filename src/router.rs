//! Query routing: local answers from record stores, forwarding for
//! everything else.
//!
//! The router owns the providers in precedence order and an ordered upstream
//! list. A query under an owned zone is answered from the first provider
//! that has a matching record; a query outside every owned zone is forwarded
//! to the first upstream that answers successfully.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use async_trait::async_trait;
use hickory_proto::op::{Header, LowerQuery, Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA, CNAME, PTR};
use hickory_proto::rr::{LowerName, Name, RData, Record, RecordType};
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use tracing::{debug, error, info, warn};

use crate::error::DnsError;
use crate::forward::ForwardClient;
use crate::metrics::{self, QueryResult, Timer};
use crate::records::{DomainRecords, NetPort, Proto, RecordKind};
use crate::store::RecordStore;

/// Private reverse zones always answered locally, never forwarded.
const PRIVATE_ARPA_ZONES: [&str; 4] = [
    "10.in-addr.arpa.",
    "168.192.in-addr.arpa.",
    "0.0.16.127.in-addr.arpa.",
    "0.0.168.192.in-addr.arpa.",
];

/// Routes queries between local record stores and upstream nameservers.
///
/// Cheap to clone; clones share the same providers and upstream clients.
#[derive(Clone)]
pub struct QueryRouter {
    providers: Arc<Vec<Arc<RecordStore>>>,
    nameservers: Arc<Vec<NetPort>>,
    zones: Arc<Vec<LowerName>>,
    udp_client: ForwardClient,
    tcp_client: ForwardClient,
    ttl: u32,
    trace: bool,
}

impl QueryRouter {
    /// Build a router over `providers` in precedence order.
    ///
    /// Owned zones are each provider's domain plus the fixed private reverse
    /// zones, lowercased and deduplicated. A provider domain that is not a
    /// legal DNS name is a construction error.
    pub fn new(
        providers: Vec<Arc<RecordStore>>,
        nameservers: Vec<NetPort>,
        ttl: u32,
        trace: bool,
    ) -> Result<Self, DnsError> {
        let zones = owned_zones(&providers)?;
        Ok(Self {
            providers: Arc::new(providers),
            nameservers: Arc::new(nameservers),
            zones: Arc::new(zones),
            udp_client: ForwardClient::new(Proto::Udp),
            tcp_client: ForwardClient::new(Proto::Tcp),
            ttl,
            trace,
        })
    }

    /// The zones this router answers from local data.
    pub fn zones(&self) -> &[LowerName] {
        &self.zones
    }

    /// Union of every provider's current snapshot, in provider order.
    ///
    /// Freshness is whatever each provider's last successful refresh was.
    pub fn current_records(&self) -> DomainRecords {
        let mut all = DomainRecords::default();
        for store in self.providers.iter() {
            all.extend(store.snapshot().to_domain_records());
        }
        all
    }

    fn is_owned(&self, name: &LowerName) -> bool {
        self.zones.iter().any(|zone| zone.zone_of(name))
    }

    /// Answer a query under an owned zone from the providers.
    ///
    /// Providers are scanned in order and the first match wins, so provider
    /// order encodes precedence; there is no merging across providers. A
    /// miss or an unsupported query type gets an empty authoritative
    /// no-error answer.
    async fn answer_local<R: ResponseHandler>(
        &self,
        request: &Request,
        query: &LowerQuery,
        mut response_handle: R,
        timer: Timer,
    ) -> ResponseInfo {
        let qtype = query.query_type();
        let key = query.name().to_string();

        let mut answers = Vec::new();
        let mut result = QueryResult::Miss;
        if let Some(kind) = record_kind(qtype) {
            for store in self.providers.iter() {
                let Some(answer) = store.lookup(kind, &key) else {
                    continue;
                };
                match build_rdata(kind, &answer.value) {
                    Some(rdata) => {
                        debug!(
                            name = %key,
                            qtype = %qtype,
                            source = %answer.src,
                            value = %answer.value,
                            "answered from local records"
                        );
                        // Echo the client's name casing back in the answer.
                        let name = query.original().name().clone();
                        answers.push(Record::from_rdata(name, self.ttl, rdata));
                        result = QueryResult::Local;
                    }
                    None => {
                        warn!(
                            name = %key,
                            qtype = %qtype,
                            value = %answer.value,
                            "matched record value does not parse, answering empty"
                        );
                    }
                }
                break;
            }
        }

        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);
        header.set_response_code(ResponseCode::NoError);
        let response = MessageResponseBuilder::from_message_request(request).build(
            header,
            answers.iter(),
            &[],
            &[],
            &[],
        );
        let info = match response_handle.send_response(response).await {
            Ok(info) => info,
            Err(e) => {
                error!(error = %e, "failed to send local response");
                ResponseInfo::from(header)
            }
        };
        metrics::record_query(&qtype.to_string(), result, timer.elapsed());
        info
    }

    /// Forward a query to the upstreams in order.
    ///
    /// The first reply with a no-error code is copied back to the client;
    /// failures and non-success codes move on to the next upstream.
    /// Exhaustion answers a server failure.
    async fn forward<R: ResponseHandler>(
        &self,
        request: &Request,
        query: &LowerQuery,
        mut response_handle: R,
        timer: Timer,
    ) -> ResponseInfo {
        let qtype = query.query_type();
        let fwd = build_forward_query(request, query);

        for ns in self.nameservers.iter() {
            let upstream = ns.socket_addr();
            let client = match ns.proto {
                Proto::Udp => &self.udp_client,
                Proto::Tcp => &self.tcp_client,
            };
            match client.exchange(&fwd, upstream).await {
                Ok(reply) if reply.response_code() == ResponseCode::NoError => {
                    metrics::record_forward(&upstream.to_string(), true);
                    debug!(
                        name = %query.name(),
                        qtype = %qtype,
                        %upstream,
                        answers = reply.answers().len(),
                        "forwarded query answered"
                    );

                    let mut header = Header::response_from_request(request.header());
                    header.set_response_code(reply.response_code());
                    header.set_recursion_available(reply.recursion_available());
                    header.set_truncated(reply.truncated());
                    let response = MessageResponseBuilder::from_message_request(request).build(
                        header,
                        reply.answers().iter(),
                        reply.name_servers().iter(),
                        &[],
                        reply.additionals().iter(),
                    );
                    let info = match response_handle.send_response(response).await {
                        Ok(info) => info,
                        Err(e) => {
                            error!(error = %e, "failed to send forwarded response");
                            ResponseInfo::from(header)
                        }
                    };
                    metrics::record_query(&qtype.to_string(), QueryResult::Forwarded, timer.elapsed());
                    return info;
                }
                Ok(reply) => {
                    metrics::record_forward(&upstream.to_string(), false);
                    debug!(
                        %upstream,
                        code = %reply.response_code(),
                        "upstream answered non-success, trying next"
                    );
                }
                Err(e) => {
                    metrics::record_forward(&upstream.to_string(), false);
                    warn!(%upstream, error = %e, "upstream exchange failed, trying next");
                }
            }
        }

        warn!(name = %query.name(), qtype = %qtype, "all upstreams failed");
        metrics::record_query(&qtype.to_string(), QueryResult::Error, timer.elapsed());
        self.reply_code(request, response_handle, ResponseCode::ServFail)
            .await
    }

    /// Send a records-free response with the given code.
    async fn reply_code<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
        code: ResponseCode,
    ) -> ResponseInfo {
        let mut header = Header::response_from_request(request.header());
        header.set_response_code(code);
        let response =
            MessageResponseBuilder::from_message_request(request).build_no_records(header);
        match response_handle.send_response(response).await {
            Ok(info) => info,
            Err(e) => {
                error!(error = %e, code = %code, "failed to send response");
                ResponseInfo::from(header)
            }
        }
    }
}

#[async_trait]
impl RequestHandler for QueryRouter {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        let timer = Timer::start();

        if request.op_code() != OpCode::Query {
            debug!(op_code = ?request.op_code(), "unimplemented opcode");
            return self
                .reply_code(request, response_handle, ResponseCode::NotImp)
                .await;
        }

        let Some(query) = request.queries().first() else {
            return self
                .reply_code(request, response_handle, ResponseCode::FormErr)
                .await;
        };

        if self.trace {
            info!(
                name = %query.name(),
                qtype = %query.query_type(),
                src = %request.src(),
                "query received"
            );
        }

        if self.is_owned(query.name()) {
            self.answer_local(request, query, response_handle, timer)
                .await
        } else if !self.nameservers.is_empty() {
            self.forward(request, query, response_handle, timer).await
        } else {
            // No upstreams to ask and no authority to answer: refuse rather
            // than feign an empty result.
            debug!(name = %query.name(), "query outside owned zones with no upstreams, refusing");
            metrics::record_query(
                &query.query_type().to_string(),
                QueryResult::Refused,
                timer.elapsed(),
            );
            self.reply_code(request, response_handle, ResponseCode::Refused)
                .await
        }
    }
}

/// Collect the owned zones: provider domains plus the private reverse zones.
fn owned_zones(providers: &[Arc<RecordStore>]) -> Result<Vec<LowerName>, DnsError> {
    let mut zones: Vec<LowerName> = Vec::new();
    for store in providers {
        let fqdn = format!("{}.", store.domain().trim_end_matches('.').to_lowercase());
        let name = Name::from_ascii(&fqdn).map_err(|e| {
            DnsError::Config(format!("invalid owned domain {:?}: {e}", store.domain()))
        })?;
        let zone = LowerName::from(name);
        if !zones.contains(&zone) {
            zones.push(zone);
        }
    }
    for arpa in PRIVATE_ARPA_ZONES {
        let zone = LowerName::from(Name::from_ascii(arpa)?);
        if !zones.contains(&zone) {
            zones.push(zone);
        }
    }
    Ok(zones)
}

/// Map a wire query type onto a locally-answerable record family.
fn record_kind(qtype: RecordType) -> Option<RecordKind> {
    match qtype {
        RecordType::A => Some(RecordKind::A),
        RecordType::AAAA => Some(RecordKind::Aaaa),
        RecordType::PTR => Some(RecordKind::Ptr),
        RecordType::CNAME => Some(RecordKind::Cname),
        _ => None,
    }
}

/// Parse a stored record value into answer rdata. `None` means the stored
/// value is unusable for this family.
fn build_rdata(kind: RecordKind, value: &str) -> Option<RData> {
    match kind {
        RecordKind::A => value.parse::<Ipv4Addr>().ok().map(|ip| RData::A(A(ip))),
        RecordKind::Aaaa => value.parse::<Ipv6Addr>().ok().map(|ip| RData::AAAA(AAAA(ip))),
        RecordKind::Ptr => Name::from_utf8(value).ok().map(|n| RData::PTR(PTR(n))),
        RecordKind::Cname => Name::from_utf8(value).ok().map(|n| RData::CNAME(CNAME(n))),
    }
}

/// Rebuild the inbound query as a fresh message for the upstream exchange.
fn build_forward_query(request: &Request, query: &LowerQuery) -> Message {
    let mut fwd = Message::new();
    fwd.set_id(request.id());
    fwd.set_message_type(MessageType::Query);
    fwd.set_op_code(OpCode::Query);
    fwd.set_recursion_desired(request.header().recursion_desired());
    fwd.add_query(query.original().clone());
    if let Some(edns) = request.edns() {
        *fwd.extensions_mut() = Some(edns.clone());
    }
    fwd
}
