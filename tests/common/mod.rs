//! Shared test infrastructure for resolver integration tests.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{MessageRequest, MessageResponse};
use hickory_server::proto::rr::Record;
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use tokio::net::UdpSocket;

use homestead_dns::config::StaticZone;
use homestead_dns::records::{
    AddressRecord, CnameRecord, DomainRecords, NetPort, Proto, PtrRecord,
};
use homestead_dns::router::QueryRouter;
use homestead_dns::source::StaticSource;
use homestead_dns::store::RecordStore;

// --- Constants ---

pub const LOCAL_DOMAIN: &str = "home";

// --- TestResponseHandler ---

/// Captures the serialized DNS response for inspection in tests.
///
/// Implements `ResponseHandler` so it can be passed to
/// `QueryRouter::handle_request()`. The response is serialized via
/// `MessageResponse::destructive_emit()` and stored as raw wire-format bytes,
/// which can then be parsed with `Message::from_vec()`.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// Parse the captured wire bytes into a `Message` for assertions.
    pub fn into_message(self) -> Message {
        let buf = self.buf.lock().unwrap();
        assert!(!buf.is_empty(), "no response was captured");
        Message::from_vec(&buf).expect("failed to parse captured DNS response")
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock().unwrap();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(info)
    }
}

// --- Record builders ---

pub fn a_record(hostname: &str, ip: &str) -> AddressRecord {
    AddressRecord {
        domain: String::new(),
        hostname: hostname.to_string(),
        ip: ip.to_string(),
        src: String::new(),
    }
}

pub fn ptr_record(arpa: &str, hostname: &str) -> PtrRecord {
    PtrRecord {
        arpa: arpa.to_string(),
        hostname: hostname.to_string(),
        domain: String::new(),
        src: String::new(),
    }
}

pub fn cname_record(alias: &str, target: &str) -> CnameRecord {
    CnameRecord {
        alias_hostname: alias.to_string(),
        alias_domain: String::new(),
        target_hostname: target.to_string(),
        target_domain: String::new(),
        src: String::new(),
    }
}

pub fn zone(domain: &str, records: DomainRecords) -> StaticZone {
    StaticZone {
        domain: domain.to_string(),
        records,
    }
}

// --- Router construction ---

/// Build a router whose providers are static sources, one per zone, already
/// loaded.
pub async fn build_router(zones: Vec<StaticZone>, nameservers: Vec<NetPort>) -> QueryRouter {
    let mut providers = Vec::new();
    for z in zones {
        let store = Arc::new(RecordStore::new(Arc::new(StaticSource::new(z))));
        store.start().await.expect("static source load failed");
        providers.push(store);
    }
    QueryRouter::new(providers, nameservers, 60, false).expect("failed to build router")
}

pub fn net_port(addr: SocketAddr) -> NetPort {
    NetPort {
        ip: addr.ip(),
        port: addr.port(),
        proto: Proto::Udp,
    }
}

// --- Query/Request construction ---

pub fn test_src() -> SocketAddr {
    "192.168.1.50:12345".parse().unwrap()
}

/// Build wire-format bytes for a DNS query.
pub fn build_query_bytes(name: &str, record_type: RecordType, id: u16) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg.to_vec().unwrap()
}

/// Parse wire bytes into a MessageRequest.
pub fn parse_message_request(bytes: &[u8]) -> MessageRequest {
    let mut decoder = BinDecoder::new(bytes);
    MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest")
}

/// Build a full `Request` with a crafted source address.
pub fn build_request(name: &str, record_type: RecordType, src: SocketAddr, id: u16) -> Request {
    let bytes = build_query_bytes(name, record_type, id);
    let msg = parse_message_request(&bytes);
    Request::new(msg, src, Protocol::Udp)
}

/// Build a `Request` carrying a non-standard opcode.
pub fn build_request_with_opcode(name: &str, record_type: RecordType, op_code: OpCode) -> Request {
    let mut msg = Message::new();
    msg.set_id(99);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(op_code);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    let bytes = msg.to_vec().unwrap();
    let parsed = parse_message_request(&bytes);
    Request::new(parsed, test_src(), Protocol::Udp)
}

// --- Upstream stubs ---

/// How a stub upstream answers queries.
#[derive(Clone, Copy)]
pub enum UpstreamMode {
    /// Answer NoError with a single A record for the queried name.
    Answer(Ipv4Addr),
    /// Answer SERVFAIL.
    ServFail,
    /// Reply with a mismatched transaction id.
    WrongId,
}

/// Spawn a UDP nameserver stub; it serves until the test runtime drops it.
pub async fn spawn_udp_upstream(mode: UpstreamMode) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                return;
            };
            let Ok(query) = Message::from_vec(&buf[..len]) else {
                continue;
            };
            let mut reply = Message::new();
            let id = match mode {
                UpstreamMode::WrongId => query.id().wrapping_add(1),
                _ => query.id(),
            };
            reply.set_id(id);
            reply.set_message_type(MessageType::Response);
            reply.set_op_code(OpCode::Query);
            reply.set_recursion_desired(query.recursion_desired());
            reply.set_recursion_available(true);
            if let Some(q) = query.queries().first() {
                reply.add_query(q.clone());
                match mode {
                    UpstreamMode::Answer(ip) => {
                        reply.set_response_code(ResponseCode::NoError);
                        reply.add_answer(Record::from_rdata(
                            q.name().clone(),
                            300,
                            RData::A(A(ip)),
                        ));
                    }
                    UpstreamMode::ServFail => {
                        reply.set_response_code(ResponseCode::ServFail);
                    }
                    UpstreamMode::WrongId => {
                        reply.set_response_code(ResponseCode::NoError);
                    }
                }
            }
            let bytes = reply.to_vec().unwrap();
            let _ = socket.send_to(&bytes, peer).await;
        }
    });
    addr
}

// --- Response helpers ---

/// Execute a query through the router and return the parsed response.
pub async fn execute_query(
    router: &QueryRouter,
    name: &str,
    record_type: RecordType,
    id: u16,
) -> Message {
    let request = build_request(name, record_type, test_src(), id);
    execute_request(router, &request).await
}

/// Execute a pre-built request through the router.
pub async fn execute_request(router: &QueryRouter, request: &Request) -> Message {
    let handler = TestResponseHandler::new();
    router.handle_request(request, handler.clone()).await;
    handler.into_message()
}

/// Extract AAAA addresses from a response.
pub fn extract_aaaa_ips(msg: &Message) -> Vec<Ipv6Addr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::AAAA(aaaa) => Some(Ipv6Addr::from(*aaaa)),
            _ => None,
        })
        .collect()
}

/// Extract A addresses from a response.
pub fn extract_a_ips(msg: &Message) -> Vec<Ipv4Addr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(Ipv4Addr::from(*a)),
            _ => None,
        })
        .collect()
}

/// Extract PTR targets from a response, as dotted names.
pub fn extract_ptr_targets(msg: &Message) -> Vec<String> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::PTR(ptr) => Some(ptr.0.to_string()),
            _ => None,
        })
        .collect()
}

/// Extract CNAME targets from a response, as dotted names.
pub fn extract_cname_targets(msg: &Message) -> Vec<String> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::CNAME(cname) => Some(cname.0.to_string()),
            _ => None,
        })
        .collect()
}

/// Assert response code.
pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}

/// Assert response is successful with exactly the expected A addresses.
pub fn assert_a_response(msg: &Message, expected_ips: &[Ipv4Addr]) {
    assert_response_code(msg, ResponseCode::NoError);
    let mut actual = extract_a_ips(msg);
    actual.sort();
    let mut expected: Vec<Ipv4Addr> = expected_ips.to_vec();
    expected.sort();
    assert_eq!(
        actual, expected,
        "A records mismatch.\nactual:   {:?}\nexpected: {:?}",
        actual, expected
    );
}
