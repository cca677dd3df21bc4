use std::{fmt, net::Ipv4Addr};

use async_trait::async_trait;
use moat_dns::{ClassType, DnsQuestion, DnsRecord, DnsRecordData, DnsResponseCode, DomainName, Edns, RecordType};
use moat_resolver::{ResolveError, Response, ResolverType};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::*;

/// Answers every query with `answers` A records, or fails.
struct FixedResolver {
    answers: usize,
    fail_with: Option<fn() -> ResolveError>,
}

impl fmt::Display for FixedResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("fixed")
    }
}

#[async_trait]
impl Resolver for FixedResolver {
    async fn resolve(&self, request: &DnsRequest) -> Result<Response, ResolveError> {
        if let Some(fail) = self.fail_with {
            return Err(fail());
        }

        let question = &request.questions()[0];
        let mut builder = request
            .questions()
            .iter()
            .cloned()
            .fold(DnsMessageBuilder::new().with_id(0xFFFF), DnsMessageBuilder::add_question)
            .with_response(DnsResponseCode::NoError);
        for i in 0..self.answers {
            builder = builder.add_answer(DnsRecord::new(
                question.qname.clone(),
                RecordType::A,
                60,
                DnsRecordData::Ipv4(Ipv4Addr::new(10, 0, (i / 256) as u8, (i % 256) as u8)),
            ));
        }

        Ok(Response::new(builder.build(), "RESOLVED (fixed)", ResolverType::Resolved))
    }

    fn configuration(&self) -> Vec<String> {
        vec![]
    }
}

fn state(answers: usize) -> ServerState {
    ServerState {
        resolver: Arc::new(FixedResolver {
            answers,
            fail_with: None,
        }),
        timeout: Duration::from_secs(1),
    }
}

fn failing_state(fail_with: fn() -> ResolveError) -> ServerState {
    ServerState {
        resolver: Arc::new(FixedResolver {
            answers: 0,
            fail_with: Some(fail_with),
        }),
        timeout: Duration::from_secs(1),
    }
}

fn query(id: u16, edns: Option<Edns>) -> DnsMessage {
    let mut message = DnsMessageBuilder::new()
        .with_id(id)
        .add_question(DnsQuestion::new(
            DomainName::from_ascii("example.com").unwrap(),
            RecordType::A,
            ClassType::IN,
        ))
        .build();
    message.set_edns(edns);
    message
}

fn request(id: u16, request_type: RequestType, edns: Option<Edns>) -> DnsRequest {
    DnsRequest::new(
        query(id, edns),
        request_type,
        Some("127.0.0.1:53000".parse().unwrap()),
        Duration::from_secs(1),
    )
}

#[tokio::test]
async fn test_process_sets_id_and_flags() {
    let bytes = process(&state(1), &request(7, RequestType::UDP, None)).await.unwrap();
    let message = DnsMessage::decode(&bytes).unwrap();

    assert_eq!(message.id, 7);
    assert!(message.flags.response);
    assert!(message.flags.recursion_available);
    assert!(message.flags.recursion_desired);
    assert_eq!(message.answers().len(), 1);
}

#[tokio::test]
async fn test_process_maps_errors_to_rcode() {
    let bytes = process(
        &failing_state(|| ResolveError::AllUpstreamsFailed),
        &request(9, RequestType::UDP, None),
    )
    .await
    .unwrap();
    let message = DnsMessage::decode(&bytes).unwrap();
    assert_eq!(message.id, 9);
    assert_eq!(message.response_code().unwrap(), DnsResponseCode::ServerFailure);
    assert_eq!(message.questions().len(), 1);

    let bytes = process(
        &failing_state(|| ResolveError::InvalidRequest("bad".into())),
        &request(9, RequestType::TCP, None),
    )
    .await
    .unwrap();
    let message = DnsMessage::decode(&bytes).unwrap();
    assert_eq!(message.response_code().unwrap(), DnsResponseCode::FormatError);
}

#[tokio::test]
async fn test_large_udp_answer_is_truncated() {
    // 40 A records do not fit into 512 bytes
    let state = state(40);

    let bytes = process(&state, &request(1, RequestType::UDP, None)).await.unwrap();
    assert!(bytes.len() <= DEFAULT_UDP_PAYLOAD_SIZE);
    let message = DnsMessage::decode(&bytes).unwrap();
    assert!(message.flags.truncated);
    assert!(message.answers().is_empty());

    let bytes = process(&state, &request(1, RequestType::UDP, Some(Edns::default()))).await.unwrap();
    let message = DnsMessage::decode(&bytes).unwrap();
    assert!(!message.flags.truncated);
    assert_eq!(message.answers().len(), 40);

    let bytes = process(&state, &request(1, RequestType::TCP, None)).await.unwrap();
    let message = DnsMessage::decode(&bytes).unwrap();
    assert!(!message.flags.truncated);
    assert_eq!(message.answers().len(), 40);
}

#[tokio::test]
async fn test_udp_server_round_trip() {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let server = tokio::spawn(run_udp(socket, Arc::new(state(1))));

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    // garbage is dropped without an answer
    client.send_to(&[1, 2, 3], addr).await.unwrap();
    client.send_to(&query(0x1234, None).encode().unwrap(), addr).await.unwrap();

    let mut buf = [0u8; 512];
    let (n, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    let message = DnsMessage::decode(&buf[..n]).unwrap();
    assert_eq!(message.id, 0x1234);
    assert_eq!(message.answers().len(), 1);

    server.abort();
}

#[tokio::test]
async fn test_tcp_server_answers_pipelined_queries() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(run_tcp(listener, Arc::new(state(2))));

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();

    for id in [1u16, 2] {
        let raw = query(id, None).encode().unwrap();
        stream.write_u16(raw.len() as u16).await.unwrap();
        stream.write_all(&raw).await.unwrap();

        let len = stream.read_u16().await.unwrap() as usize;
        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf).await.unwrap();

        let message = DnsMessage::decode(&buf).unwrap();
        assert_eq!(message.id, id);
        assert_eq!(message.answers().len(), 2);
    }

    server.abort();
}
