// tests/common/mod.rs
#![allow(dead_code)]

use bytes::Bytes;
use dohstub::ForwarderConfig;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use http_body_util::Full;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Request};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use tokio::net::UdpSocket;

pub const DNS_MESSAGE: &str = "application/dns-message";

// 构建测试用 DNS 查询
pub fn build_test_query(id: u16, domain: &str, record_type: RecordType) -> Vec<u8> {
    let mut query = Message::new();
    query.set_id(id);
    query.set_message_type(MessageType::Query);
    query.set_op_code(OpCode::Query);
    query.set_recursion_desired(true);

    let name = Name::from_str(&format!("{}.", domain)).unwrap();
    query.add_query(Query::query(name, record_type));

    query.to_vec().unwrap()
}

// 构建合法的 DoH POST 请求
pub fn doh_request(body: Vec<u8>) -> Request<Full<Bytes>> {
    Request::builder()
        .method(Method::POST)
        .uri("/dns-query")
        .header(CONTENT_TYPE, DNS_MESSAGE)
        .header(CONTENT_LENGTH, body.len())
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

// 指向给定解析器的转发器配置
pub fn forwarder_config(upstream: SocketAddr) -> ForwarderConfig {
    ForwarderConfig {
        upstream,
        bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        timeout: Duration::from_secs(5),
    }
}

// 按查询内容作答的模拟解析器
pub async fn spawn_answering_resolver() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = [0u8; 1500];
        loop {
            let (len, src) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(_) => return,
            };
            let reply = answer(&buf[..len]);
            let _ = socket.send_to(&reply, src).await;
        }
    });

    addr
}

// 对每个查询都回复固定字节的模拟解析器
pub async fn spawn_fixed_resolver(reply: Vec<u8>) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = [0u8; 1500];
        while let Ok((_, src)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(&reply, src).await;
        }
    });

    addr
}

// 从另一个套接字作答的模拟解析器，应答来源与配置的地址不一致
pub async fn spawn_spoofing_resolver() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let impostor = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = [0u8; 1500];
        while let Ok((len, src)) = socket.recv_from(&mut buf).await {
            let reply = answer(&buf[..len]);
            let _ = impostor.send_to(&reply, src).await;
        }
    });

    addr
}

// 生成与查询对应的应答报文
pub fn answer(query: &[u8]) -> Vec<u8> {
    let request = Message::from_vec(query).unwrap();

    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    response.set_recursion_desired(request.recursion_desired());
    response.set_recursion_available(true);
    response.add_queries(request.queries().to_vec());

    if let Some(question) = request.queries().first() {
        response.add_answer(Record::from_rdata(
            question.name().clone(),
            300,
            RData::A(A::new(192, 0, 2, 1)),
        ));
    }

    response.to_vec().unwrap()
}
