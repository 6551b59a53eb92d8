// tests/http_doh_tests.rs

mod common;

use common::*;
use dohstub::error::TlsError;
use dohstub::{load_tls_acceptor, DohServer, Forwarder};
use hickory_proto::op::{Message, MessageType};
use hickory_proto::rr::RecordType;
use reqwest::{Client, StatusCode};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

// 测试服务器及其证书目录
struct TestServer {
    addr: SocketAddr,
    cert_path: PathBuf,
    _cert_dir: TempDir,
}

// 生成自签名证书并写入临时目录
fn write_self_signed_cert() -> (TempDir, PathBuf, PathBuf) {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let cert_path = dir.path().join("certificate.pem");
    let key_path = dir.path().join("key.pem");
    std::fs::write(&cert_path, certified.cert.pem()).unwrap();
    std::fs::write(&key_path, certified.key_pair.serialize_pem()).unwrap();
    (dir, cert_path, key_path)
}

// 在随机端口上启动 DoH 服务器
async fn start_test_server(upstream: SocketAddr) -> TestServer {
    let (cert_dir, cert_path, key_path) = write_self_signed_cert();
    let tls_acceptor = load_tls_acceptor(&cert_path, &key_path).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let forwarder = Arc::new(Forwarder::new(forwarder_config(upstream)));
    let server = DohServer::new(addr, forwarder, tls_acceptor);
    tokio::spawn(server.serve(listener));

    TestServer {
        addr,
        cert_path,
        _cert_dir: cert_dir,
    }
}

fn test_client() -> Client {
    Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

// 信任测试证书的原始 TLS 客户端，只协商 HTTP/1.1
fn raw_tls_connector(cert_path: &Path) -> TlsConnector {
    let pem = std::fs::read(cert_path).unwrap();
    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
        roots.add(cert.unwrap()).unwrap();
    }

    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_root_certificates(roots)
    .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

// 发送原始请求，读取服务器写回的全部字节；close_write 为真时先关闭写端
async fn raw_exchange(
    server: &TestServer,
    head: String,
    body: &[u8],
    close_write: bool,
) -> Vec<u8> {
    let connector = raw_tls_connector(&server.cert_path);
    let tcp = TcpStream::connect(server.addr).await.unwrap();
    let mut tls = connector
        .connect(ServerName::try_from("localhost").unwrap(), tcp)
        .await
        .unwrap();

    tls.write_all(head.as_bytes()).await.unwrap();
    tls.write_all(body).await.unwrap();
    tls.flush().await.unwrap();
    if close_write {
        tls.shutdown().await.unwrap();
    }

    // 服务器可能不发送 close_notify 就断开连接，已读到的字节仍保留在缓冲区中
    let mut received = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(10), tls.read_to_end(&mut received)).await;
    received
}

fn post_head(declared: usize) -> String {
    format!(
        "POST /dns-query HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
        DNS_MESSAGE, declared
    )
}

// 测试 RFC 8484 DoH POST 请求
#[tokio::test]
async fn test_doh_post_request() {
    let resolver = spawn_answering_resolver().await;
    let server = start_test_server(resolver).await;

    let query = build_test_query(0x1234, "example.org", RecordType::A);

    let response = test_client()
        .post(format!("https://{}/dns-query", server.addr))
        .header("content-type", DNS_MESSAGE)
        .body(query)
        .send()
        .await
        .unwrap();

    // 检查响应状态码
    assert_eq!(response.status(), StatusCode::OK);

    // 检查响应头
    let headers = response.headers();
    assert_eq!(headers.get("content-type").unwrap(), DNS_MESSAGE);
    assert_eq!(headers.get("accept").unwrap(), DNS_MESSAGE);
    let content_length: usize = headers
        .get("content-length")
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();

    // 解析 DNS 响应消息
    let response_body = response.bytes().await.unwrap();
    assert_eq!(response_body.len(), content_length);
    let dns_response = Message::from_vec(&response_body).expect("Failed to parse DNS response");
    assert_eq!(dns_response.id(), 0x1234);
    assert_eq!(dns_response.message_type(), MessageType::Response);
    assert_eq!(
        dns_response.queries().first().map(|q| q.name().to_string()),
        Some("example.org.".to_string())
    );
}

// 测试 GET 请求被拒绝
#[tokio::test]
async fn test_doh_get_not_allowed() {
    let resolver = spawn_answering_resolver().await;
    let server = start_test_server(resolver).await;

    let response = test_client()
        .get(format!("https://{}/dns-query?dns=AAABAAABAAAAAAAA", server.addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers().get("accept").unwrap(), DNS_MESSAGE);
    assert!(response.bytes().await.unwrap().is_empty());
}

// 测试错误的内容类型
#[tokio::test]
async fn test_doh_wrong_content_type() {
    let resolver = spawn_answering_resolver().await;
    let server = start_test_server(resolver).await;

    let response = test_client()
        .post(format!("https://{}/dns-query", server.addr))
        .header("content-type", "application/dns-json")
        .body(build_test_query(1, "example.com", RecordType::A))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

// 测试其他路径返回 404
#[tokio::test]
async fn test_unknown_path() {
    let resolver = spawn_answering_resolver().await;
    let server = start_test_server(resolver).await;

    let response = test_client()
        .post(format!("https://{}/resolve", server.addr))
        .header("content-type", DNS_MESSAGE)
        .body(build_test_query(1, "example.com", RecordType::A))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers().get("accept").unwrap(), DNS_MESSAGE);
    assert!(response.bytes().await.unwrap().is_empty());
}

// 测试证书文件缺失或内容无效
#[test]
fn test_tls_loading_errors() {
    let (dir, cert_path, key_path) = write_self_signed_cert();

    let missing = dir.path().join("missing.pem");
    assert!(matches!(
        load_tls_acceptor(&missing, &key_path),
        Err(TlsError::Read { .. })
    ));

    let empty = dir.path().join("empty.pem");
    std::fs::write(&empty, "").unwrap();
    assert!(matches!(
        load_tls_acceptor(&empty, &key_path),
        Err(TlsError::NoCertificate(_))
    ));

    // 证书文件中没有私钥
    assert!(matches!(
        load_tls_acceptor(&cert_path, &cert_path),
        Err(TlsError::NoPrivateKey(_))
    ));
}

// 测试请求体短于声明长度时连接被直接关闭，不写回任何字节
#[tokio::test]
async fn test_short_body_closes_connection_without_response() {
    let resolver = spawn_answering_resolver().await;
    let server = start_test_server(resolver).await;

    let query = build_test_query(0x4242, "example.org", RecordType::A);

    // 完整请求得到正常应答
    let received = raw_exchange(&server, post_head(query.len()), &query, false).await;
    let text = String::from_utf8_lossy(&received);
    assert!(text.starts_with("HTTP/1.1 200 OK"), "{}", text);

    // 声明长度多 10 字节，写端关闭后不应有任何响应
    let received = raw_exchange(&server, post_head(query.len() + 10), &query, true).await;
    assert!(
        received.is_empty(),
        "unexpected response: {}",
        String::from_utf8_lossy(&received)
    );
}
