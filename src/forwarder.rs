// src/forwarder.rs
//
// DoH 到 UDP 的转发核心:
// 校验 RFC 8484 POST 请求，通过一次 UDP 往返把查询交给固定的上游解析器，
// 校验应答来源后原样写回。

use crate::error::ForwardError;
use crate::metrics::METRICS;
use crate::r#const::{dns_limits, http_headers::content_types, upstream_error_labels};
use bytes::{BufMut, Bytes, BytesMut};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Method, Request, Response, StatusCode};
use std::fmt::{self, Display};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, warn};

/// 转发器发出的 HTTP 响应
pub type DohResponse = Response<Full<Bytes>>;

/// 转发器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwarderConfig {
    /// 上游解析器地址，应答必须来自该地址
    pub upstream: SocketAddr,
    /// 本地 UDP 套接字绑定的 IP，端口由系统分配
    pub bind_ip: IpAddr,
    /// 发送与接收共享的超时
    pub timeout: Duration,
}

/// 上游交换失败的原因
#[derive(Debug)]
enum UpstreamError {
    Timeout,
    UntrustedSource(SocketAddr),
    ShortWrite { sent: usize, expected: usize },
    Socket(io::Error),
}

impl UpstreamError {
    fn label(&self) -> &'static str {
        match self {
            Self::Timeout => upstream_error_labels::TIMEOUT,
            Self::UntrustedSource(_) => upstream_error_labels::UNTRUSTED_SOURCE,
            Self::ShortWrite { .. } => upstream_error_labels::SHORT_WRITE,
            Self::Socket(_) => upstream_error_labels::SOCKET_ERROR,
        }
    }
}

impl Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "no reply before the deadline"),
            Self::UntrustedSource(source) => write!(f, "reply came from unexpected source {}", source),
            Self::ShortWrite { sent, expected } => {
                write!(f, "sent {} of {} query bytes", sent, expected)
            }
            Self::Socket(e) => write!(f, "socket error: {}", e),
        }
    }
}

/// DoH 转发器
///
/// 每个请求独占一个新绑定的 UDP 套接字，请求之间不共享可变状态，
/// 因此同一个转发器可以被任意多个并发请求共用。
#[derive(Debug, Clone)]
pub struct Forwarder {
    config: ForwarderConfig,
}

impl Forwarder {
    /// 创建新的转发器
    pub fn new(config: ForwarderConfig) -> Self {
        Self { config }
    }

    /// 转发器配置
    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    /// 处理一个 DoH 请求
    ///
    /// 除请求体读取失败外，所有分支都返回 `Ok` 并携带一个完整的 HTTP 响应。
    /// 返回 `Err` 时调用方必须直接放弃连接，不写回任何响应。
    pub async fn forward<B>(&self, request: Request<B>) -> Result<DohResponse, ForwardError>
    where
        B: Body,
        B::Error: Display,
    {
        let start_time = Instant::now();
        let result = self.process(request).await;

        match &result {
            Ok(response) => {
                let status = response.status();
                let duration = start_time.elapsed();
                METRICS
                    .requests_total()
                    .with_label_values(&[status.as_str()])
                    .inc();
                METRICS
                    .request_duration_seconds()
                    .with_label_values(&[status.as_str()])
                    .observe(duration.as_secs_f64());
                debug!("DoH request answered with {} in {:?}", status, duration);
            }
            Err(e) => {
                METRICS.aborted_requests_total().inc();
                warn!("Dropping DoH request without a response: {}", e);
            }
        }

        result
    }

    async fn process<B>(&self, request: Request<B>) -> Result<DohResponse, ForwardError>
    where
        B: Body,
        B::Error: Display,
    {
        let (parts, body) = request.into_parts();

        if parts.method != Method::POST {
            debug!("Rejecting DoH request with method {}", parts.method);
            return Ok(empty_response(StatusCode::METHOD_NOT_ALLOWED));
        }

        // 按收到的原样比较，大小写敏感
        let content_type_ok = parts
            .headers
            .get(header::CONTENT_TYPE)
            .is_some_and(|value| value.as_bytes() == content_types::DNS_MESSAGE.as_bytes());
        if !content_type_ok {
            debug!(
                "Rejecting DoH request with content type {:?}",
                parts.headers.get(header::CONTENT_TYPE)
            );
            return Ok(empty_response(StatusCode::UNSUPPORTED_MEDIA_TYPE));
        }

        let declared = match declared_length(&parts.headers) {
            Some(length) if length >= dns_limits::MIN_QUERY_SIZE => length,
            other => {
                debug!("Rejecting DoH request with declared length {:?}", other);
                return Ok(empty_response(StatusCode::BAD_REQUEST));
            }
        };
        if declared > dns_limits::MAX_MESSAGE_SIZE {
            debug!("Rejecting DoH request with declared length {}", declared);
            return Ok(empty_response(StatusCode::PAYLOAD_TOO_LARGE));
        }

        let query = read_body(body, declared).await?;
        if query.len() as u64 != declared {
            error!(
                "Request body length {} doesn't match content-length header {}",
                query.len(),
                declared
            );
            return Ok(empty_response(StatusCode::BAD_REQUEST));
        }

        let upstream_start = Instant::now();
        match self.exchange(&query).await {
            Ok(reply) => {
                METRICS
                    .upstream_duration_seconds()
                    .observe(upstream_start.elapsed().as_secs_f64());
                debug!(
                    "Forwarded {} byte query to {}, got {} byte reply",
                    query.len(),
                    self.config.upstream,
                    reply.len()
                );
                Ok(reply_response(reply))
            }
            Err(e) => {
                METRICS
                    .upstream_errors_total()
                    .with_label_values(&[e.label()])
                    .inc();
                match &e {
                    UpstreamError::Timeout | UpstreamError::UntrustedSource(_) => {
                        warn!("Upstream exchange with {} failed: {}", self.config.upstream, e)
                    }
                    UpstreamError::ShortWrite { .. } | UpstreamError::Socket(_) => {
                        error!("Upstream exchange with {} failed: {}", self.config.upstream, e)
                    }
                }
                Ok(empty_response(StatusCode::INTERNAL_SERVER_ERROR))
            }
        }
    }

    /// 一次 UDP 往返，套接字在任何返回路径上随作用域释放
    async fn exchange(&self, query: &[u8]) -> Result<Bytes, UpstreamError> {
        let socket = UdpSocket::bind(SocketAddr::new(self.config.bind_ip, 0))
            .await
            .map_err(UpstreamError::Socket)?;

        // 发送与接收共享同一个截止时间
        let deadline = Instant::now() + self.config.timeout;

        let sent = timeout_at(deadline, socket.send_to(query, self.config.upstream))
            .await
            .map_err(|_| UpstreamError::Timeout)?
            .map_err(UpstreamError::Socket)?;
        if sent != query.len() {
            return Err(UpstreamError::ShortWrite {
                sent,
                expected: query.len(),
            });
        }

        let mut reply = vec![0u8; dns_limits::REPLY_BUFFER_SIZE];
        let (received, source) = timeout_at(deadline, socket.recv_from(&mut reply))
            .await
            .map_err(|_| UpstreamError::Timeout)?
            .map_err(UpstreamError::Socket)?;
        if source != self.config.upstream {
            return Err(UpstreamError::UntrustedSource(source));
        }

        reply.truncate(received);
        Ok(Bytes::from(reply))
    }
}

/// 请求头声明的请求体长度，缺失或无法解析时为 None
fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// 读取请求体直到持有声明的字节数
///
/// 流在此之前结束或报错都视为读取失败。最后一帧可能越过声明长度，
/// 多出的字节会保留下来交给调用方判断。
async fn read_body<B>(body: B, declared: u64) -> Result<Bytes, ForwardError>
where
    B: Body,
    B::Error: Display,
{
    let mut body = std::pin::pin!(body);
    let mut buf = BytesMut::with_capacity(declared as usize);

    while (buf.len() as u64) < declared {
        match body.frame().await {
            Some(Ok(frame)) => {
                if let Ok(data) = frame.into_data() {
                    buf.put(data);
                }
            }
            Some(Err(e)) => return Err(ForwardError::BodyRead(e.to_string())),
            None => {
                return Err(ForwardError::IncompleteBody {
                    declared,
                    received: buf.len() as u64,
                })
            }
        }
    }

    Ok(buf.freeze())
}

/// 不带响应体的响应，所有响应都携带 Accept 头
pub(crate) fn empty_response(status: StatusCode) -> DohResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::ACCEPT,
        HeaderValue::from_static(content_types::DNS_MESSAGE),
    );
    response
}

fn reply_response(reply: Bytes) -> DohResponse {
    let length = reply.len();
    let mut response = empty_response(StatusCode::OK);
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_types::DNS_MESSAGE),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    *response.body_mut() = Full::new(reply);
    response
}
