// src/server.rs

use crate::error::{AppError, ForwardError};
use crate::forwarder::{empty_response, DohResponse, Forwarder};
use crate::r#const::server_defaults::DOH_QUERY_PATH;
use http_body::Body;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_graceful_shutdown::SubsystemHandle;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

/// DoH 服务器结构体
pub struct DohServer {
    /// 监听地址
    bind_addr: SocketAddr,
    /// 请求转发器
    forwarder: Arc<Forwarder>,
    /// TLS 接收器
    tls_acceptor: TlsAcceptor,
}

impl DohServer {
    /// 创建新的 DoH 服务器
    pub fn new(bind_addr: SocketAddr, forwarder: Arc<Forwarder>, tls_acceptor: TlsAcceptor) -> Self {
        Self {
            bind_addr,
            forwarder,
            tls_acceptor,
        }
    }

    /// 绑定监听端口
    pub async fn bind(&self) -> Result<TcpListener, AppError> {
        match TcpListener::bind(self.bind_addr).await {
            Ok(listener) => {
                info!(
                    "DoH server listening on https://{}{}",
                    self.bind_addr, DOH_QUERY_PATH
                );
                Ok(listener)
            }
            Err(e) => {
                error!("Failed to bind DoH server: {}", e);
                Err(AppError::Io(e))
            }
        }
    }

    /// 在已绑定的监听器上持续接受连接
    pub async fn serve(self, listener: TcpListener) -> Result<(), AppError> {
        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept DoH connection: {}", e);
                    continue;
                }
            };

            let tls_acceptor = self.tls_acceptor.clone();
            let forwarder = Arc::clone(&self.forwarder);
            tokio::spawn(serve_connection(stream, peer_addr, tls_acceptor, forwarder));
        }
    }

    /// 启动 DoH 服务器，直到收到关闭请求
    pub async fn run(self, subsys: SubsystemHandle) -> Result<(), AppError> {
        let listener = self.bind().await?;

        tokio::select! {
            result = self.serve(listener) => {
                if let Err(e) = &result {
                    error!("DoH server error: {}", e);
                }
                result
            }
            _ = subsys.on_shutdown_requested() => {
                info!("Shutdown requested, stopping DoH server");
                Ok(())
            }
        }
    }
}

// 单个 TLS 连接，HTTP/1.1 与 HTTP/2 自动协商
async fn serve_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    tls_acceptor: TlsAcceptor,
    forwarder: Arc<Forwarder>,
) {
    let tls_stream = match tls_acceptor.accept(stream).await {
        Ok(tls_stream) => tls_stream,
        Err(e) => {
            debug!("TLS handshake with {} failed: {}", peer_addr, e);
            return;
        }
    };

    let service = service_fn(move |request: Request<Incoming>| {
        let forwarder = Arc::clone(&forwarder);
        async move { route(&forwarder, request).await }
    });

    let builder = Builder::new(TokioExecutor::new());
    if let Err(e) = builder
        .serve_connection(TokioIo::new(tls_stream), service)
        .await
    {
        // 请求体读取失败时连接被直接放弃，响应写回失败也会出现在这里
        warn!("DoH connection from {} ended with error: {}", peer_addr, e);
    }
}

/// 只有 DoH 查询路径会交给转发器
pub async fn route<B>(forwarder: &Forwarder, request: Request<B>) -> Result<DohResponse, ForwardError>
where
    B: Body,
    B::Error: Display,
{
    if request.uri().path() != DOH_QUERY_PATH {
        debug!("No route for {}", request.uri().path());
        return Ok(empty_response(StatusCode::NOT_FOUND));
    }
    forwarder.forward(request).await
}
