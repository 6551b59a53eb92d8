// src/admin.rs

use crate::error::AppError;
use crate::metrics;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_graceful_shutdown::SubsystemHandle;
use tracing::{error, info};

// 管理服务器，提供健康检查与指标导出
pub struct AdminServer {
    // 监听地址
    listen_addr: SocketAddr,
}

impl AdminServer {
    // 创建新的管理服务器
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self { listen_addr }
    }

    // 组合健康检查和指标路由
    pub fn router() -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .merge(metrics::metrics_routes())
    }

    // 启动管理服务器，直到收到关闭请求
    pub async fn run(self, subsys: SubsystemHandle) -> Result<(), AppError> {
        let listener = TcpListener::bind(self.listen_addr).await?;
        info!("Admin server listening on {}", self.listen_addr);

        let result = axum::serve(listener, Self::router())
            .with_graceful_shutdown(async move {
                subsys.on_shutdown_requested().await;
                info!("Received subsystem shutdown request, admin server is stopping");
            })
            .await;

        match result {
            Ok(()) => {
                info!("Admin server stopped");
                Ok(())
            }
            Err(e) => {
                error!("Admin server error: {}", e);
                Err(AppError::Io(e))
            }
        }
    }
}

// 健康检查处理程序
async fn health_handler() -> &'static str {
    "OK"
}
