pub mod admin;
pub mod args;
pub mod config;
pub mod r#const;
pub mod error;
pub mod forwarder;
pub mod metrics;
pub mod server;
pub mod tls;

// 重导出常用组件
pub use admin::AdminServer;
pub use args::Args;
pub use config::Config;
pub use error::{AppError, ForwardError};
pub use forwarder::{DohResponse, Forwarder, ForwarderConfig};
pub use metrics::DohMetrics;
pub use r#const::subsystem_names;
pub use server::DohServer;
pub use tls::load_tls_acceptor;
