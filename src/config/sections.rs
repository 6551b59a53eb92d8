use super::{validate_ip_addr, validate_socket_addr};
use crate::r#const::{server_defaults, upstream_timeout_limits};
use serde::{Deserialize, Serialize};
use validator::Validate;

// DoH 服务器配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
pub struct ServerConfig {
    // HTTPS 监听地址
    #[serde(default = "default_listen")]
    #[validate(custom(function = "validate_socket_addr", message = "Invalid listen address"))]
    pub listen: String,
}

fn default_listen() -> String {
    server_defaults::DEFAULT_DOH_LISTEN.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

// TLS 证书配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
pub struct TlsConfig {
    // PEM 证书链文件
    #[validate(length(min = 1, message = "Certificate file path must not be empty"))]
    pub cert_file: String,
    // PEM 私钥文件
    #[validate(length(min = 1, message = "Private key file path must not be empty"))]
    pub key_file: String,
}

// 上游解析器配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
pub struct UpstreamConfig {
    // 解析器地址（IP:端口）
    #[serde(default = "default_resolver")]
    #[validate(custom(
        function = "validate_socket_addr",
        message = "Invalid resolver address"
    ))]
    pub resolver: String,
    // 本地 UDP 套接字绑定的 IP，端口由系统分配
    #[serde(default = "default_bind")]
    #[validate(custom(function = "validate_ip_addr", message = "Invalid bind address"))]
    pub bind: String,
    // 发送与接收共享的超时（秒）
    #[serde(default = "default_timeout")]
    #[validate(range(
        min = upstream_timeout_limits::MIN,
        max = upstream_timeout_limits::MAX,
        message = "Upstream timeout must be between 1 and 60 seconds"
    ))]
    pub timeout: u64,
}

fn default_resolver() -> String {
    server_defaults::DEFAULT_RESOLVER.to_string()
}

fn default_bind() -> String {
    server_defaults::DEFAULT_UDP_BIND.to_string()
}

fn default_timeout() -> u64 {
    upstream_timeout_limits::DEFAULT
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            resolver: default_resolver(),
            bind: default_bind(),
            timeout: default_timeout(),
        }
    }
}

// 管理服务器配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
pub struct AdminConfig {
    // 管理服务器监听地址
    #[serde(default = "default_admin_listen")]
    #[validate(custom(function = "validate_socket_addr", message = "Invalid admin address"))]
    pub listen: String,
}

fn default_admin_listen() -> String {
    server_defaults::DEFAULT_ADMIN_LISTEN.to_string()
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            listen: default_admin_listen(),
        }
    }
}
