use crate::error::ConfigError;
use crate::forwarder::ForwarderConfig;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::{IpAddr, SocketAddr},
    path::Path,
    str::FromStr,
    time::Duration,
};
use tracing::debug;
use validator::{Validate, ValidationError, ValidationErrors};

pub mod sections;

pub use sections::*;

// 配置结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;

// 自定义验证函数 - 验证Socket地址格式
pub fn validate_socket_addr(addr: &str) -> Result<(), ValidationError> {
    match SocketAddr::from_str(addr) {
        Ok(_) => Ok(()),
        Err(_) => Err(ValidationError::new("invalid_socket_addr")),
    }
}

// 自定义验证函数 - 验证IP地址格式
pub fn validate_ip_addr(addr: &str) -> Result<(), ValidationError> {
    match IpAddr::from_str(addr) {
        Ok(_) => Ok(()),
        Err(_) => Err(ValidationError::new("invalid_ip_addr")),
    }
}

// 自定义验证函数 - 本地绑定地址与解析器地址必须属于同一地址族
pub fn validate_address_family(config: &Config) -> Result<(), ValidationError> {
    let resolver = match SocketAddr::from_str(&config.upstream.resolver) {
        Ok(addr) => addr,
        // 格式错误由字段验证报告
        Err(_) => return Ok(()),
    };
    let bind = match IpAddr::from_str(&config.upstream.bind) {
        Ok(addr) => addr,
        Err(_) => return Ok(()),
    };
    if resolver.is_ipv4() != bind.is_ipv4() {
        return Err(ValidationError::new("address_family_mismatch"));
    }
    Ok(())
}

// 应用配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
#[validate(schema(
    function = "validate_address_family",
    message = "Upstream bind address and resolver address must use the same IP family"
))]
#[serde(rename_all = "lowercase")]
pub struct Config {
    // DoH 服务器配置
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,
    // TLS 证书配置
    #[validate(nested)]
    pub tls: TlsConfig,
    // 上游解析器配置
    #[serde(default)]
    #[validate(nested)]
    pub upstream: UpstreamConfig,
    // 管理服务器配置（可选）
    #[serde(default)]
    #[validate(nested)]
    pub admin: Option<AdminConfig>,
}

impl Config {
    // 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        debug!("Loading configuration file: {:?}", path.as_ref());
        let content = fs::read_to_string(path).map_err(ConfigError::LoadError)?;
        Self::from_yaml(&content)
    }

    // 从 YAML 文本加载配置
    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        let config: Config = serde_yaml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    // 验证配置有效性
    pub fn validate(&self) -> ConfigResult<()> {
        // 使用 validator 库进行验证
        if let Err(errors) = Validate::validate(self) {
            return Err(ConfigError::ValidationError(format_validation_errors(
                &errors,
            )));
        }
        Ok(())
    }

    // DoH 监听地址
    pub fn listen_addr(&self) -> ConfigResult<SocketAddr> {
        SocketAddr::from_str(&self.server.listen)
            .map_err(|e| ConfigError::InvalidListenAddress(e.to_string()))
    }

    // 管理服务器监听地址（未配置时为 None）
    pub fn admin_addr(&self) -> ConfigResult<Option<SocketAddr>> {
        match &self.admin {
            Some(admin) => SocketAddr::from_str(&admin.listen)
                .map(Some)
                .map_err(|e| ConfigError::InvalidListenAddress(e.to_string())),
            None => Ok(None),
        }
    }

    // 构建转发器配置
    pub fn forwarder_config(&self) -> ConfigResult<ForwarderConfig> {
        let upstream = SocketAddr::from_str(&self.upstream.resolver)
            .map_err(|e| ConfigError::InvalidResolverAddress(e.to_string()))?;
        let bind_ip = IpAddr::from_str(&self.upstream.bind)
            .map_err(|e| ConfigError::InvalidBindAddress(e.to_string()))?;

        Ok(ForwarderConfig {
            upstream,
            bind_ip,
            timeout: Duration::from_secs(self.upstream.timeout),
        })
    }
}

// 将 ValidationErrors 转换为友好的错误信息
fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();

    for (field, error_kind) in errors.errors() {
        match error_kind {
            validator::ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    messages.push(format!("Field '{}': {}", field, message));
                }
            }
            validator::ValidationErrorsKind::Struct(struct_errors) => {
                messages.push(format!(
                    "Struct '{}' validation failed: {}",
                    field,
                    format_validation_errors(struct_errors)
                ));
            }
            validator::ValidationErrorsKind::List(list_errors) => {
                for (index, err) in list_errors {
                    messages.push(format!(
                        "List '{}' at index {}: {}",
                        field,
                        index,
                        format_validation_errors(err)
                    ));
                }
            }
        }
    }

    if messages.is_empty() {
        "Unknown validation error".to_string()
    } else {
        messages.join("\n")
    }
}
