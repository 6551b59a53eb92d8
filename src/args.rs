use crate::error::AppError;
use crate::r#const::shutdown_timeout;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

// DNS-over-HTTPS 到 UDP 的转发服务
#[derive(Parser, Debug, Clone)]
#[command(
    name = "dohstub",
    version,
    about = "A small DNS-over-HTTPS stub forwarding RFC 8484 POST queries to a UDP resolver\n\n\
             Key Features:\n\
             - Protocol Conversion: DoH POST /dns-query (application/dns-message) to DNS over UDP\n\
             - Trust: Replies are accepted only from the configured resolver address and port\n\
             - Isolation: One fresh UDP socket per request, bounded by a single deadline\n\
             - Transport: TLS termination with HTTP/1.1 and HTTP/2\n\
             - Observability: Health check and Prometheus metrics on an optional admin listener"
)]
pub struct Args {
    // 配置文件路径
    #[arg(short, long, default_value = "./config.yaml")]
    pub config: PathBuf,

    // 测试配置
    #[arg(
        short = 't',
        long = "test",
        action = ArgAction::SetTrue,
        help = "Test configuration file for validity and exit"
    )]
    pub test_config: bool,

    // 启用调试日志
    #[arg(
        short = 'd',
        long = "debug",
        action = ArgAction::SetTrue,
        help = "Enable debug level logging for detailed output"
    )]
    pub debug: bool,

    // 关闭超时
    #[arg(
        long = "shutdown-timeout",
        help = "Maximum time in seconds to wait for complete shutdown",
        default_value_t = shutdown_timeout::DEFAULT
    )]
    pub shutdown_timeout: u64,
}

impl Args {
    // 解析命令行参数
    pub fn parse_args() -> Self {
        Args::parse()
    }

    // 验证参数
    pub fn validation(&self) -> Result<(), AppError> {
        if self.shutdown_timeout < shutdown_timeout::MIN
            || self.shutdown_timeout > shutdown_timeout::MAX
        {
            return Err(AppError::InvalidShutdownTimeout);
        }
        Ok(())
    }
}
