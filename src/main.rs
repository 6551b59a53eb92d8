use dohstub::{
    load_tls_acceptor, subsystem_names, AdminServer, AppError, Args, Config, DohServer, Forwarder,
};
use mimalloc::MiMalloc;
use std::process;
use std::sync::Arc;
use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

// 使用 mimalloc 分配器提高内存效率
#[global_allocator]
static GLOBAL: MiMalloc = mimalloc::MiMalloc;

// 默认级别由 --debug 决定，RUST_LOG 可覆盖
fn log_filter(debug: bool) -> EnvFilter {
    let level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

fn init_logging(args: &Args) {
    // 诊断日志写到标准错误
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(args.debug))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_line_number(false)
        .init();
}

// 程序入口
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 解析命令行参数
    let args = Args::parse_args();

    // 初始化日志
    init_logging(&args);

    // 验证参数
    if let Err(e) = args.validation() {
        error!("Invalid command line arguments: {}", e);
        process::exit(1);
    }

    info!("Starting dohstub DNS-over-HTTPS to UDP forwarder");

    // 加载配置
    let config = match Config::from_file(&args.config) {
        Ok(config) => {
            info!("Successfully loaded configuration: {:?}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration file: {}", e);
            process::exit(1);
        }
    };

    // 如果是测试模式，成功验证配置后退出
    if args.test_config {
        info!("Configuration file validation successful");
        return Ok(());
    }

    // 创建应用组件
    let components = match create_components(&config) {
        Ok(components) => components,
        Err(e) => {
            error!("Failed to create application components: {}", e);
            process::exit(1);
        }
    };

    // 创建优雅关闭顶层管理器
    let toplevel = Toplevel::new(|s| async move {
        // 启动DoH服务器子系统
        let doh_server = components.doh_server;
        s.start(SubsystemBuilder::new(
            subsystem_names::DOH_SERVER,
            move |s| async move { doh_server.run(s).await },
        ));
        // 启动管理服务器子系统（可选）
        if let Some(admin_server) = components.admin_server {
            s.start(SubsystemBuilder::new(
                subsystem_names::ADMIN_SERVER,
                move |s| async move { admin_server.run(s).await },
            ));
        }
    });

    // 等待关闭
    info!("All services started, waiting for requests...");
    match toplevel
        .catch_signals()
        .handle_shutdown_requests(tokio::time::Duration::from_secs(args.shutdown_timeout))
        .await
    {
        Ok(_) => {
            info!("Application gracefully shut down");
            Ok(())
        }
        Err(e) => {
            error!("Application shutdown error: {}", e);
            process::exit(1);
        }
    }
}

// 应用组件
struct AppComponents {
    // DoH 服务器
    doh_server: DohServer,
    // 管理服务器
    admin_server: Option<AdminServer>,
}

// 创建应用组件
fn create_components(config: &Config) -> Result<AppComponents, AppError> {
    // 加载 TLS 证书
    let tls_acceptor = load_tls_acceptor(&config.tls.cert_file, &config.tls.key_file)?;

    // 创建转发器
    let forwarder_config = config.forwarder_config()?;
    info!(
        "Forwarding DoH queries to resolver {} from {}, timeout {:?}",
        forwarder_config.upstream, forwarder_config.bind_ip, forwarder_config.timeout
    );
    let forwarder = Arc::new(Forwarder::new(forwarder_config));

    // 创建 DoH 服务器
    let doh_server = DohServer::new(config.listen_addr()?, forwarder, tls_acceptor);

    // 创建管理服务器
    let admin_server = match config.admin_addr()? {
        Some(addr) => Some(AdminServer::new(addr)),
        None => {
            info!("Admin server configuration not provided, admin server disabled");
            None
        }
    };

    Ok(AppComponents {
        doh_server,
        admin_server,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // 测试日志级别随 --debug 切换
    #[test]
    fn test_log_filter_follows_debug_flag() {
        std::env::remove_var(EnvFilter::DEFAULT_ENV);

        assert_eq!(log_filter(false).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(log_filter(true).max_level_hint(), Some(LevelFilter::DEBUG));
    }
}
