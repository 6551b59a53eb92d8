// 应用常量定义

//
// 配置参数限制常量
//

// 应用关闭等待时间限制
pub mod shutdown_timeout {
    // 默认值
    pub const DEFAULT: u64 = 30;
    // 最小值
    pub const MIN: u64 = 1;
    // 最大值
    pub const MAX: u64 = 120;
}

// 上游 UDP 交换超时限制（秒）
pub mod upstream_timeout_limits {
    // 默认超时，覆盖发送与接收
    pub const DEFAULT: u64 = 5;
    // 最小超时
    pub const MIN: u64 = 1;
    // 最大超时
    pub const MAX: u64 = 60;
}

//
// DNS 报文尺寸常量
//

pub mod dns_limits {
    // 最小合法查询: 12 字节头部 + 1 字节名称 + 类型/类别
    pub const MIN_QUERY_SIZE: u64 = 18;
    // DNS 报文最大长度
    pub const MAX_MESSAGE_SIZE: u64 = 65535;
    // 上游应答缓冲区大小
    pub const REPLY_BUFFER_SIZE: usize = 1500;
}

//
// 指标标签常量
//

// 上游错误类型标签
pub mod upstream_error_labels {
    // 等待应答超时
    pub const TIMEOUT: &str = "timeout";
    // 应答来源不是配置的解析器
    pub const UNTRUSTED_SOURCE: &str = "untrusted_source";
    // 查询未完整写出
    pub const SHORT_WRITE: &str = "short_write";
    // 其他套接字错误
    pub const SOCKET_ERROR: &str = "socket_error";
}

// 子系统名称
pub mod subsystem_names {
    // 管理服务器子系统
    pub const ADMIN_SERVER: &str = "admin_server";
    // DoH服务器子系统
    pub const DOH_SERVER: &str = "doh_server";
}

// 服务器默认值
pub mod server_defaults {
    // 默认 DoH 监听地址
    pub const DEFAULT_DOH_LISTEN: &str = "127.0.0.1:5443";
    // 默认上游解析器地址
    pub const DEFAULT_RESOLVER: &str = "127.0.0.53:53";
    // 默认本地 UDP 绑定地址
    pub const DEFAULT_UDP_BIND: &str = "127.0.0.1";
    // 默认管理服务器监听地址
    pub const DEFAULT_ADMIN_LISTEN: &str = "127.0.0.1:9000";
    // DoH 查询路径
    pub const DOH_QUERY_PATH: &str = "/dns-query";
}

// HTTP头常量
pub mod http_headers {
    // 内容类型常量
    pub mod content_types {
        // DNS消息内容类型
        pub const DNS_MESSAGE: &str = "application/dns-message";
    }

    // ALPN 协议标识
    pub mod alpn {
        pub const H2: &[u8] = b"h2";
        pub const HTTP_1_1: &[u8] = b"http/1.1";
    }
}
