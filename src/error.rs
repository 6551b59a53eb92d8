use std::io;
use thiserror::Error;

// Unified error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),

    #[error("Invalid shutdown timeout, must be between 1 and 120 seconds")]
    InvalidShutdownTimeout,
}

// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadError(#[from] io::Error),

    #[error("YAML parsing error: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid server listen address: {0}")]
    InvalidListenAddress(String),

    #[error("Invalid upstream bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid upstream resolver address: {0}")]
    InvalidResolverAddress(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

// TLS error type
#[derive(Error, Debug)]
pub enum TlsError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("No valid certificate found in {0}")]
    NoCertificate(String),

    #[error("No valid private key found in {0}")]
    NoPrivateKey(String),

    #[error("TLS configuration error: {0}")]
    Rustls(#[from] rustls::Error),
}

// 转发过程中导致连接被放弃（不写回任何响应）的错误
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    #[error("Request body ended after {received} of {declared} declared bytes")]
    IncompleteBody { declared: u64, received: u64 },
}
