// src/tls.rs

use crate::error::TlsError;
use crate::r#const::http_headers::alpn;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info};

/// 从 PEM 证书链和私钥文件构建 TLS 接收器
pub fn load_tls_acceptor<P: AsRef<Path>>(
    cert_path: P,
    key_path: P,
) -> Result<TlsAcceptor, TlsError> {
    let config = build_server_config(cert_path.as_ref(), key_path.as_ref())?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn build_server_config(cert_path: &Path, key_path: &Path) -> Result<ServerConfig, TlsError> {
    let certs = load_certificates(cert_path)?;
    let key = load_private_key(key_path)?;

    // 显式选择 ring 作为加密实现，避免依赖进程级默认提供者
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    config.alpn_protocols = vec![alpn::H2.to_vec(), alpn::HTTP_1_1.to_vec()];

    Ok(config)
}

fn read_pem(path: &Path) -> Result<Vec<u8>, TlsError> {
    fs::read(path).map_err(|source| TlsError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    debug!("Loading TLS certificate from: {}", path.display());

    let mut cursor = Cursor::new(read_pem(path)?);
    let certs = rustls_pemfile::certs(&mut cursor)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: path.display().to_string(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificate(path.display().to_string()));
    }

    info!(
        "Loaded {} certificate(s) from {}",
        certs.len(),
        path.display()
    );
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    debug!("Loading private key from: {}", path.display());

    let mut cursor = Cursor::new(read_pem(path)?);
    rustls_pemfile::private_key(&mut cursor)
        .map_err(|source| TlsError::Read {
            path: path.display().to_string(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.display().to_string()))
}
