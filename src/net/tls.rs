//! TLS for the WebSocket listener.

use std::io;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

/// Load the certificate chain and key named by `tls`.
///
/// Both files are checked up front so a typo is reported by name instead of
/// as a PEM parse failure.
pub async fn load_tls_config(tls: &TlsConfig) -> io::Result<RustlsConfig> {
    for (what, path) in [("certificate", &tls.cert_path), ("private key", &tls.key_path)] {
        if !Path::new(path).is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("TLS {what} not found: {path}"),
            ));
        }
    }

    tracing::info!(cert = %tls.cert_path, "Loading TLS certificate");
    RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_files_are_named() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let tls = TlsConfig {
            cert_path: cert.display().to_string(),
            key_path: dir.path().join("key.pem").display().to_string(),
        };

        let err = load_tls_config(&tls).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().contains("certificate"));

        std::fs::write(&cert, b"").unwrap();
        let err = load_tls_config(&tls).await.unwrap_err();
        assert!(err.to_string().contains("private key"));
    }
}
