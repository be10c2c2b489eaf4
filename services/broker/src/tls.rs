use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;

#[derive(Debug, thiserror::Error)]
pub enum TlsSetupError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} contains no valid PEM certificates")]
    NoCertificates { path: String },
    #[error("{path} contains no valid PEM private key")]
    NoPrivateKey { path: String },
    #[error("failed to build client certificate verifier: {0}")]
    Verifier(#[source] rustls::Error),
    #[error("failed to build server TLS configuration: {0}")]
    ServerConfig(#[source] rustls::Error),
}

/// Loads the CA pool and server identity from PEM files and builds a
/// mutually-authenticating, TLS-1.3-only acceptor.
pub fn load_acceptor(
    ca_cert_path: &Path,
    server_cert_path: &Path,
    server_key_path: &Path,
) -> Result<TlsAcceptor, TlsSetupError> {
    let ca_certs = read_certs(ca_cert_path)?;
    let mut roots = RootCertStore::empty();
    for cert in ca_certs {
        roots.add(cert).map_err(TlsSetupError::ServerConfig)?;
    }

    let client_verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .map_err(|e| TlsSetupError::Verifier(rustls::Error::General(e.to_string())))?;

    let server_certs = read_certs(server_cert_path)?;
    let server_key = read_private_key(server_key_path)?;

    let config = ServerConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
        .with_client_cert_verifier(client_verifier)
        .with_single_cert(server_certs, server_key)
        .map_err(TlsSetupError::ServerConfig)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn read_certs(path: &Path) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>, TlsSetupError> {
    let file = File::open(path).map_err(|source| TlsSetupError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let certs: Vec<_> = rustls_pemfile::certs(&mut BufReader::new(file))
        .filter_map(Result::ok)
        .collect();
    if certs.is_empty() {
        return Err(TlsSetupError::NoCertificates {
            path: path.display().to_string(),
        });
    }
    Ok(certs)
}

fn read_private_key(
    path: &Path,
) -> Result<rustls::pki_types::PrivateKeyDer<'static>, TlsSetupError> {
    let file = File::open(path).map_err(|source| TlsSetupError::Read {
        path: path.display().to_string(),
        source,
    })?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .ok()
        .flatten()
        .ok_or_else(|| TlsSetupError::NoPrivateKey {
            path: path.display().to_string(),
        })
}
