use std::sync::Arc;

use rcgen::{CertificateParams, DistinguishedName, DnType, Issuer, KeyPair};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;

/// An in-process, self-signed CA plus one server leaf and one client leaf
/// certificate signed by it. Exists purely to drive mTLS handshakes in tests
/// without touching the filesystem or a real CA.
pub struct TestCa {
    pub ca_cert_der: CertificateDer<'static>,
    pub server_cert_der: CertificateDer<'static>,
    pub server_key_der: PrivateKeyDer<'static>,
    pub client_cert_der: CertificateDer<'static>,
    pub client_key_der: PrivateKeyDer<'static>,
}

impl TestCa {
    /// Generates a fresh CA and a server/client certificate pair signed by
    /// it. Each call produces an independent trust root.
    pub fn generate() -> Self {
        let mut ca_params = CertificateParams::new(Vec::new()).expect("empty SAN list is valid");
        ca_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        let mut ca_dn = DistinguishedName::new();
        ca_dn.push(DnType::CommonName, "broker-test-ca");
        ca_params.distinguished_name = ca_dn;
        let ca_key = KeyPair::generate().expect("key generation cannot fail on supported targets");
        let ca_cert = ca_params
            .self_signed(&ca_key)
            .expect("self-signing the test CA cannot fail");
        let issuer = Issuer::new(ca_params, ca_key);

        let (server_cert_der, server_key_der) = leaf(&issuer, "broker-test-server", vec!["localhost".into()]);
        let (client_cert_der, client_key_der) = leaf(&issuer, "broker-test-client", Vec::new());

        TestCa {
            ca_cert_der: ca_cert.der().clone(),
            server_cert_der,
            server_key_der,
            client_cert_der,
            client_key_der,
        }
    }

    pub fn root_store(&self) -> RootCertStore {
        let mut store = RootCertStore::empty();
        store
            .add(self.ca_cert_der.clone())
            .expect("test CA cert is well-formed");
        store
    }

    /// Builds a `rustls::ServerConfig` requiring and verifying client
    /// certificates against this CA, TLS 1.3 only, and wraps it for tokio.
    pub fn server_acceptor(&self) -> TlsAcceptor {
        let client_verifier = rustls::server::WebPkiClientVerifier::builder(Arc::new(self.root_store()))
            .build()
            .expect("client verifier builds from a single trusted root");

        let config = ServerConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
            .with_client_cert_verifier(client_verifier)
            .with_single_cert(
                vec![self.server_cert_der.clone()],
                self.server_key_der.clone_key(),
            )
            .expect("server cert/key pair is well-formed");

        TlsAcceptor::from(Arc::new(config))
    }

    /// Builds a `rustls::ClientConfig` presenting the client leaf cert and
    /// trusting only this CA.
    pub fn client_config(&self) -> rustls::ClientConfig {
        rustls::ClientConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
            .with_root_certificates(self.root_store())
            .with_client_auth_cert(
                vec![self.client_cert_der.clone()],
                self.client_key_der.clone_key(),
            )
            .expect("client cert/key pair is well-formed")
    }

    /// A second, unrelated CA's client certificate: useful for asserting
    /// that the broker rejects a client presenting a cert it did not sign.
    pub fn foreign_client_config() -> (RootCertStore, rustls::ClientConfig) {
        let foreign = TestCa::generate();
        (foreign.root_store(), foreign.client_config())
    }
}

fn leaf(
    issuer: &Issuer<'_, KeyPair>,
    common_name: &str,
    subject_alt_names: Vec<String>,
) -> (CertificateDer<'static>, PrivateKeyDer<'static>) {
    let mut params = CertificateParams::new(subject_alt_names).expect("SAN list is valid");
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    let key = KeyPair::generate().expect("key generation cannot fail on supported targets");
    let cert = params
        .signed_by(&key, issuer)
        .expect("signing a leaf with the test CA cannot fail");
    (cert.der().clone(), PrivateKeyDer::Pkcs8(key.serialize_der().into()))
}
