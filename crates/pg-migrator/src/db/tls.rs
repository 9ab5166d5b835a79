//! TLS configuration for PostgreSQL connections.
//!
//! Whether TLS is negotiated at all is decided by the connection string's
//! `sslmode` (tokio-postgres handles `disable`, `prefer` and `require`). This
//! module only decides how the server certificate is checked once TLS is in use.

use std::sync::Arc;

use rustls::crypto::{ring, CryptoProvider};
use rustls::ClientConfig;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, warn};

use crate::error::{MigrateError, Result};

/// Server certificate verification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertVerification {
    /// Encrypt but accept any certificate (libpq `require` semantics).
    #[default]
    None,
    /// Verify the certificate chain and hostname against web PKI roots.
    Full,
}

impl CertVerification {
    pub fn from_flag(verify: bool) -> Self {
        if verify {
            CertVerification::Full
        } else {
            CertVerification::None
        }
    }
}

/// Builder for the rustls connector used by every session.
pub struct TlsBuilder {
    verification: CertVerification,
}

impl TlsBuilder {
    pub fn new(verification: CertVerification) -> Self {
        Self { verification }
    }

    /// Build a MakeRustlsConnect for tokio-postgres.
    pub fn build(&self) -> Result<MakeRustlsConnect> {
        Ok(MakeRustlsConnect::new(self.build_client_config()?))
    }

    /// Build the underlying rustls ClientConfig.
    pub fn build_client_config(&self) -> Result<ClientConfig> {
        let provider = Arc::new(ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| MigrateError::Config(format!("TLS setup failed: {}", e)))?;

        let config = match self.verification {
            CertVerification::None => {
                debug!("TLS certificate verification disabled (sslmode=require semantics)");
                builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(NoVerifier { provider }))
                    .with_no_client_auth()
            }
            CertVerification::Full => {
                let mut root_store = rustls::RootCertStore::empty();
                root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                builder
                    .with_root_certificates(root_store)
                    .with_no_client_auth()
            }
        };

        Ok(config)
    }
}

/// Certificate verifier that accepts any server certificate.
///
/// Signatures are still checked with the provider's algorithms so the
/// handshake itself stays sound.
#[derive(Debug)]
struct NoVerifier {
    provider: Arc<CryptoProvider>,
}

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Warn once per session when the server certificate is not being checked.
pub(crate) fn warn_if_unverified(verification: CertVerification, side: &str) {
    if verification == CertVerification::None {
        warn!(
            "{}: TLS server certificate is not verified; set tls.verify_server for production",
            side
        );
    }
}
