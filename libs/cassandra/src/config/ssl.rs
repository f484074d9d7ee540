//! TLS for driver connections, built on rustls.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::{Resumption, WebPkiServerVerifier};
use rustls::crypto::{CryptoProvider, ring};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{
    CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use validator::{Validate, ValidationError};

use crate::common::{CassandraError, CassandraResult};

/// TLS settings. Nodes are verified against the CA certificates in
/// `trust_cert_chain_file`.
///
/// ```json
/// {
///   "trustCertChainFile": "/etc/cassandra/ca.pem",
///   "certChainFile": "/etc/cassandra/client.pem",
///   "privateKeyFile": "/etc/cassandra/client.key"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_client_identity"))]
pub struct SslOptions {
    /// PEM bundle of trusted CA certificates
    pub trust_cert_chain_file: PathBuf,

    /// PEM certificate chain for client authentication
    #[serde(default)]
    pub cert_chain_file: Option<PathBuf>,

    #[serde(default)]
    pub private_key_file: Option<PathBuf>,

    /// Require node certificates to name the address the driver connected to
    #[serde(default = "default_hostname_verification")]
    pub hostname_verification: bool,

    /// TLS sessions kept for resumption; rustls default when unset
    #[serde(default)]
    #[validate(range(min = 1))]
    pub session_cache_size: Option<usize>,
}

fn default_hostname_verification() -> bool {
    true
}

fn validate_client_identity(options: &SslOptions) -> Result<(), ValidationError> {
    match (&options.cert_chain_file, &options.private_key_file) {
        (Some(_), None) | (None, Some(_)) => {
            Err(ValidationError::new("client_identity_incomplete")
                .with_message("certChainFile and privateKeyFile must be set together".into()))
        }
        _ => Ok(()),
    }
}

impl SslOptions {
    pub fn new(trust_cert_chain_file: impl Into<PathBuf>) -> Self {
        Self {
            trust_cert_chain_file: trust_cert_chain_file.into(),
            cert_chain_file: None,
            private_key_file: None,
            hostname_verification: default_hostname_verification(),
            session_cache_size: None,
        }
    }

    /// Present a client certificate to nodes that require one.
    pub fn with_client_identity(
        mut self,
        cert_chain_file: impl Into<PathBuf>,
        private_key_file: impl Into<PathBuf>,
    ) -> Self {
        self.cert_chain_file = Some(cert_chain_file.into());
        self.private_key_file = Some(private_key_file.into());
        self
    }

    pub fn without_hostname_verification(mut self) -> Self {
        self.hostname_verification = false;
        self
    }

    /// Read the PEM files and build the rustls client configuration.
    pub fn client_config(&self) -> CassandraResult<Arc<ClientConfig>> {
        let provider = Arc::new(ring::default_provider());
        let roots = Arc::new(root_store(&self.trust_cert_chain_file)?);

        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(tls_error)?;

        let builder = if self.hostname_verification {
            builder.with_root_certificates(roots)
        } else {
            warn!("TLS hostname verification is disabled");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipHostnameCheck::new(
                    roots, provider,
                )?))
        };

        let mut config = match (&self.cert_chain_file, &self.private_key_file) {
            (Some(certs), Some(key)) => builder
                .with_client_auth_cert(read_certs(certs)?, read_key(key)?)
                .map_err(tls_error)?,
            _ => builder.with_no_client_auth(),
        };

        if let Some(size) = self.session_cache_size {
            config.resumption = Resumption::in_memory_sessions(size);
        }

        debug!(
            trust = %self.trust_cert_chain_file.display(),
            client_auth = self.cert_chain_file.is_some(),
            "Built TLS client configuration"
        );
        Ok(Arc::new(config))
    }
}

fn tls_error(err: impl std::fmt::Display) -> CassandraError {
    CassandraError::Tls(err.to_string())
}

fn read_certs(path: &Path) -> CassandraResult<Vec<CertificateDer<'static>>> {
    let certs = CertificateDer::pem_file_iter(path)
        .and_then(|certs| certs.collect::<Result<Vec<_>, _>>())
        .map_err(|e| tls_error(format!("{}: {e}", path.display())))?;

    if certs.is_empty() {
        return Err(tls_error(format!("{}: no certificates found", path.display())));
    }
    Ok(certs)
}

fn read_key(path: &Path) -> CassandraResult<PrivateKeyDer<'static>> {
    PrivateKeyDer::from_pem_file(path).map_err(|e| tls_error(format!("{}: {e}", path.display())))
}

fn root_store(path: &Path) -> CassandraResult<RootCertStore> {
    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(read_certs(path)?);
    if added == 0 {
        let reason = format!("{}: no usable CA certificates", path.display());
        return Err(tls_error(reason));
    }
    if ignored > 0 {
        warn!(path = %path.display(), ignored, "Skipped unparsable CA certificates");
    }
    Ok(roots)
}

/// Full chain verification that accepts certificates issued for another name.
#[derive(Debug)]
struct SkipHostnameCheck(Arc<WebPkiServerVerifier>);

impl SkipHostnameCheck {
    fn new(roots: Arc<RootCertStore>, provider: Arc<CryptoProvider>) -> CassandraResult<Self> {
        let verifier = WebPkiServerVerifier::builder_with_provider(roots, provider)
            .build()
            .map_err(tls_error)?;
        Ok(Self(verifier))
    }
}

impl ServerCertVerifier for SkipHostnameCheck {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match self
            .0
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. },
            )) => Ok(ServerCertVerified::assertion()),
            result => result,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.0.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.0.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.supported_verify_schemes()
    }
}
