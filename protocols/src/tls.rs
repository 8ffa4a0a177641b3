//! TLS session establishment for probes.
//!
//! A probe judges whether a handshake can be completed and what gets
//! negotiated; it makes no trust decision. The verifier below therefore
//! accepts whatever certificate the server presents, so self-signed and
//! private-CA mail hosts report their TLS parameters instead of failing.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::{self, CryptoProvider};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{self, ClientConfig, DigitallySignedStruct, SignatureScheme};
use tracing::debug;

use crate::error::ProbeError;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Wraps an established stream in a TLS session for `host`.
pub async fn handshake<S>(stream: S, host: &str) -> Result<TlsStream<S>, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| ProbeError::InvalidServerName(host.to_string()))?;

    let connector = TlsConnector::from(client_config());
    let tls_stream = timeout(HANDSHAKE_TIMEOUT, connector.connect(server_name, stream))
        .await
        .map_err(|_| ProbeError::Timeout("TLS handshake"))?
        .map_err(unwrap_handshake_error)?;

    debug!("TLS established with {host}: {}", describe(&tls_stream));
    Ok(tls_stream)
}

/// The negotiated protocol version and cipher suite, for the report block.
pub fn describe<S>(stream: &TlsStream<S>) -> String {
    let (_, session) = stream.get_ref();

    let version: String = session
        .protocol_version()
        .map(|version| format!("{version:?}"))
        .unwrap_or_else(|| "unknown version".to_string());
    let suite: String = session
        .negotiated_cipher_suite()
        .map(|suite| format!("{:?}", suite.suite()))
        .unwrap_or_else(|| "unknown cipher suite".to_string());

    format!("{version}, {suite}")
}

/// The connector flattens handshake failures into `io::Error`; pull the
/// rustls cause back out so reports name the TLS failure, not a wrapper.
fn unwrap_handshake_error(err: std::io::Error) -> ProbeError {
    match err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        Some(tls_err) => ProbeError::Tls(tls_err.clone()),
        None => ProbeError::Io(err),
    }
}

fn client_config() -> Arc<ClientConfig> {
    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert::new()))
        .with_no_client_auth();
    Arc::new(config)
}

/// Accepts every server certificate while still checking handshake
/// signatures, so a negotiated session is cryptographically sound even
/// though the peer's identity is not vouched for.
#[derive(Debug)]
struct AcceptAnyCert {
    provider: CryptoProvider,
}

impl AcceptAnyCert {
    fn new() -> Self {
        Self {
            provider: crypto::ring::default_provider(),
        }
    }
}

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
