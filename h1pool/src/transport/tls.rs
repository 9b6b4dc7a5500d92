//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! TLS transport built on `tokio-rustls`.
//!
//! The TLS stream kind dials TCP first and then performs a client-side TLS
//! handshake, using the host as the SNI server name. Certificate validation
//! defaults to the system's native root store; a verification-disabled
//! configuration is available for testing.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::config::DialOptions;
use crate::error::PoolError;
use crate::transport::tcp::connect_tcp;
use crate::transport::{Dial, Transport, TransportMetadata};

#[cfg(feature = "observability")]
use tracing::{debug, info};

/// TLS client configuration for the TLS stream kind.
///
/// # Examples
///
/// ```rust
/// use h1pool::transport::TlsClientOptions;
///
/// // Validate against the system root store (the default).
/// let opts = TlsClientOptions::native_roots();
///
/// // Accept any certificate. Testing only!
/// let insecure = TlsClientOptions::insecure();
/// ```
#[derive(Debug, Clone)]
pub struct TlsClientOptions {
    source: ConfigSource,
}

#[derive(Debug, Clone)]
enum ConfigSource {
    NativeRoots,
    Insecure,
    Custom(Arc<rustls::ClientConfig>),
}

impl TlsClientOptions {
    /// Validates server certificates against the system's native root store.
    pub fn native_roots() -> Self {
        Self {
            source: ConfigSource::NativeRoots,
        }
    }

    /// Disables certificate verification.
    ///
    /// **WARNING**: only for testing or development. Never use in
    /// production.
    pub fn insecure() -> Self {
        Self {
            source: ConfigSource::Insecure,
        }
    }

    /// Uses a caller-provided rustls client configuration.
    pub fn custom(config: Arc<rustls::ClientConfig>) -> Self {
        Self {
            source: ConfigSource::Custom(config),
        }
    }

    fn client_config(&self) -> Result<Arc<rustls::ClientConfig>, PoolError> {
        match &self.source {
            ConfigSource::Custom(config) => Ok(config.clone()),
            ConfigSource::Insecure => {
                let config = rustls::ClientConfig::builder()
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(NoVerifier))
                    .with_no_client_auth();
                Ok(Arc::new(config))
            }
            ConfigSource::NativeRoots => {
                let mut root_store = rustls::RootCertStore::empty();
                for cert in rustls_native_certs::load_native_certs()
                    .map_err(|e| PoolError::Io {
                        source: io::Error::other(e),
                    })?
                {
                    root_store.add(cert).map_err(|e| PoolError::Io {
                        source: io::Error::other(e),
                    })?;
                }
                let config = rustls::ClientConfig::builder()
                    .with_root_certificates(root_store)
                    .with_no_client_auth();
                Ok(Arc::new(config))
            }
        }
    }
}

impl Default for TlsClientOptions {
    fn default() -> Self {
        Self::native_roots()
    }
}

/// TLS-encrypted TCP transport.
///
/// # Examples
///
/// ```rust,no_run
/// use h1pool::transport::{Dial, TlsTransport};
/// use h1pool::DialOptions;
///
/// # async fn example() -> Result<(), h1pool::PoolError> {
/// let transport = TlsTransport::dial("example.com", "443", &DialOptions::new()).await?;
/// # Ok(())
/// # }
/// ```
pub struct TlsTransport {
    stream: TlsStream<TcpStream>,
    metadata: TransportMetadata,
}

#[async_trait::async_trait]
impl Dial for TlsTransport {
    async fn dial(host: &str, port: &str, opts: &DialOptions) -> Result<Self, PoolError> {
        let tcp = connect_tcp(host, port, opts).await?;

        let metadata = TransportMetadata::new("tls")
            .with_local_addr(tcp.local_addr().map_err(|e| PoolError::Io { source: e })?)
            .with_peer_addr(tcp.peer_addr().map_err(|e| PoolError::Io { source: e })?);

        let server_name = ServerName::try_from(host.to_string()).map_err(|_| {
            PoolError::InvalidServerName {
                name: host.to_string(),
            }
        })?;

        let connector = TlsConnector::from(opts.tls().client_config()?);

        #[cfg(feature = "observability")]
        info!(host = %host, "starting tls handshake");

        let address = format!("{host}:{port}");
        let stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| PoolError::Dial { address, source: e })?;

        #[cfg(feature = "observability")]
        debug!("tls handshake complete");

        Ok(Self { stream, metadata })
    }
}

impl Transport for TlsTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }
}

impl AsyncRead for TlsTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for TlsTransport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

/// Certificate verifier that accepts anything. Testing only.
#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_server_name() {
        let result = ServerName::try_from("not a hostname".to_string());
        assert!(result.is_err());
    }

    #[test]
    fn test_insecure_config_builds() {
        let opts = TlsClientOptions::insecure();
        assert!(opts.client_config().is_ok());
    }

    #[test]
    fn test_custom_config_is_reused() {
        let config = TlsClientOptions::insecure().client_config().unwrap();
        let opts = TlsClientOptions::custom(config.clone());
        let got = opts.client_config().unwrap();
        assert!(Arc::ptr_eq(&config, &got));
    }
}
