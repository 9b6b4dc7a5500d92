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

//! Plaintext TCP transport.
//!
//! This module provides the plaintext stream kind using Tokio's `TcpStream`.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

use crate::config::DialOptions;
use crate::error::PoolError;
use crate::transport::{Dial, Transport, TransportMetadata};

#[cfg(feature = "observability")]
use tracing::{debug, info};

/// Plaintext TCP transport.
///
/// `TcpTransport` wraps a Tokio `TcpStream` and implements [`Transport`]
/// and [`Dial`]. It honors the connect timeout and `TCP_NODELAY` settings
/// from [`DialOptions`].
///
/// # Examples
///
/// ```rust,no_run
/// use h1pool::transport::{Dial, TcpTransport, Transport};
/// use h1pool::DialOptions;
///
/// # async fn example() -> Result<(), h1pool::PoolError> {
/// let transport = TcpTransport::dial("example.com", "80", &DialOptions::new()).await?;
/// println!("connected from port {}", transport.metadata().local_port());
/// # Ok(())
/// # }
/// ```
pub struct TcpTransport {
    stream: TcpStream,
    metadata: TransportMetadata,
}

impl TcpTransport {
    /// Creates a TCP transport from an existing stream.
    ///
    /// This is used internally by [`Dial`] and by the TLS transport, which
    /// dials TCP first.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        let local_addr = stream.local_addr()?;
        let peer_addr = stream.peer_addr()?;

        let metadata = TransportMetadata::new("tcp")
            .with_local_addr(local_addr)
            .with_peer_addr(peer_addr);

        Ok(Self { stream, metadata })
    }

    /// Consumes the transport, returning the inner `TcpStream`.
    pub fn into_inner(self) -> TcpStream {
        self.stream
    }
}

/// Connects a raw `TcpStream` to `host:port`, honoring the dial options.
///
/// Shared between the plaintext and TLS stream kinds.
pub(crate) async fn connect_tcp(
    host: &str,
    port: &str,
    opts: &DialOptions,
) -> Result<TcpStream, PoolError> {
    let address = format!("{host}:{port}");

    #[cfg(feature = "observability")]
    info!(address = %address, "dialing tcp");

    let stream = match opts.connect_timeout() {
        Some(duration) => tokio::time::timeout(duration, TcpStream::connect(&address))
            .await
            .map_err(|_| PoolError::DialTimeout {
                address: address.clone(),
                duration,
            })?,
        None => TcpStream::connect(&address).await,
    }
    .map_err(|e| PoolError::Dial {
        address: address.clone(),
        source: e,
    })?;

    if opts.nodelay() {
        stream.set_nodelay(true).map_err(|e| PoolError::Dial {
            address,
            source: e,
        })?;
    }

    #[cfg(feature = "observability")]
    debug!("tcp connection established");

    Ok(stream)
}

#[async_trait::async_trait]
impl Dial for TcpTransport {
    async fn dial(host: &str, port: &str, opts: &DialOptions) -> Result<Self, PoolError> {
        let stream = connect_tcp(host, port, opts).await?;
        Self::from_stream(stream).map_err(|e| PoolError::Io { source: e })
    }
}

impl Transport for TcpTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }
}

impl AsyncRead for TcpTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpTransport {
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
