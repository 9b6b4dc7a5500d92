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

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::DialOptions;
use crate::error::PoolError;

/// Core abstraction for a full-duplex byte stream to a remote host.
///
/// The `Transport` trait combines Tokio's `AsyncRead` and `AsyncWrite` with
/// endpoint metadata. The pool does no framing on a transport — it is a byte
/// pipe; all HTTP semantics live above it.
///
/// The pool is generic over the concrete transport kind, so connections of
/// different kinds to the same host and port never alias each other.
///
/// # Implementations
///
/// - [`TcpTransport`](crate::transport::TcpTransport): plaintext TCP
/// - [`TlsTransport`](crate::transport::TlsTransport): TLS over TCP
///   (requires the `tls` feature)
/// - [`MemoryTransport`](crate::transport::MemoryTransport): in-memory
///   streams for testing and in-process communication
pub trait Transport: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {
    /// Returns metadata about this transport.
    ///
    /// The metadata includes the transport kind and, when the transport is
    /// socket-backed, the peer and local addresses.
    fn metadata(&self) -> &TransportMetadata;
}

/// Outbound dialing for a transport kind.
///
/// This is the pool's single outbound dependency: when the allocator decides
/// to grow, it calls `T::dial` for the requested kind. Dialing may take
/// arbitrarily long; the allocator performs it while holding the pool lock,
/// which serializes new-connection establishment.
///
/// # Examples
///
/// ```rust,no_run
/// use h1pool::transport::{Dial, TcpTransport};
/// use h1pool::DialOptions;
///
/// # async fn example() -> Result<(), h1pool::PoolError> {
/// let stream = TcpTransport::dial("example.com", "80", &DialOptions::new()).await?;
/// # Ok(())
/// # }
/// ```
#[async_trait::async_trait]
pub trait Dial: Transport + Sized {
    /// Establishes a new stream of this kind to `host:port`.
    async fn dial(host: &str, port: &str, opts: &DialOptions) -> Result<Self, PoolError>;
}

/// Metadata associated with a transport.
///
/// # Examples
///
/// ```rust
/// use h1pool::transport::TransportMetadata;
///
/// let metadata = TransportMetadata::new("tcp");
/// assert_eq!(metadata.kind(), "tcp");
/// assert_eq!(metadata.peer_port(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct TransportMetadata {
    kind: &'static str,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
}

impl TransportMetadata {
    /// Creates metadata for the given transport kind.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            local_addr: None,
            peer_addr: None,
        }
    }

    /// Sets the local address.
    pub fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    /// Sets the peer address.
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Returns the transport kind name (e.g. `"tcp"`, `"tls"`, `"memory"`).
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Returns the local address, if known.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Returns the peer address, if known.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Returns the local port, or 0 when the transport is not socket-backed.
    pub fn local_port(&self) -> u16 {
        self.local_addr.map(|a| a.port()).unwrap_or(0)
    }

    /// Returns the peer port, or 0 when the transport is not socket-backed.
    pub fn peer_port(&self) -> u16 {
        self.peer_addr.map(|a| a.port()).unwrap_or(0)
    }
}
