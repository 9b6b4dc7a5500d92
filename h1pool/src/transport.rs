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

//! Transport abstractions: the stream kinds the pool can carry.
//!
//! The pool treats the network as an opaque full-duplex byte pipe. This
//! module defines that boundary:
//!
//! - [`Transport`]: `AsyncRead + AsyncWrite` plus endpoint metadata
//! - [`Dial`]: outbound establishment for a transport kind — the pool's
//!   single outbound dependency
//! - [`TcpTransport`]: plaintext TCP
//! - [`TlsTransport`]: TLS over TCP (requires the `tls` feature)
//! - [`MemoryTransport`] / [`MemoryListener`]: in-memory streams for
//!   testing and in-process communication
//!
//! Connections are keyed by the concrete transport kind (the pool is
//! generic over it), so TLS and plaintext connections to the same host and
//! port never alias.
//!
//! # Examples
//!
//! ```rust,no_run
//! use h1pool::transport::{Dial, TcpTransport, Transport};
//! use h1pool::DialOptions;
//!
//! # async fn example() -> Result<(), h1pool::PoolError> {
//! let transport = TcpTransport::dial("example.com", "80", &DialOptions::new()).await?;
//! println!("kind: {}", transport.metadata().kind());
//! # Ok(())
//! # }
//! ```

pub(crate) mod memory;
pub(crate) mod status;
pub(crate) mod tcp;
#[cfg(feature = "tls")]
pub(crate) mod tls;
pub(crate) mod traits;

pub use self::memory::{MemoryListener, MemoryTransport};
pub use self::status::StreamStatus;
pub use self::tcp::TcpTransport;
#[cfg(feature = "tls")]
pub use self::tls::{TlsClientOptions, TlsTransport};
pub use self::traits::{Dial, Transport, TransportMetadata};
