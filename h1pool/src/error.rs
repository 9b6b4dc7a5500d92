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

//! Pool error types.
//!
//! This module defines the error hierarchy for the connection pool. Errors
//! fall into two broad groups:
//!
//! - **Stream failures**: I/O errors from the underlying byte stream during
//!   dialing, reading, or writing. These are propagated to the caller
//!   unchanged; the affected connection is closed and swept out of the pool
//!   once it no longer owes a response.
//! - **State errors**: using a transaction whose connection has been torn
//!   down.
//!
//! Wrong-state operations (writing on a transaction that is not writable,
//! reading before `start_read`, and so on) are programmer errors and panic
//! via assertions rather than returning a variant here.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the connection pool.
///
/// The pool never retries on its own: a failed stream results in the owning
/// connection being closed, and subsequent purge sweeps remove it. Pending
/// transactions on that connection observe errors or EOF on their next
/// operation.
///
/// # Examples
///
/// ```rust
/// use h1pool::PoolError;
/// use std::io;
///
/// let error = PoolError::Dial {
///     address: "127.0.0.1:80".to_string(),
///     source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
/// };
///
/// if error.is_recoverable() {
///     println!("Can retry dialing");
/// }
/// ```
#[derive(Debug, Error)]
pub enum PoolError {
    /// Failed to dial a new stream to the remote endpoint.
    ///
    /// This error occurs during connection establishment. The pool itself is
    /// unaffected; the caller may retry the acquire.
    #[error("failed to dial {address}: {source}")]
    Dial {
        /// The address that failed to connect
        address: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Dialing a new stream exceeded the configured connect timeout.
    #[error("dialing {address} timed out after {duration:?}")]
    DialTimeout {
        /// The address that failed to connect
        address: String,
        /// The timeout that was exceeded
        duration: Duration,
    },

    /// Failed to read from the underlying stream.
    ///
    /// The connection is marked closed; the transaction should be closed so
    /// the pool can reclaim the stream.
    #[error("read failed: {source}")]
    Read {
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Failed to write to the underlying stream.
    ///
    /// The connection is marked closed; the transaction should be closed so
    /// the pool can reclaim the stream.
    #[error("write failed: {source}")]
    Write {
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The underlying stream is closed.
    ///
    /// Returned when writing through a transaction whose connection has
    /// already been torn down (by `close`, by the peer, or by eviction).
    #[error("connection is closed")]
    Closed,

    /// The host is not a valid TLS server name.
    #[cfg(feature = "tls")]
    #[error("invalid TLS server name: {name}")]
    InvalidServerName {
        /// The host that could not be converted to a server name
        name: String,
    },

    /// An unexpected I/O error occurred.
    ///
    /// This is a catch-all for I/O errors that don't fit into other
    /// categories.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl PoolError {
    /// Returns `true` if this error is potentially recoverable by retrying
    /// the operation, typically with a fresh [`acquire`](crate::Pool::acquire).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use h1pool::PoolError;
    ///
    /// assert!(!PoolError::Closed.is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        match self {
            PoolError::Dial { .. } | PoolError::DialTimeout { .. } => true,

            PoolError::Read { source }
            | PoolError::Write { source }
            | PoolError::Io { source } => matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),

            PoolError::Closed => false,

            #[cfg(feature = "tls")]
            PoolError::InvalidServerName { .. } => false,
        }
    }

    /// Returns `true` if this error indicates the owning connection should
    /// be closed and left for the purge sweep.
    ///
    /// Dial failures happen before a connection exists, so they never close
    /// one. Transient I/O errors do not require closing either.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use h1pool::PoolError;
    ///
    /// assert!(PoolError::Closed.should_close_connection());
    /// ```
    pub fn should_close_connection(&self) -> bool {
        match self {
            PoolError::Dial { .. } | PoolError::DialTimeout { .. } => false,

            #[cfg(feature = "tls")]
            PoolError::InvalidServerName { .. } => false,

            PoolError::Closed => true,

            PoolError::Read { source }
            | PoolError::Write { source }
            | PoolError::Io { source } => !matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
        }
    }
}

impl From<io::Error> for PoolError {
    fn from(error: io::Error) -> Self {
        PoolError::Io { source: error }
    }
}
