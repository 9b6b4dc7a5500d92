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

//! Acquire and dial configuration.
//!
//! [`AcquireOptions`] controls how the pool allocator selects, shares, and
//! grows connections for one `acquire` call. [`DialOptions`] is handed down
//! to the [`Dial`](crate::transport::Dial) implementation when the allocator
//! decides to establish a new stream.

use std::time::Duration;

#[cfg(feature = "tls")]
use crate::transport::TlsClientOptions;

/// Default cap on parallel streams to one endpoint.
pub const DEFAULT_DUPLICATE_LIMIT: usize = 8;

/// Default cap on the window of written-but-unread requests per stream.
pub const DEFAULT_PIPELINE_LIMIT: u64 = 16;

/// Options controlling one [`Pool::acquire`](crate::Pool::acquire) call.
///
/// The three limits correspond to the three resource policies of the pool:
///
/// - `duplicate_limit` caps parallel streams per endpoint,
/// - `pipeline_limit` caps concurrently in-flight request/response pairs on
///   one stream (frozen into the connection at creation; it is part of the
///   reuse key),
/// - `reuse_limit` caps total lifetime requests per stream before forced
///   retirement (`None` means unlimited, the default).
///
/// # Examples
///
/// ```rust
/// use h1pool::AcquireOptions;
///
/// let opts = AcquireOptions::new()
///     .with_duplicate_limit(2)
///     .with_pipeline_limit(1)
///     .with_reuse_limit(100);
///
/// assert_eq!(opts.duplicate_limit(), 2);
/// assert_eq!(opts.pipeline_limit(), 1);
/// assert_eq!(opts.reuse_limit(), Some(100));
/// ```
#[derive(Debug, Clone, Default)]
pub struct AcquireOptions {
    duplicate_limit: Option<usize>,
    pipeline_limit: Option<u64>,
    reuse_limit: Option<u64>,
    dial: DialOptions,
}

impl AcquireOptions {
    /// Creates options with the defaults: `duplicate_limit = 8`,
    /// `pipeline_limit = 16`, unlimited reuse.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cap on parallel streams to the endpoint.
    pub fn with_duplicate_limit(mut self, limit: usize) -> Self {
        self.duplicate_limit = Some(limit);
        self
    }

    /// Sets the cap on in-flight request/response pairs per stream.
    pub fn with_pipeline_limit(mut self, limit: u64) -> Self {
        self.pipeline_limit = Some(limit);
        self
    }

    /// Sets the lifetime request cap per stream.
    ///
    /// Once a connection has served `limit` full request/response cycles it
    /// is closed during the allocator's eviction step and replaced.
    pub fn with_reuse_limit(mut self, limit: u64) -> Self {
        self.reuse_limit = Some(limit);
        self
    }

    /// Sets the dial options used when the allocator establishes a new
    /// stream.
    pub fn with_dial(mut self, dial: DialOptions) -> Self {
        self.dial = dial;
        self
    }

    /// Returns the duplicate limit.
    pub fn duplicate_limit(&self) -> usize {
        self.duplicate_limit.unwrap_or(DEFAULT_DUPLICATE_LIMIT)
    }

    /// Returns the pipeline limit.
    pub fn pipeline_limit(&self) -> u64 {
        self.pipeline_limit.unwrap_or(DEFAULT_PIPELINE_LIMIT)
    }

    /// Returns the reuse limit, or `None` for unlimited reuse.
    pub fn reuse_limit(&self) -> Option<u64> {
        self.reuse_limit
    }

    /// Returns the dial options.
    pub fn dial(&self) -> &DialOptions {
        &self.dial
    }
}

/// Options for establishing a new stream.
///
/// These are opaque to the pool itself; they are passed through to
/// [`Dial::dial`](crate::transport::Dial::dial) when the allocator grows
/// the pool.
///
/// # Examples
///
/// ```rust
/// use h1pool::DialOptions;
/// use std::time::Duration;
///
/// let opts = DialOptions::new()
///     .with_connect_timeout(Duration::from_secs(10))
///     .with_nodelay(true);
///
/// assert!(opts.nodelay());
/// ```
#[derive(Debug, Clone)]
pub struct DialOptions {
    connect_timeout: Option<Duration>,
    nodelay: bool,
    #[cfg(feature = "tls")]
    tls: TlsClientOptions,
}

impl DialOptions {
    /// Creates dial options with no connect timeout and `TCP_NODELAY`
    /// enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a timeout for connection establishment.
    ///
    /// Without a timeout, dialing blocks for as long as the operating
    /// system takes to fail the connect.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets whether `TCP_NODELAY` is applied to new TCP streams.
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Sets the TLS client options used by TLS stream kinds.
    #[cfg(feature = "tls")]
    pub fn with_tls(mut self, tls: TlsClientOptions) -> Self {
        self.tls = tls;
        self
    }

    /// Returns the connect timeout, if one is configured.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// Returns whether `TCP_NODELAY` is applied to new TCP streams.
    pub fn nodelay(&self) -> bool {
        self.nodelay
    }

    /// Returns the TLS client options.
    #[cfg(feature = "tls")]
    pub fn tls(&self) -> &TlsClientOptions {
        &self.tls
    }
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            nodelay: true,
            #[cfg(feature = "tls")]
            tls: TlsClientOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_defaults() {
        let opts = AcquireOptions::new();
        assert_eq!(opts.duplicate_limit(), DEFAULT_DUPLICATE_LIMIT);
        assert_eq!(opts.pipeline_limit(), DEFAULT_PIPELINE_LIMIT);
        assert_eq!(opts.reuse_limit(), None);
    }

    #[test]
    fn test_acquire_builders() {
        let opts = AcquireOptions::new()
            .with_duplicate_limit(3)
            .with_pipeline_limit(4)
            .with_reuse_limit(5);
        assert_eq!(opts.duplicate_limit(), 3);
        assert_eq!(opts.pipeline_limit(), 4);
        assert_eq!(opts.reuse_limit(), Some(5));
    }

    #[test]
    fn test_dial_defaults() {
        let opts = DialOptions::new();
        assert_eq!(opts.connect_timeout(), None);
        assert!(opts.nodelay());
    }

    #[test]
    fn test_dial_builders() {
        let opts = DialOptions::new()
            .with_connect_timeout(Duration::from_millis(250))
            .with_nodelay(false);
        assert_eq!(opts.connect_timeout(), Some(Duration::from_millis(250)));
        assert!(!opts.nodelay());
    }
}
