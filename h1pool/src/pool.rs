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

//! The connection pool and its allocator.
//!
//! [`Pool`] owns every live [`Connection`] of one stream kind and hands out
//! [`Transaction`]s. The allocator runs entirely under one pool-wide mutex
//! and follows a strict ordering: retire over-reused connections, sweep out
//! dead ones, reuse an idle writable connection, dial a new one, pipeline
//! onto a busy reader, or wait. Waiting uses a pool-wide [`Notify`] that
//! every state-machine transition broadcasts to; a woken waiter re-runs the
//! whole scan, so spurious wake-ups are harmless.
//!
//! Ties between equally good candidate connections are broken uniformly at
//! random, which spreads load and avoids convoying behind one connection.
//!
//! Dialing happens while the pool lock is held. That serializes new-stream
//! establishment globally — deliberately: releasing the lock around the dial
//! would make duplicate-limit accounting racy and observably change the
//! allocator's behavior under slow dials.

use std::fmt;
use std::pin::pin;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::{Mutex, Notify};

use crate::config::AcquireOptions;
use crate::connection::Connection;
use crate::error::PoolError;
use crate::transaction::Transaction;
use crate::transport::{Dial, Transport};

#[cfg(feature = "observability")]
use tracing::{debug, info};

/// A pool of connections of one stream kind.
///
/// `Pool` is a cheap-to-clone handle over shared state; clones see the same
/// connections. Because the pool is generic over the transport kind,
/// plaintext and TLS connections to the same host and port live in different
/// pools and never alias.
///
/// # Examples
///
/// ```rust,no_run
/// use h1pool::{AcquireOptions, Pool};
/// use h1pool::transport::TcpTransport;
///
/// # async fn example() -> Result<(), h1pool::PoolError> {
/// let pool: Pool<TcpTransport> = Pool::new();
///
/// let mut txn = pool.acquire("example.com", "80", AcquireOptions::new()).await?;
/// txn.write(b"GET / HTTP/1.1\r\nhost: example.com\r\n\r\n").await?;
/// txn.close_write();
/// txn.start_read().await;
/// let body = txn.read_available().await?;
/// txn.close_read();
/// # Ok(())
/// # }
/// ```
pub struct Pool<T: Transport> {
    inner: Arc<PoolInner<T>>,
}

struct PoolInner<T: Transport> {
    conns: Mutex<Vec<Arc<Connection<T>>>>,
    notify: Arc<Notify>,
}

impl<T: Transport> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Transport> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Pool<T> {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PoolInner {
                conns: Mutex::new(Vec::new()),
                notify: Arc::new(Notify::new()),
            }),
        }
    }

    /// Number of connections currently pooled (including closed ones that
    /// still owe a response).
    pub async fn connection_count(&self) -> usize {
        self.inner.conns.lock().await.len()
    }

    /// `true` if the pool holds no connections.
    pub async fn is_empty(&self) -> bool {
        self.inner.conns.lock().await.is_empty()
    }

    /// Closes every connection and empties the pool.
    ///
    /// Idempotent: closing an already-closed connection is a no-op at the
    /// stream layer. Transactions still holding a closed connection observe
    /// errors or EOF on their next operation.
    pub async fn close_all(&self) {
        let mut conns = self.inner.conns.lock().await;

        #[cfg(feature = "observability")]
        info!(count = conns.len(), "closing all pooled connections");

        for conn in conns.drain(..) {
            conn.close().await;
        }
        self.inner.notify.notify_waiters();
    }

    /// Removes connections that are closed and owe no response.
    ///
    /// Closed connections whose `read_count` still trails `write_count`
    /// remain pooled: the owed response is lost, and its reader will observe
    /// EOF. The allocator runs this sweep on every pass; calling it directly
    /// is only needed for housekeeping between bursts.
    pub async fn purge(&self) {
        let mut conns = self.inner.conns.lock().await;
        Self::sweep(&mut conns);
    }

    /// Renders one line per connection: status symbol, counters with
    /// busy/lock markers, `host:port:localport`, pipeline limit, and — when
    /// non-trivial — excess size, idle time, and bytes waiting.
    pub async fn show_pool(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        let conns = self.inner.conns.lock().await;
        for conn in conns.iter() {
            write!(out, "{} w{}", conn.stream().status().symbol(), conn.write_count())?;
            if conn.write_busy() {
                write!(out, "*")?;
            }
            write!(out, " r{}", conn.read_count())?;
            if conn.reader_active() {
                write!(out, "*")?;
            }
            write!(
                out,
                " {}:{}:{} pipe={}",
                conn.host(),
                conn.port(),
                conn.stream().local_port(),
                conn.pipeline_limit()
            )?;

            let excess = conn.excess_len();
            if excess > 0 {
                write!(out, " excess={excess}")?;
            }
            let idle = conn.inactive_seconds();
            if idle > 5.0 {
                write!(out, " idle={idle:.1}s")?;
            }
            let waiting = conn.stream().bytes_available().await;
            if waiting > 0 {
                write!(out, " avail={waiting}")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    fn sweep(conns: &mut Vec<Arc<Connection<T>>>) {
        conns.retain(|c| c.is_open() || c.read_count() < c.write_count());
    }
}

impl<T: Dial> Pool<T> {
    /// Returns a transaction bound to a connection for `host:port`.
    ///
    /// Scans under the pool lock, in order:
    ///
    /// 1. close connections at or past the reuse limit (unless a reader is
    ///    mid-response on them),
    /// 2. sweep out dead connections that owe nothing,
    /// 3. reuse a random idle writable connection,
    /// 4. dial a new connection if the endpoint is under its duplicate
    ///    limit,
    /// 5. pipeline onto a random writable connection whose reader is still
    ///    busy,
    /// 6. wait for a state transition and rescan.
    ///
    /// Blocks (without busy-looping) while every connection is at its
    /// pipeline window and the duplicate limit is reached; any `close_write`,
    /// `close_read`, or `close` elsewhere wakes the scan.
    ///
    /// # Errors
    ///
    /// Fails only when step 4 dials and the dial fails; the error is the
    /// dial layer's, unchanged.
    pub async fn acquire(
        &self,
        host: &str,
        port: &str,
        opts: AcquireOptions,
    ) -> Result<Transaction<T>, PoolError> {
        loop {
            // Armed before the scan: a transition landing between "nothing
            // found" and "wait" must complete the wait immediately.
            let mut wake = pin!(self.inner.notify.notified());
            wake.as_mut().enable();

            {
                let mut conns = self.inner.conns.lock().await;

                // 1. Retire connections past their reuse limit. Closure does
                // not remove them; the sweep below handles quiescent ones.
                if let Some(limit) = opts.reuse_limit() {
                    for conn in conns.iter() {
                        if conn.matches_endpoint(host, port)
                            && conn.is_open()
                            && conn.read_count() >= limit
                            && !conn.reader_active()
                        {
                            #[cfg(feature = "observability")]
                            debug!(host = %host, port = %port, "retiring over-reused connection");
                            conn.close().await;
                        }
                    }
                }

                // 2. Sweep dead connections that owe no response.
                Self::sweep(&mut conns);

                // 3 + 5. Writable set; the idle subset is preferred.
                let writable: Vec<Arc<Connection<T>>> = conns
                    .iter()
                    .filter(|c| {
                        c.matches(host, port, opts.pipeline_limit())
                            && c.is_open()
                            && !c.write_busy()
                            && opts.reuse_limit().is_none_or(|l| c.write_count() < l)
                            && c.in_flight() < opts.pipeline_limit() + 1
                    })
                    .cloned()
                    .collect();

                let idle: Vec<Arc<Connection<T>>> = writable
                    .iter()
                    .filter(|c| !c.reader_active())
                    .cloned()
                    .collect();
                if !idle.is_empty() {
                    let conn = idle[random_index(idle.len())].clone();
                    return Ok(Transaction::new(conn, self.inner.notify.clone()));
                }

                // 4. Grow while under the duplicate limit. The dial runs
                // with the pool lock held; see the module docs.
                let endpoint_count = conns
                    .iter()
                    .filter(|c| c.matches(host, port, opts.pipeline_limit()))
                    .count();
                if endpoint_count < opts.duplicate_limit() {
                    #[cfg(feature = "observability")]
                    info!(host = %host, port = %port, "dialing new pooled connection");

                    let transport = T::dial(host, port, opts.dial()).await?;
                    let conn = Arc::new(Connection::new(
                        host,
                        port,
                        opts.pipeline_limit(),
                        transport,
                    ));
                    conns.push(conn.clone());
                    return Ok(Transaction::new(conn, self.inner.notify.clone()));
                }

                // 5. Share a connection whose reader is still mid-response.
                if !writable.is_empty() {
                    let conn = writable[random_index(writable.len())].clone();
                    return Ok(Transaction::new(conn, self.inner.notify.clone()));
                }
            }

            // 6. Every connection is saturated; sleep until something
            // transitions, then rescan from the top.
            wake.await;
        }
    }
}

/// Uniform random index for tie-breaking among equivalent connections.
fn random_index(len: usize) -> usize {
    rand::thread_rng().gen_range(0..len)
}
