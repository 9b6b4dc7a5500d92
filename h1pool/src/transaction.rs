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

//! Per-request transaction handle.
//!
//! A [`Transaction`] is a permit to write one request and then read one
//! response on a shared pooled connection. Its `sequence` — the connection's
//! `write_count` captured at creation, inside the pool's critical section —
//! fixes its place in the response queue: `start_read` waits until exactly
//! `sequence` responses have been read before taking the read lock, which is
//! what delivers pipelined responses in the order their requests were
//! written.
//!
//! The handle moves through Writing → Reading → Done. Operations invoked in
//! the wrong state panic; they are programmer errors, not recoverable
//! conditions. Stream I/O errors are returned and leave the transaction in a
//! state where [`close`](Transaction::close) drains and releases everything.

use std::pin::pin;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Notify, OwnedMutexGuard};

use crate::connection::Connection;
use crate::error::PoolError;
use crate::parser::Parser;
use crate::stream::SharedStream;
use crate::transport::Transport;

#[cfg(feature = "observability")]
use tracing::trace;

/// A single-request handle onto a pooled connection.
///
/// Obtained from [`Pool::acquire`](crate::Pool::acquire). The expected life
/// cycle is:
///
/// ```rust,no_run
/// # use h1pool::{Pool, AcquireOptions};
/// # use h1pool::transport::TcpTransport;
/// # async fn example() -> Result<(), h1pool::PoolError> {
/// # let pool: Pool<TcpTransport> = Pool::new();
/// let mut txn = pool.acquire("example.com", "80", AcquireOptions::new()).await?;
///
/// txn.write(b"GET / HTTP/1.1\r\nhost: example.com\r\n\r\n").await?;
/// txn.close_write();
///
/// txn.start_read().await;
/// while !txn.eof().await {
///     let chunk = txn.read_available().await?;
///     if chunk.is_empty() { break; }
///     // feed chunk to the response parser; push back what it didn't use:
///     // txn.unread(leftover);
/// }
/// txn.close_read();
/// # Ok(())
/// # }
/// ```
///
/// Dropping a transaction that has not completed both halves closes the
/// underlying stream and abandons its read turn if it can be abandoned
/// safely. Pipelined successors behind an abandoned predecessor may stall,
/// so prefer calling [`close`](Transaction::close) explicitly.
pub struct Transaction<T: Transport> {
    conn: Arc<Connection<T>>,
    pool_notify: Arc<Notify>,
    sequence: u64,
    wrote: bool,
    read_done: bool,
    read_guard: Option<OwnedMutexGuard<()>>,
}

impl<T: Transport> Transaction<T> {
    /// Claims the connection's write side. Called by the allocator inside
    /// the pool's critical section.
    pub(crate) fn new(conn: Arc<Connection<T>>, pool_notify: Arc<Notify>) -> Self {
        let sequence = conn.begin_write();
        Self {
            conn,
            pool_notify,
            sequence,
            wrote: false,
            read_done: false,
            read_guard: None,
        }
    }

    /// This transaction's position in the connection's response queue.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// `true` while this transaction owns the connection's write side.
    pub fn is_writable(&self) -> bool {
        self.conn.write_busy() && self.conn.write_count() == self.sequence
    }

    /// `true` while this transaction holds the read lock and it is its turn.
    pub fn is_readable(&self) -> bool {
        self.read_guard.is_some() && self.conn.read_count() == self.sequence
    }

    /// `true` until the underlying stream is closed or fails.
    pub fn is_open(&self) -> bool {
        self.conn.is_open()
    }

    /// Sends request bytes.
    ///
    /// # Panics
    ///
    /// Panics if the transaction is not writable.
    pub async fn write(&mut self, buf: &[u8]) -> Result<(), PoolError> {
        assert!(self.is_writable(), "transaction is not writable");
        self.conn.stream().write(buf).await
    }

    /// Marks the request fully written and releases the write side,
    /// waking pool waiters.
    ///
    /// # Panics
    ///
    /// Panics if the transaction is not writable.
    pub fn close_write(&mut self) {
        assert!(self.is_writable(), "transaction is not writable");
        self.conn.finish_write();
        self.wrote = true;
        self.pool_notify.notify_waiters();

        #[cfg(feature = "observability")]
        trace!(sequence = self.sequence, "request written");
    }

    /// Takes the read turn, waiting until every earlier response on this
    /// connection has been fully read.
    ///
    /// # Panics
    ///
    /// Panics if the transaction is already readable.
    pub async fn start_read(&mut self) {
        assert!(!self.is_readable(), "transaction is already readable");
        self.read_guard = Some(self.wait_for_turn().await);
        self.conn.touch();

        #[cfg(feature = "observability")]
        trace!(sequence = self.sequence, "read turn acquired");
    }

    /// Calls [`start_read`](Self::start_read) unless already readable.
    pub async fn ensure_readable(&mut self) {
        if !self.is_readable() {
            self.start_read().await;
        }
    }

    /// Returns the next bytes of this response: the excess buffer first if a
    /// previous parse pushed bytes back, otherwise whatever the stream
    /// yields next. An empty chunk means end of stream.
    ///
    /// # Panics
    ///
    /// Panics if the transaction is not readable.
    pub async fn read_available(&mut self) -> Result<Bytes, PoolError> {
        assert!(self.is_readable(), "transaction is not readable");

        let excess = self.conn.take_excess();
        if !excess.is_empty() {
            self.conn.touch();
            return Ok(excess);
        }

        let bytes = self.conn.stream().read_available().await?;
        self.conn.touch();
        Ok(bytes)
    }

    /// Pushes back bytes that belong to the next response. They will be the
    /// first bytes the next `read_available` on this connection returns.
    ///
    /// # Panics
    ///
    /// Panics if the transaction is not readable.
    pub fn unread(&mut self, bytes: Bytes) {
        assert!(self.is_readable(), "transaction is not readable");
        self.conn.set_excess(bytes);
    }

    /// Bytes deliverable without waiting (excess buffer first).
    pub async fn bytes_available(&self) -> usize {
        self.conn.bytes_available().await
    }

    /// `true` once the response source is exhausted: no buffered bytes and
    /// the stream reports end of input.
    ///
    /// # Panics
    ///
    /// Panics unless the transaction is readable or the stream is closed.
    pub async fn eof(&self) -> bool {
        assert!(
            self.is_readable() || !self.is_open(),
            "transaction is not readable and its stream is still open"
        );
        if self.conn.bytes_available().await > 0 {
            return false;
        }
        self.conn.stream().eof().await
    }

    /// Marks the response fully read, releases the read lock, and hands the
    /// turn to the next pipelined transaction.
    ///
    /// # Panics
    ///
    /// Panics if the transaction is not readable.
    pub fn close_read(&mut self) {
        assert!(self.is_readable(), "transaction is not readable");
        self.conn.advance_read();
        self.read_guard = None;
        self.read_done = true;
        self.conn.notify_read_turn();
        self.pool_notify.notify_waiters();

        #[cfg(feature = "observability")]
        trace!(sequence = self.sequence, "response read");
    }

    /// Forces the transaction to completion from any state.
    ///
    /// Closes the underlying stream (the only way a caller evicts a pooled
    /// connection), synthesizes `close_write` if the request was still being
    /// written, then takes the read turn, drains residual bytes, and
    /// performs `close_read` so the connection reaches quiescence and the
    /// next purge sweep can remove it.
    pub async fn close(&mut self) {
        self.conn.stream().close().await;

        if self.is_writable() {
            self.conn.finish_write();
            self.wrote = true;
        }

        if !self.read_done {
            if self.read_guard.is_none() {
                self.read_guard = Some(self.wait_for_turn().await);
            }
            self.conn.purge().await;
            self.conn.advance_read();
            self.read_guard = None;
            self.read_done = true;
            self.conn.notify_read_turn();
        }

        self.pool_notify.notify_waiters();

        #[cfg(feature = "observability")]
        trace!(sequence = self.sequence, "transaction force-closed");
    }

    /// The connection's reusable parse scratch.
    pub fn parser(&self) -> parking_lot::MutexGuard<'_, Parser> {
        self.conn.parser()
    }

    /// The raw shared stream under this transaction.
    pub fn stream(&self) -> &SharedStream<T> {
        self.conn.stream()
    }

    /// Seconds since the last read-side activity on the connection.
    pub fn inactive_seconds(&self) -> f64 {
        self.conn.inactive_seconds()
    }

    pub(crate) fn connection(&self) -> &Arc<Connection<T>> {
        &self.conn
    }

    /// Acquires the read lock once `read_count` reaches this transaction's
    /// sequence.
    ///
    /// The wait is a retry loop against the connection's read-turn
    /// condition: take the lock, check the counter, and if it is not our
    /// turn yet release the lock and sleep until the counter advances. The
    /// notified future is armed before the counter check so an advance
    /// between check and sleep is never missed.
    async fn wait_for_turn(&self) -> OwnedMutexGuard<()> {
        loop {
            let mut turn = pin!(self.conn.read_turn().notified());
            turn.as_mut().enable();

            let guard = self.conn.read_lock().clone().lock_owned().await;
            if self.conn.read_count() == self.sequence {
                return guard;
            }
            drop(guard);

            turn.await;
        }
    }
}

impl<T: Transport> Drop for Transaction<T> {
    fn drop(&mut self) {
        if self.wrote && self.read_done {
            return;
        }

        // Best-effort synchronous teardown: mark the stream dead, release
        // the write side, and abandon the read turn when it is provably
        // ours. Residual bytes are not drained here; close() is the
        // supported path.
        self.conn.stream().mark_closed();

        if self.is_writable() {
            self.conn.finish_write();
        }

        if !self.read_done {
            let held = self.read_guard.take().is_some();
            if held || self.conn.read_count() == self.sequence {
                self.conn.advance_read();
                self.conn.notify_read_turn();
            }
        }

        self.pool_notify.notify_waiters();
    }
}
