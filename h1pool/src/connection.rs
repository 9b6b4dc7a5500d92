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

//! Pooled connection state.
//!
//! A [`Connection`] is the long-lived record behind one dialed stream: the
//! endpoint identity it was dialed for, the frozen pipeline limit, the
//! write/read sequence counters, the read lock, the excess buffer, and a
//! reusable parser slot. It exposes no public operations — every external
//! interaction goes through a [`Transaction`](crate::Transaction).
//!
//! Counter discipline: `write_busy` transitions happen under the pool lock
//! (allocation) or by the sole writer; `read_count` advances only under the
//! read lock. Everything is therefore safe to read as relaxed-ish atomics
//! from the allocator, which re-validates under the pool lock anyway.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex, Notify};

use crate::parser::Parser;
use crate::stream::SharedStream;
use crate::transport::Transport;

pub(crate) struct Connection<T> {
    host: String,
    port: String,
    /// Max in-flight request/response pairs; frozen at creation and part of
    /// the reuse key.
    pipeline_limit: u64,
    stream: SharedStream<T>,
    /// Bytes read past the end of the last response, owed to the next one.
    excess: SyncMutex<Bytes>,
    /// A writer currently owns the write side.
    write_busy: AtomicBool,
    /// Requests fully written. Monotonic.
    write_count: AtomicU64,
    /// Responses fully read. Monotonic, trails `write_count`.
    read_count: AtomicU64,
    /// Held for the full duration of reading one response.
    read_lock: Arc<Mutex<()>>,
    /// Signaled whenever `read_count` advances.
    read_turn: Notify,
    /// Reusable parse scratch, opaque to the pool.
    parser: SyncMutex<Parser>,
    created: Instant,
    /// Milliseconds after `created` of the last observable read-side
    /// activity.
    last_activity_ms: AtomicU64,
}

impl<T: Transport> Connection<T> {
    pub(crate) fn new(host: &str, port: &str, pipeline_limit: u64, transport: T) -> Self {
        Self {
            host: host.to_string(),
            port: port.to_string(),
            pipeline_limit,
            stream: SharedStream::new(transport),
            excess: SyncMutex::new(Bytes::new()),
            write_busy: AtomicBool::new(false),
            write_count: AtomicU64::new(0),
            read_count: AtomicU64::new(0),
            read_lock: Arc::new(Mutex::new(())),
            read_turn: Notify::new(),
            parser: SyncMutex::new(Parser::new()),
            created: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
        }
    }

    pub(crate) fn host(&self) -> &str {
        &self.host
    }

    pub(crate) fn port(&self) -> &str {
        &self.port
    }

    pub(crate) fn pipeline_limit(&self) -> u64 {
        self.pipeline_limit
    }

    pub(crate) fn stream(&self) -> &SharedStream<T> {
        &self.stream
    }

    pub(crate) fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Acquire)
    }

    pub(crate) fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::Acquire)
    }

    pub(crate) fn write_busy(&self) -> bool {
        self.write_busy.load(Ordering::Acquire)
    }

    pub(crate) fn is_open(&self) -> bool {
        self.stream.is_open()
    }

    /// Written-but-unread requests currently in flight.
    pub(crate) fn in_flight(&self) -> u64 {
        self.write_count().saturating_sub(self.read_count())
    }

    /// Endpoint match for eviction and purge sweeps.
    pub(crate) fn matches_endpoint(&self, host: &str, port: &str) -> bool {
        self.host == host && self.port == port
    }

    /// Full reuse-key match: endpoint plus pipeline limit.
    pub(crate) fn matches(&self, host: &str, port: &str, pipeline_limit: u64) -> bool {
        self.matches_endpoint(host, port) && self.pipeline_limit == pipeline_limit
    }

    /// Claims the write side and returns the new transaction's sequence.
    ///
    /// Called inside the pool's critical section, which is what makes
    /// sequences unique and contiguous per connection.
    pub(crate) fn begin_write(&self) -> u64 {
        let was_busy = self.write_busy.swap(true, Ordering::AcqRel);
        assert!(!was_busy, "connection already has a writer");
        self.write_count()
    }

    /// Records a fully written request and releases the write side.
    pub(crate) fn finish_write(&self) {
        self.write_count.fetch_add(1, Ordering::AcqRel);
        self.write_busy.store(false, Ordering::Release);
    }

    /// Records a fully read response. The caller must hold the read lock
    /// and release it immediately afterwards.
    pub(crate) fn advance_read(&self) {
        self.read_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Wakes transactions waiting for their read turn.
    pub(crate) fn notify_read_turn(&self) {
        self.read_turn.notify_waiters();
    }

    pub(crate) fn read_turn(&self) -> &Notify {
        &self.read_turn
    }

    pub(crate) fn read_lock(&self) -> &Arc<Mutex<()>> {
        &self.read_lock
    }

    /// `true` while some transaction holds the read lock.
    pub(crate) fn reader_active(&self) -> bool {
        self.read_lock.try_lock().is_err()
    }

    /// Takes the excess buffer, leaving it empty.
    pub(crate) fn take_excess(&self) -> Bytes {
        std::mem::take(&mut *self.excess.lock())
    }

    pub(crate) fn set_excess(&self, bytes: Bytes) {
        *self.excess.lock() = bytes;
    }

    pub(crate) fn excess_len(&self) -> usize {
        self.excess.lock().len()
    }

    /// Bytes deliverable to the current reader without waiting; the excess
    /// buffer takes precedence over stream-level availability.
    pub(crate) async fn bytes_available(&self) -> usize {
        let excess = self.excess_len();
        if excess > 0 {
            return excess;
        }
        self.stream.bytes_available().await
    }

    /// Drains residual stream bytes and discards the excess buffer.
    ///
    /// Runs after the stream has been closed so stale bytes cannot make a
    /// later `eof` lie.
    pub(crate) async fn purge(&self) {
        self.stream.purge().await;
        *self.excess.lock() = Bytes::new();
        debug_assert_eq!(self.stream.bytes_available().await, 0);
    }

    pub(crate) async fn close(&self) {
        self.stream.close().await;
    }

    pub(crate) fn parser(&self) -> parking_lot::MutexGuard<'_, Parser> {
        self.parser.lock()
    }

    /// Stamps the read side as active now.
    pub(crate) fn touch(&self) {
        let elapsed = self.created.elapsed().as_millis() as u64;
        self.last_activity_ms.store(elapsed, Ordering::Release);
    }

    /// Seconds since the last observable read-side activity.
    pub(crate) fn inactive_seconds(&self) -> f64 {
        let elapsed = self.created.elapsed().as_millis() as u64;
        let last = self.last_activity_ms.load(Ordering::Acquire);
        elapsed.saturating_sub(last) as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use tokio::io::AsyncWriteExt;

    fn connection() -> (Connection<MemoryTransport>, MemoryTransport) {
        let (client, server) = MemoryTransport::pair_default();
        (Connection::new("h.test", "80", 16, client), server)
    }

    #[tokio::test]
    async fn test_counters_start_at_zero() {
        let (conn, _server) = connection();
        assert_eq!(conn.write_count(), 0);
        assert_eq!(conn.read_count(), 0);
        assert!(!conn.write_busy());
        assert_eq!(conn.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_begin_finish_write() {
        let (conn, _server) = connection();

        let sequence = conn.begin_write();
        assert_eq!(sequence, 0);
        assert!(conn.write_busy());

        conn.finish_write();
        assert!(!conn.write_busy());
        assert_eq!(conn.write_count(), 1);
        assert_eq!(conn.in_flight(), 1);
    }

    #[tokio::test]
    #[should_panic(expected = "already has a writer")]
    async fn test_double_writer_panics() {
        let (conn, _server) = connection();
        conn.begin_write();
        conn.begin_write();
    }

    #[tokio::test]
    async fn test_matching() {
        let (conn, _server) = connection();
        assert!(conn.matches_endpoint("h.test", "80"));
        assert!(!conn.matches_endpoint("h.test", "81"));
        assert!(conn.matches("h.test", "80", 16));
        assert!(!conn.matches("h.test", "80", 1));
    }

    #[tokio::test]
    async fn test_excess_takes_precedence_over_stream() {
        let (conn, mut server) = connection();

        server.write_all(b"stream").await.unwrap();
        tokio::task::yield_now().await;

        conn.set_excess(Bytes::from_static(b"excess!"));
        assert_eq!(conn.bytes_available().await, 7);

        let taken = conn.take_excess();
        assert_eq!(&taken[..], b"excess!");
        assert_eq!(conn.excess_len(), 0);
        assert_eq!(conn.bytes_available().await, 6);
    }

    #[tokio::test]
    async fn test_reader_active_tracks_lock() {
        let (conn, _server) = connection();
        assert!(!conn.reader_active());

        let guard = conn.read_lock().clone().lock_owned().await;
        assert!(conn.reader_active());

        drop(guard);
        assert!(!conn.reader_active());
    }

    #[tokio::test]
    async fn test_purge_clears_excess_and_stream() {
        let (conn, mut server) = connection();

        server.write_all(b"residual").await.unwrap();
        tokio::task::yield_now().await;
        conn.set_excess(Bytes::from_static(b"extra"));

        conn.close().await;
        conn.purge().await;

        assert_eq!(conn.bytes_available().await, 0);
        assert_eq!(conn.excess_len(), 0);
    }

    #[tokio::test]
    async fn test_inactive_seconds_resets_on_touch() {
        let (conn, _server) = connection();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert!(conn.inactive_seconds() >= 0.03);

        conn.touch();
        assert!(conn.inactive_seconds() < 0.03);
    }
}
