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

//! Shared byte-stream adapter.
//!
//! [`SharedStream`] gives the pool a uniform view over any dialed
//! [`Transport`]: a full-duplex byte pipe with independent read and write
//! sides, each usable from a different task. The pool's state machine
//! guarantees at most one writer and one reader at a time; the adapter's own
//! locks only serialize the narrow windows where bookkeeping operations
//! (availability probes, purge draining) touch the same half.
//!
//! The adapter does no framing. Bytes read past the end of a response are
//! the connection's problem (see the excess buffer on
//! [`Connection`](crate::connection::Connection)); bytes the kernel has
//! buffered but nobody asked for yet are this module's problem, tracked in
//! a stash filled by non-blocking probes.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll, Waker};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf, ReadHalf, WriteHalf};
use tokio::sync::Mutex;

use crate::error::PoolError;
use crate::transport::{StreamStatus, Transport, TransportMetadata};

/// Upper bound on one blocking read.
const READ_CHUNK: usize = 16 * 1024;

/// Probe buffer size for non-blocking availability checks.
const PROBE_CHUNK: usize = 4 * 1024;

/// A dialed transport wrapped for shared full-duplex use.
pub struct SharedStream<T> {
    metadata: TransportMetadata,
    reader: Mutex<ReadState<T>>,
    writer: Mutex<WriteHalf<T>>,
    open: AtomicBool,
    eof: AtomicBool,
    /// Length of the reader stash, readable without taking the reader lock.
    stashed: AtomicUsize,
}

struct ReadState<T> {
    half: ReadHalf<T>,
    /// Bytes pulled off the transport by availability probes, served to the
    /// next `read_available` before any new transport read.
    stash: BytesMut,
}

impl<T: Transport> SharedStream<T> {
    /// Wraps a freshly dialed transport.
    pub fn new(transport: T) -> Self {
        let metadata = transport.metadata().clone();
        let (read_half, write_half) = tokio::io::split(transport);
        Self {
            metadata,
            reader: Mutex::new(ReadState {
                half: read_half,
                stash: BytesMut::new(),
            }),
            writer: Mutex::new(write_half),
            open: AtomicBool::new(true),
            eof: AtomicBool::new(false),
            stashed: AtomicUsize::new(0),
        }
    }

    /// Returns whatever bytes are next on the stream, waiting for at least
    /// one if none are buffered.
    ///
    /// Returns an empty chunk at end of stream or once the stream has been
    /// closed.
    pub async fn read_available(&self) -> Result<Bytes, PoolError> {
        let mut state = self.reader.lock().await;

        if !state.stash.is_empty() {
            let out = state.stash.split().freeze();
            self.stashed.store(0, Ordering::Release);
            return Ok(out);
        }

        if self.eof.load(Ordering::Acquire) || !self.is_open() {
            return Ok(Bytes::new());
        }

        let mut chunk = BytesMut::with_capacity(READ_CHUNK);
        match state.half.read_buf(&mut chunk).await {
            Ok(0) => {
                self.eof.store(true, Ordering::Release);
                Ok(Bytes::new())
            }
            Ok(_) => Ok(chunk.freeze()),
            Err(e) => {
                self.open.store(false, Ordering::Release);
                Err(PoolError::Read { source: e })
            }
        }
    }

    /// Writes the entire buffer, flushing afterwards.
    pub async fn write(&self, buf: &[u8]) -> Result<(), PoolError> {
        if !self.is_open() {
            return Err(PoolError::Closed);
        }

        let mut writer = self.writer.lock().await;
        let result = async {
            writer.write_all(buf).await?;
            writer.flush().await
        }
        .await;

        result.map_err(|e| {
            self.open.store(false, Ordering::Release);
            PoolError::Write { source: e }
        })
    }

    /// Closes the stream.
    ///
    /// Shuts the write side down and marks the stream closed; residual
    /// inbound bytes remain until [`purge`](Self::purge) drains them.
    /// Idempotent.
    pub async fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let mut writer = self.writer.lock().await;
            let _ = writer.shutdown().await;
        }
    }

    /// Returns `true` until the stream is closed locally or fails.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Number of bytes that can be read without waiting.
    ///
    /// Probes the transport without blocking and stashes anything found, so
    /// repeated calls are cheap. While another task is mid-read, every byte
    /// in flight belongs to it and this reports zero rather than waiting.
    pub async fn bytes_available(&self) -> usize {
        let stashed = self.stashed.load(Ordering::Acquire);
        if stashed > 0 {
            return stashed;
        }
        if self.eof.load(Ordering::Acquire) || !self.is_open() {
            return 0;
        }

        let Ok(mut state) = self.reader.try_lock() else {
            return 0;
        };
        self.fill_stash(&mut state);
        state.stash.len()
    }

    /// Returns `true` once the peer has closed its write side and no
    /// buffered bytes remain, or once the stream itself is closed.
    pub async fn eof(&self) -> bool {
        if self.stashed.load(Ordering::Acquire) > 0 {
            return false;
        }
        if self.eof.load(Ordering::Acquire) || !self.is_open() {
            return true;
        }

        let mut state = self.reader.lock().await;
        if !state.stash.is_empty() {
            return false;
        }
        self.fill_stash(&mut state);
        state.stash.is_empty() && self.eof.load(Ordering::Acquire)
    }

    /// Drains and discards every byte the transport can produce without
    /// waiting.
    ///
    /// Called after close so kernel-buffered leftovers cannot make a later
    /// [`eof`](Self::eof) report data that will never be wanted.
    pub async fn purge(&self) {
        let mut state = self.reader.lock().await;
        self.fill_stash(&mut state);
        state.stash.clear();
        self.stashed.store(0, Ordering::Release);
    }

    /// Coarse stream state for rendering.
    pub fn status(&self) -> StreamStatus {
        if !self.is_open() {
            StreamStatus::Closed
        } else if self.eof.load(Ordering::Acquire) {
            StreamStatus::Closing
        } else if self.stashed.load(Ordering::Acquire) > 0 {
            StreamStatus::Active
        } else {
            StreamStatus::Open
        }
    }

    /// Remote port of the underlying transport, 0 if not socket-backed.
    pub fn peer_port(&self) -> u16 {
        self.metadata.peer_port()
    }

    /// Local port of the underlying transport, 0 if not socket-backed.
    pub fn local_port(&self) -> u16 {
        self.metadata.local_port()
    }

    /// Metadata of the underlying transport.
    pub fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }

    /// Marks the stream closed without touching the transport.
    ///
    /// Used on teardown paths that cannot await (drop).
    pub(crate) fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Pulls everything the transport can produce without waiting into the
    /// stash.
    fn fill_stash(&self, state: &mut ReadState<T>) {
        let mut probe = [0u8; PROBE_CHUNK];
        loop {
            match poll_read_once(&mut state.half, &mut probe) {
                Poll::Ready(Ok(0)) => {
                    self.eof.store(true, Ordering::Release);
                    break;
                }
                Poll::Ready(Ok(n)) => state.stash.extend_from_slice(&probe[..n]),
                Poll::Ready(Err(_)) => {
                    self.open.store(false, Ordering::Release);
                    break;
                }
                Poll::Pending => break,
            }
        }
        self.stashed.store(state.stash.len(), Ordering::Release);
    }
}

/// Polls one read with a no-op waker: observes readable bytes without ever
/// suspending.
fn poll_read_once<T: tokio::io::AsyncRead>(
    half: &mut ReadHalf<T>,
    buf: &mut [u8],
) -> Poll<io::Result<usize>> {
    let mut read_buf = ReadBuf::new(buf);
    let mut cx = Context::from_waker(Waker::noop());
    match Pin::new(half).poll_read(&mut cx, &mut read_buf) {
        Poll::Ready(Ok(())) => Poll::Ready(Ok(read_buf.filled().len())),
        Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
        Poll::Pending => Poll::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_read_available_returns_written_bytes() {
        let (client, mut server) = MemoryTransport::pair_default();
        let stream = SharedStream::new(client);

        server.write_all(b"response").await.unwrap();

        let bytes = stream.read_available().await.unwrap();
        assert_eq!(&bytes[..], b"response");
    }

    #[tokio::test]
    async fn test_write_reaches_peer() {
        let (client, mut server) = MemoryTransport::pair_default();
        let stream = SharedStream::new(client);

        stream.write(b"request").await.unwrap();

        let mut buffer = vec![0u8; 16];
        let n = tokio::io::AsyncReadExt::read(&mut server, &mut buffer)
            .await
            .unwrap();
        assert_eq!(&buffer[..n], b"request");
    }

    #[tokio::test]
    async fn test_bytes_available_probes_without_blocking() {
        let (client, mut server) = MemoryTransport::pair_default();
        let stream = SharedStream::new(client);

        assert_eq!(stream.bytes_available().await, 0);

        server.write_all(b"abcd").await.unwrap();
        // Give the chunk a chance to land in the channel.
        tokio::task::yield_now().await;

        assert_eq!(stream.bytes_available().await, 4);

        // The probed bytes are served by the next read.
        let bytes = stream.read_available().await.unwrap();
        assert_eq!(&bytes[..], b"abcd");
        assert_eq!(stream.bytes_available().await, 0);
    }

    #[tokio::test]
    async fn test_eof_after_peer_close() {
        let (client, server) = MemoryTransport::pair_default();
        let stream = SharedStream::new(client);

        assert!(!stream.eof().await);
        drop(server);
        assert!(stream.eof().await);

        let bytes = stream.read_available().await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_eof_false_while_bytes_remain() {
        let (client, mut server) = MemoryTransport::pair_default();
        let stream = SharedStream::new(client);

        server.write_all(b"tail").await.unwrap();
        drop(server);

        assert!(!stream.eof().await);
        let bytes = stream.read_available().await.unwrap();
        assert_eq!(&bytes[..], b"tail");
        assert!(stream.eof().await);
    }

    #[tokio::test]
    async fn test_close_marks_not_open_and_fails_writes() {
        let (client, _server) = MemoryTransport::pair_default();
        let stream = SharedStream::new(client);

        assert!(stream.is_open());
        stream.close().await;
        assert!(!stream.is_open());
        assert_eq!(stream.status(), StreamStatus::Closed);

        assert!(matches!(stream.write(b"x").await, Err(PoolError::Closed)));
    }

    #[tokio::test]
    async fn test_purge_drains_residual_bytes() {
        let (client, mut server) = MemoryTransport::pair_default();
        let stream = SharedStream::new(client);

        server.write_all(b"stale bytes").await.unwrap();
        tokio::task::yield_now().await;

        stream.close().await;
        stream.purge().await;

        assert_eq!(stream.bytes_available().await, 0);
        assert!(stream.eof().await);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let (client, mut server) = MemoryTransport::pair_default();
        let stream = SharedStream::new(client);

        assert_eq!(stream.status(), StreamStatus::Open);

        server.write_all(b"x").await.unwrap();
        tokio::task::yield_now().await;
        stream.bytes_available().await;
        assert_eq!(stream.status(), StreamStatus::Active);

        stream.read_available().await.unwrap();
        drop(server);
        assert!(stream.eof().await);
        assert_eq!(stream.status(), StreamStatus::Closing);
    }
}
