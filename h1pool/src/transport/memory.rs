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

//! In-memory transport for testing and in-process communication.
//!
//! `MemoryTransport` uses Tokio channels instead of sockets, so pool
//! behavior — reuse, pipelining, eviction, blocking — can be exercised
//! deterministically without network I/O. A process-global registry of
//! [`MemoryListener`]s makes the kind dialable: binding a listener under a
//! `host:port` name lets [`Pool::acquire`](crate::Pool::acquire) grow
//! connections to it exactly as it would over TCP.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::{LazyLock, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;

use crate::config::DialOptions;
use crate::error::PoolError;
use crate::transport::{Dial, Transport, TransportMetadata};

/// Default buffer size (in chunks) for memory transport channels.
const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Registry of bound listeners, keyed by `host:port`.
static REGISTRY: LazyLock<Mutex<HashMap<String, mpsc::UnboundedSender<MemoryTransport>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// In-memory transport.
///
/// Data written to one half of a pair can be read from the other. When the
/// remote half is dropped, reads observe EOF and writes fail with
/// `BrokenPipe` — the same shape a closed socket presents.
///
/// # Examples
///
/// ```rust
/// use h1pool::transport::MemoryTransport;
/// use tokio::io::{AsyncReadExt, AsyncWriteExt};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (mut client, mut server) = MemoryTransport::pair(1024);
///
/// client.write_all(b"Hello").await?;
///
/// let mut buffer = vec![0u8; 5];
/// server.read_exact(&mut buffer).await?;
/// assert_eq!(&buffer, b"Hello");
/// # Ok(())
/// # }
/// ```
pub struct MemoryTransport {
    metadata: TransportMetadata,
    reader: MemoryReader,
    writer: MemoryWriter,
}

/// Reader half of a memory transport.
struct MemoryReader {
    rx: mpsc::Receiver<Vec<u8>>,
    current_chunk: Option<Vec<u8>>,
    chunk_offset: usize,
}

/// Writer half of a memory transport.
///
/// The sender is dropped on shutdown so the peer observes EOF, mirroring a
/// socket's half-close.
struct MemoryWriter {
    tx: Option<mpsc::Sender<Vec<u8>>>,
}

impl MemoryTransport {
    /// Creates a pair of connected memory transports.
    ///
    /// `buffer_size` is the chunk capacity of each direction's channel; a
    /// full channel makes writes wait, which is useful for backpressure
    /// testing.
    pub fn pair(buffer_size: usize) -> (Self, Self) {
        let (tx1, rx1) = mpsc::channel(buffer_size);
        let (tx2, rx2) = mpsc::channel(buffer_size);

        let transport1 = Self {
            metadata: TransportMetadata::new("memory"),
            reader: MemoryReader {
                rx: rx2,
                current_chunk: None,
                chunk_offset: 0,
            },
            writer: MemoryWriter { tx: Some(tx1) },
        };

        let transport2 = Self {
            metadata: TransportMetadata::new("memory"),
            reader: MemoryReader {
                rx: rx1,
                current_chunk: None,
                chunk_offset: 0,
            },
            writer: MemoryWriter { tx: Some(tx2) },
        };

        (transport1, transport2)
    }

    /// Creates a pair with the default buffer size.
    pub fn pair_default() -> (Self, Self) {
        Self::pair(DEFAULT_BUFFER_SIZE)
    }
}

/// Accepts in-memory connections dialed against a `host:port` name.
///
/// Binding registers the name in a process-global table; dropping the
/// listener unbinds it. Dials against an unbound name fail with
/// `ConnectionRefused`.
///
/// # Examples
///
/// ```rust
/// use h1pool::transport::{Dial, MemoryListener, MemoryTransport};
/// use h1pool::DialOptions;
///
/// # async fn example() -> Result<(), h1pool::PoolError> {
/// let mut listener = MemoryListener::bind("svc.test", "80");
///
/// let dialed = MemoryTransport::dial("svc.test", "80", &DialOptions::new()).await?;
/// let accepted = listener.accept().await.unwrap();
/// # Ok(())
/// # }
/// ```
pub struct MemoryListener {
    name: String,
    tx: mpsc::UnboundedSender<MemoryTransport>,
    rx: mpsc::UnboundedReceiver<MemoryTransport>,
}

impl MemoryListener {
    /// Binds a listener under `host:port`, replacing any previous binding
    /// with the same name.
    pub fn bind(host: &str, port: &str) -> Self {
        let name = format!("{host}:{port}");
        let (tx, rx) = mpsc::unbounded_channel();
        REGISTRY
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.clone(), tx.clone());
        Self { name, tx, rx }
    }

    /// Accepts the next dialed connection.
    ///
    /// Returns `None` once the listener has been unbound and all pending
    /// dials have been drained.
    pub async fn accept(&mut self) -> Option<MemoryTransport> {
        self.rx.recv().await
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        let mut registry = REGISTRY
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Another listener may have re-bound the name in the meantime; only
        // remove our own entry.
        if registry
            .get(&self.name)
            .is_some_and(|tx| tx.same_channel(&self.tx))
        {
            registry.remove(&self.name);
        }
    }
}

#[async_trait::async_trait]
impl Dial for MemoryTransport {
    async fn dial(host: &str, port: &str, _opts: &DialOptions) -> Result<Self, PoolError> {
        let name = format!("{host}:{port}");
        let tx = REGISTRY
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&name)
            .cloned();

        let tx = tx.ok_or_else(|| PoolError::Dial {
            address: name.clone(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "no memory listener bound"),
        })?;

        let (client, server) = Self::pair_default();
        tx.send(server).map_err(|_| PoolError::Dial {
            address: name,
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "memory listener gone"),
        })?;

        Ok(client)
    }
}

impl Transport for MemoryTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }
}

impl AsyncRead for MemoryTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        // Serve out of the current chunk first.
        if let Some(chunk) = self.reader.current_chunk.take() {
            let remaining = chunk.len() - self.reader.chunk_offset;
            let to_read = remaining.min(buf.remaining());

            if to_read > 0 {
                let start = self.reader.chunk_offset;
                buf.put_slice(&chunk[start..start + to_read]);
                self.reader.chunk_offset = start + to_read;

                if self.reader.chunk_offset < chunk.len() {
                    self.reader.current_chunk = Some(chunk);
                } else {
                    self.reader.chunk_offset = 0;
                }
                return Poll::Ready(Ok(()));
            }
        }

        match self.reader.rx.poll_recv(cx) {
            Poll::Ready(Some(chunk)) => {
                let to_read = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk[..to_read]);

                if to_read < chunk.len() {
                    self.reader.current_chunk = Some(chunk);
                    self.reader.chunk_offset = to_read;
                }

                Poll::Ready(Ok(()))
            }
            // Channel closed: EOF.
            Poll::Ready(None) => Poll::Ready(Ok(())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl AsyncWrite for MemoryTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let Some(tx) = &this.writer.tx else {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "memory transport shut down",
            )));
        };
        match tx.try_send(buf.to_vec()) {
            Ok(()) => Poll::Ready(Ok(buf.len())),
            Err(mpsc::error::TrySendError::Full(_)) => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "memory transport closed",
            ))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // Dropping the sender closes the channel; the peer reads EOF.
        self.get_mut().writer.tx = None;
        Poll::Ready(Ok(()))
    }
}
