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

//! Teardown paths: forced close mid-read, pool-wide close, and the fate of
//! transactions left on closed connections.

use h1pool::transport::{MemoryListener, MemoryTransport};
use h1pool::{AcquireOptions, Pool};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Replies `RESP<n>` to the n-th request chunk on each accepted connection.
fn spawn_counting_server(mut listener: MemoryListener) {
    tokio::spawn(async move {
        while let Some(mut stream) = listener.accept().await {
            tokio::spawn(async move {
                let mut n: u64 = 0;
                let mut buffer = vec![0u8; 4096];
                loop {
                    match stream.read(&mut buffer).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {
                            let response = format!("RESP{n}");
                            if stream.write_all(response.as_bytes()).await.is_err() {
                                break;
                            }
                            n += 1;
                        }
                    }
                }
            });
        }
    });
}

#[tokio::test]
async fn forced_close_mid_read_drains_and_releases() {
    let mut listener = MemoryListener::bind("force.test", "80");
    tokio::spawn(async move {
        // First connection: a response the client abandons halfway through.
        let mut first = listener.accept().await.unwrap();
        tokio::spawn(async move {
            let mut buffer = vec![0u8; 4096];
            first.read(&mut buffer).await.unwrap();
            first.write_all(b"HTTP/1.1 200 OK\r\n").await.unwrap();
            first
                .write_all(b"trailing bytes the client never wants")
                .await
                .unwrap();
            // Hold the stream open; the client closes first.
            let _ = first.read(&mut buffer).await;
        });
        // Keep accepting so the replacement dial succeeds.
        let mut held = Vec::new();
        while let Some(stream) = listener.accept().await {
            held.push(stream);
        }
    });

    let pool: Pool<MemoryTransport> = Pool::new();

    let mut txn = pool
        .acquire("force.test", "80", AcquireOptions::new())
        .await
        .unwrap();
    txn.write(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
    txn.close_write();

    txn.start_read().await;
    let head = txn.read_available().await.unwrap();
    assert!(!head.is_empty());

    // Abandon the rest of the response.
    txn.close().await;

    assert!(!txn.is_open());
    assert_eq!(txn.bytes_available().await, 0, "close must drain residue");
    assert!(txn.eof().await);

    // The connection is quiescent and closed; the allocator sweeps it on
    // the next pass and dials fresh.
    let replacement = pool
        .acquire("force.test", "80", AcquireOptions::new())
        .await
        .unwrap();
    assert!(replacement.is_open());
    assert_eq!(replacement.sequence(), 0);
    assert_eq!(pool.connection_count().await, 1);
}

#[tokio::test]
async fn forced_close_while_still_writing_synthesizes_both_halves() {
    spawn_counting_server(MemoryListener::bind("force-write.test", "80"));
    let pool: Pool<MemoryTransport> = Pool::new();

    let mut txn = pool
        .acquire("force-write.test", "80", AcquireOptions::new())
        .await
        .unwrap();
    assert!(txn.is_writable());

    txn.close().await;
    assert!(!txn.is_open());
    assert!(!txn.is_writable());

    // Both halves completed: the connection owes nothing and the purge
    // sweep removes it.
    pool.purge().await;
    assert!(pool.is_empty().await);
}

#[tokio::test]
async fn close_all_closes_streams_and_empties_pool() {
    spawn_counting_server(MemoryListener::bind("closeall.test", "80"));
    spawn_counting_server(MemoryListener::bind("closeall.test", "81"));
    let pool: Pool<MemoryTransport> = Pool::new();

    let mut handles = Vec::new();
    for port in ["80", "81"] {
        let mut txn = pool
            .acquire("closeall.test", port, AcquireOptions::new())
            .await
            .unwrap();
        txn.write(b"req").await.unwrap();
        txn.close_write();
        txn.start_read().await;
        txn.read_available().await.unwrap();
        txn.close_read();
        handles.push(txn);
    }
    assert_eq!(pool.connection_count().await, 2);

    pool.close_all().await;

    assert!(pool.is_empty().await);
    for txn in &handles {
        assert!(!txn.is_open(), "close_all left a stream open");
    }

    // Idempotent: a second close_all is a no-op.
    pool.close_all().await;
    assert!(pool.is_empty().await);
}

#[tokio::test]
async fn pending_transaction_on_closed_connection_observes_eof() {
    spawn_counting_server(MemoryListener::bind("pending.test", "80"));
    let pool: Pool<MemoryTransport> = Pool::new();

    let mut txn = pool
        .acquire("pending.test", "80", AcquireOptions::new())
        .await
        .unwrap();
    txn.write(b"req").await.unwrap();
    txn.close_write();

    // The pool shuts down underneath the pending transaction.
    pool.close_all().await;
    assert!(!txn.is_open());

    // Its read turn still arrives; the response is simply gone.
    txn.start_read().await;
    assert!(txn.eof().await);
    let chunk = txn.read_available().await.unwrap();
    assert!(chunk.is_empty());
    txn.close_read();
}

#[tokio::test]
async fn write_on_closed_connection_errors() {
    spawn_counting_server(MemoryListener::bind("deadwrite.test", "80"));
    let pool: Pool<MemoryTransport> = Pool::new();

    let mut txn = pool
        .acquire("deadwrite.test", "80", AcquireOptions::new())
        .await
        .unwrap();

    pool.close_all().await;

    let error = txn.write(b"too late").await.unwrap_err();
    assert!(error.should_close_connection());
}
