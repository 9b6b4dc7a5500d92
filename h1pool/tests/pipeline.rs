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

//! Pipelining behavior: connection reuse, response ordering, and excess-byte
//! hand-off between pipelined transactions.

use std::time::Duration;

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
async fn single_request_then_reuse() {
    spawn_counting_server(MemoryListener::bind("reuse.test", "80"));
    let pool: Pool<MemoryTransport> = Pool::new();

    let mut t1 = pool
        .acquire("reuse.test", "80", AcquireOptions::new())
        .await
        .unwrap();
    assert_eq!(t1.sequence(), 0);

    t1.write(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
    t1.close_write();
    t1.start_read().await;
    let body = t1.read_available().await.unwrap();
    assert_eq!(&body[..], b"RESP0");
    t1.close_read();

    // The follow-up acquire must land on the same connection with the next
    // sequence number.
    let t2 = pool
        .acquire("reuse.test", "80", AcquireOptions::new())
        .await
        .unwrap();
    assert_eq!(t2.sequence(), 1);
    assert_eq!(pool.connection_count().await, 1);
}

#[tokio::test]
async fn pipelined_reads_are_served_in_write_order() {
    spawn_counting_server(MemoryListener::bind("order.test", "80"));
    let pool: Pool<MemoryTransport> = Pool::new();

    let mut t1 = pool
        .acquire("order.test", "80", AcquireOptions::new())
        .await
        .unwrap();
    t1.write(b"req one").await.unwrap();
    t1.close_write();

    let mut t2 = pool
        .acquire("order.test", "80", AcquireOptions::new())
        .await
        .unwrap();
    assert_eq!(t2.sequence(), 1);
    t2.write(b"req two").await.unwrap();
    t2.close_write();

    // Both requests ride the same connection.
    assert_eq!(pool.connection_count().await, 1);

    // Task B tries to read the second response first. It must block until
    // the first response has been fully read.
    let reader_b = tokio::spawn(async move {
        t2.start_read().await;
        let body = t2.read_available().await.unwrap();
        t2.close_read();
        body
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(
        !reader_b.is_finished(),
        "second reader ran before the first response was read"
    );

    t1.start_read().await;
    let first = t1.read_available().await.unwrap();
    t1.close_read();

    let second = reader_b.await.unwrap();
    assert_eq!(&first[..], b"RESP0");
    assert_eq!(&second[..], b"RESP1");
}

#[tokio::test]
async fn pipeline_window_counts_written_but_unread_requests() {
    spawn_counting_server(MemoryListener::bind("window.test", "80"));
    let pool: Pool<MemoryTransport> = Pool::new();
    let opts = AcquireOptions::new()
        .with_pipeline_limit(2)
        .with_duplicate_limit(1);

    // The window admits pipeline_limit + 1 in-flight requests.
    let mut txns = Vec::new();
    for expected_sequence in 0..3u64 {
        let mut txn = pool
            .acquire("window.test", "80", opts.clone())
            .await
            .unwrap();
        assert_eq!(txn.sequence(), expected_sequence);
        txn.write(b"req").await.unwrap();
        txn.close_write();
        txns.push(txn);
    }
    assert_eq!(pool.connection_count().await, 1);

    // A fourth acquire exceeds the window and must wait.
    let blocked = {
        let pool = pool.clone();
        let opts = opts.clone();
        tokio::spawn(async move { pool.acquire("window.test", "80", opts).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!blocked.is_finished(), "acquire ignored the pipeline window");

    // Draining one response reopens the window.
    let mut t1 = txns.remove(0);
    t1.start_read().await;
    let body = t1.read_available().await.unwrap();
    assert_eq!(&body[..], b"RESP0");
    t1.close_read();

    let t4 = blocked.await.unwrap().unwrap();
    assert_eq!(t4.sequence(), 3);

    for mut txn in txns {
        txn.start_read().await;
        txn.read_available().await.unwrap();
        txn.close_read();
    }
}

#[tokio::test]
async fn excess_bytes_flow_to_the_next_transaction() {
    // Scripted server: both responses arrive coalesced in one chunk, so the
    // first reader necessarily over-reads into the second response.
    let mut listener = MemoryListener::bind("excess.test", "80");
    tokio::spawn(async move {
        let mut stream = listener.accept().await.unwrap();
        let mut buffer = vec![0u8; 4096];
        // Two request chunks, one coalesced reply.
        stream.read(&mut buffer).await.unwrap();
        stream.read(&mut buffer).await.unwrap();
        stream.write_all(b"FIRST-BODY|SECOND").await.unwrap();
    });

    let pool: Pool<MemoryTransport> = Pool::new();

    let mut t1 = pool
        .acquire("excess.test", "80", AcquireOptions::new())
        .await
        .unwrap();
    t1.write(b"req one").await.unwrap();
    t1.close_write();

    let mut t2 = pool
        .acquire("excess.test", "80", AcquireOptions::new())
        .await
        .unwrap();
    t2.write(b"req two").await.unwrap();
    t2.close_write();

    t1.start_read().await;
    let chunk = t1.read_available().await.unwrap();
    assert_eq!(&chunk[..], b"FIRST-BODY|SECOND");

    // The parser above recognizes its message ends at '|' and pushes the
    // surplus back.
    let surplus = chunk.slice(11..);
    t1.unread(surplus);
    t1.close_read();

    t2.start_read().await;
    let chunk = t2.read_available().await.unwrap();
    assert_eq!(&chunk[..], b"SECOND");
    t2.close_read();
}

#[tokio::test]
async fn unread_then_read_round_trips_exactly() {
    spawn_counting_server(MemoryListener::bind("roundtrip.test", "80"));
    let pool: Pool<MemoryTransport> = Pool::new();

    let mut txn = pool
        .acquire("roundtrip.test", "80", AcquireOptions::new())
        .await
        .unwrap();
    txn.write(b"req").await.unwrap();
    txn.close_write();

    txn.start_read().await;
    let original = txn.read_available().await.unwrap();

    txn.unread(original.clone());
    assert_eq!(txn.bytes_available().await, original.len());

    let replayed = txn.read_available().await.unwrap();
    assert_eq!(replayed, original);
    txn.close_read();
}

#[tokio::test]
async fn counters_never_exceed_the_window() {
    spawn_counting_server(MemoryListener::bind("invariant.test", "80"));
    let pool: Pool<MemoryTransport> = Pool::new();
    let opts = AcquireOptions::new()
        .with_pipeline_limit(3)
        .with_duplicate_limit(1);

    let mut txns = Vec::new();
    for _ in 0..4 {
        let mut txn = pool
            .acquire("invariant.test", "80", opts.clone())
            .await
            .unwrap();
        txn.write(b"req").await.unwrap();
        txn.close_write();
        txns.push(txn);
    }

    for mut txn in txns {
        txn.start_read().await;
        txn.read_available().await.unwrap();
        txn.close_read();

        // 0 <= read_count <= write_count <= read_count + pipeline + 1 holds
        // at every observable point; the transaction API only exposes the
        // derived view, so check via a rendered pool line.
        let mut rendered = String::new();
        pool.show_pool(&mut rendered).await.unwrap();
        assert!(rendered.contains("w4"), "unexpected counters: {rendered}");
    }
}
