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

//! Fetch a page over plaintext HTTP/1.1 through the pool, twice, to show
//! connection reuse.
//!
//! Run with:
//! ```bash
//! cargo run --example fetch -- example.com 80
//! ```

use std::time::Duration;

use h1pool::transport::TcpTransport;
use h1pool::{AcquireOptions, DialOptions, Pool};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "example.com".to_string());
    let port = args.next().unwrap_or_else(|| "80".to_string());

    let pool: Pool<TcpTransport> = Pool::new();
    let opts = AcquireOptions::new()
        .with_dial(DialOptions::new().with_connect_timeout(Duration::from_secs(10)));

    for round in 0..2 {
        let mut txn = pool.acquire(&host, &port, opts.clone()).await?;
        println!(
            "--- request {} on connection sequence {} ---",
            round,
            txn.sequence()
        );

        let request = format!(
            "HEAD / HTTP/1.1\r\nhost: {host}\r\nconnection: keep-alive\r\n\r\n"
        );
        txn.write(request.as_bytes()).await?;
        txn.close_write();

        txn.start_read().await;
        let head = txn.read_available().await?;
        let text = String::from_utf8_lossy(&head);

        // Headers end at the blank line; anything past it belongs to the
        // next response on this stream.
        if let Some(end) = text.find("\r\n\r\n") {
            println!("{}", &text[..end]);
            let surplus = head.slice(end + 4..);
            if !surplus.is_empty() {
                txn.unread(surplus);
            }
        } else {
            println!("{text}");
        }
        txn.close_read();
    }

    let mut rendered = String::new();
    pool.show_pool(&mut rendered).await?;
    println!("--- pool ---\n{rendered}");

    pool.close_all().await;
    Ok(())
}
