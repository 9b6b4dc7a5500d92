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

#![doc = include_str!("../../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! # Architecture
//!
//! h1pool is organized into four layers, leaves first:
//!
//! - **[`transport`]**: the stream kinds — plaintext TCP, TLS (behind the
//!   `tls` feature), and in-memory streams for testing. The pool's single
//!   outbound dependency is [`transport::Dial`].
//! - **[`SharedStream`]** (internal to a connection but exposed through
//!   [`Transaction::stream`]): a uniform full-duplex view over a dialed
//!   transport with availability probing and residual draining.
//! - **Connection** (private): the long-lived record behind one stream —
//!   sequence counters, read lock, excess buffer, reusable parser slot.
//! - **[`Pool`] / [`Transaction`]**: the allocator and the per-request
//!   state machine.
//!
//! # Concurrency model
//!
//! Each request occupies one task from `acquire` through `close_read`. The
//! pool vector is guarded by one async mutex; a pool-wide [`Notify`] plays
//! the role of a condition variable, broadcast on every `close_write`,
//! `close_read`, and `close`. Response ordering on a pipelined connection is
//! enforced by each transaction waiting until the connection's `read_count`
//! reaches its own sequence before reading.
//!
//! [`Notify`]: tokio::sync::Notify
//!
//! # Features
//!
//! - **`tls`**: the TLS stream kind ([`transport::TlsTransport`]) via
//!   `tokio-rustls`
//! - **`observability`**: `tracing` instrumentation of dials, retirements,
//!   and state transitions
//!
//! # Safety
//!
//! 100% safe Rust with `#![deny(unsafe_code)]`. All concurrency is handled
//! through Tokio's async runtime.

mod config;
mod connection;
mod error;
mod parser;
mod pool;
mod stream;
mod transaction;
pub mod transport;

pub use config::{AcquireOptions, DialOptions, DEFAULT_DUPLICATE_LIMIT, DEFAULT_PIPELINE_LIMIT};
pub use error::PoolError;
pub use parser::Parser;
pub use pool::Pool;
pub use stream::SharedStream;
pub use transaction::Transaction;
