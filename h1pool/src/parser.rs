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

//! Reusable parse scratch.
//!
//! The pool does not parse HTTP itself; it holds one [`Parser`] per
//! connection so the response parser layered above can reuse its
//! accumulation buffer across transactions instead of reallocating per
//! request. The pool treats the parser as opaque state: it hands out access
//! through [`Transaction::parser`](crate::Transaction::parser) and nothing
//! more.

use bytes::{Bytes, BytesMut};

/// Per-connection parse scratch, reused across transactions.
///
/// # Examples
///
/// ```rust
/// use h1pool::Parser;
///
/// let mut parser = Parser::new();
/// parser.extend(b"HTTP/1.1 200 OK\r\n");
/// assert!(!parser.is_empty());
///
/// let head = parser.take();
/// assert!(parser.is_empty());
/// assert_eq!(&head[..8], b"HTTP/1.1");
/// ```
#[derive(Debug, Default)]
pub struct Parser {
    scratch: BytesMut,
}

impl Parser {
    /// Creates an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes to the accumulation buffer.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.scratch.extend_from_slice(bytes);
    }

    /// Takes the accumulated bytes, leaving the buffer empty but keeping
    /// its allocation for the next transaction.
    pub fn take(&mut self) -> Bytes {
        self.scratch.split().freeze()
    }

    /// Returns the accumulated bytes without consuming them.
    pub fn buffered(&self) -> &[u8] {
        &self.scratch
    }

    /// Number of accumulated bytes.
    pub fn len(&self) -> usize {
        self.scratch.len()
    }

    /// Returns `true` if nothing is accumulated.
    pub fn is_empty(&self) -> bool {
        self.scratch.is_empty()
    }

    /// Discards accumulated bytes, keeping the allocation.
    pub fn reset(&mut self) {
        self.scratch.clear();
    }
}
