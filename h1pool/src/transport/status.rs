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

use std::fmt;

/// Coarse state of a pooled stream, as rendered by
/// [`Pool::show_pool`](crate::Pool::show_pool).
///
/// # Examples
///
/// ```rust
/// use h1pool::transport::StreamStatus;
///
/// assert_eq!(StreamStatus::Open.symbol(), '-');
/// assert_eq!(StreamStatus::Closed.symbol(), 'x');
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// The stream is being established.
    Connecting,
    /// The stream is open and quiet.
    Open,
    /// The stream is open with bytes waiting to be consumed.
    Active,
    /// The stream is open but reading is suspended.
    Paused,
    /// The peer has half-closed; residual bytes may remain.
    Closing,
    /// The stream is fully closed.
    Closed,
    /// The stream state cannot be determined.
    Other,
}

impl StreamStatus {
    /// Returns the one-character symbol used when rendering pool state.
    pub fn symbol(&self) -> char {
        match self {
            StreamStatus::Connecting => '~',
            StreamStatus::Open => '-',
            StreamStatus::Active => '+',
            StreamStatus::Paused => '=',
            StreamStatus::Closing => '/',
            StreamStatus::Closed => 'x',
            StreamStatus::Other => '?',
        }
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_are_distinct() {
        let all = [
            StreamStatus::Connecting,
            StreamStatus::Open,
            StreamStatus::Active,
            StreamStatus::Paused,
            StreamStatus::Closing,
            StreamStatus::Closed,
            StreamStatus::Other,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.symbol(), b.symbol());
            }
        }
    }

    #[test]
    fn test_display_matches_symbol() {
        assert_eq!(format!("{}", StreamStatus::Active), "+");
    }
}
