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

//! Freshness of observed resource states.
//!
//! Notifications carry a 24-bit sequence number that wraps around, plus the
//! local time they arrived. A notification supersedes the latest one when
//! its sequence number is ahead within half the sequence space, or, failing
//! that, when it arrived long enough after the latest one that the
//! sequence numbers can no longer be trusted.

/// Size of the sequence number space.
pub const SEQUENCE_MODULUS: u32 = 1 << 24;

/// Half the sequence space. Gaps at least this wide are read as wraparound.
pub const SEQUENCE_HALF: u32 = 1 << 23;

/// Milliseconds after which a notification wins regardless of sequence.
pub const STALENESS_WINDOW_MS: u64 = 128_000;

/// Sequence number and arrival time of one observed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceStatusAge {
    sequence: u32,
    timestamp: u64,
}

impl ResourceStatusAge {
    /// `sequence` is reduced into the 24-bit space; `timestamp` is in
    /// milliseconds.
    pub const fn new(sequence: u32, timestamp: u64) -> Self {
        Self {
            sequence: sequence & (SEQUENCE_MODULUS - 1),
            timestamp,
        }
    }

    /// The 24-bit sequence number.
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Arrival time in milliseconds.
    pub const fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

/// Returns true when `received` supersedes `latest`.
///
/// # Examples
///
/// ```rust
/// use commlink::observation::{is_received_status_newer, ResourceStatusAge};
///
/// let latest = ResourceStatusAge::new(10, 1_000);
/// assert!(is_received_status_newer(&latest, &ResourceStatusAge::new(11, 1_000)));
/// assert!(!is_received_status_newer(&latest, &ResourceStatusAge::new(9, 1_000)));
/// // Long silence makes any sequence number acceptable.
/// assert!(is_received_status_newer(&latest, &ResourceStatusAge::new(9, 130_001)));
/// ```
pub fn is_received_status_newer(latest: &ResourceStatusAge, received: &ResourceStatusAge) -> bool {
    let (old, new) = (latest.sequence, received.sequence);
    if old < new && new - old < SEQUENCE_HALF {
        return true;
    }
    if old > new && old - new > SEQUENCE_HALF {
        return true;
    }
    received.timestamp > latest.timestamp.saturating_add(STALENESS_WINDOW_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn age(sequence: u32, timestamp: u64) -> ResourceStatusAge {
        ResourceStatusAge::new(sequence, timestamp)
    }

    #[test]
    fn test_next_sequence_is_newer() {
        assert!(is_received_status_newer(&age(5, 100), &age(6, 100)));
        assert!(is_received_status_newer(&age(0, 0), &age(SEQUENCE_HALF - 1, 0)));
    }

    #[test]
    fn test_identical_status_is_not_newer() {
        assert!(!is_received_status_newer(&age(5, 100), &age(5, 100)));
    }

    #[test]
    fn test_older_sequence_is_rejected() {
        assert!(!is_received_status_newer(&age(6, 100), &age(5, 100)));
        // A forward gap of exactly half the space is not newer.
        assert!(!is_received_status_newer(&age(0, 0), &age(SEQUENCE_HALF, 0)));
    }

    #[test]
    fn test_wraparound_is_newer() {
        let latest = age(SEQUENCE_MODULUS - 2, 100);
        assert!(is_received_status_newer(&latest, &age(3, 100)));
        // Backward gap of exactly half the space is not wraparound.
        assert!(!is_received_status_newer(&age(SEQUENCE_HALF, 0), &age(0, 0)));
    }

    #[test]
    fn test_staleness_fallback() {
        let latest = age(100, 1_000);
        assert!(!is_received_status_newer(&latest, &age(50, 1_000 + STALENESS_WINDOW_MS)));
        assert!(is_received_status_newer(&latest, &age(50, 1_001 + STALENESS_WINDOW_MS)));
        assert!(is_received_status_newer(&age(7, u64::MAX - 1), &age(8, 0)));
        assert!(!is_received_status_newer(&age(7, u64::MAX - 1), &age(7, u64::MAX)));
    }

    #[test]
    fn test_sequence_is_reduced() {
        assert_eq!(age(SEQUENCE_MODULUS + 4, 0).sequence(), 4);
    }
}
