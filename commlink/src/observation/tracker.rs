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

//! The table of active observations.

use super::events::{
    EventDispatcher, ObservationCancelHandler, RemoteSocketChangeHandler, Token,
    TokenReleaseHandler,
};
use super::status::{is_received_status_newer, ResourceStatusAge};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

type Key = (SocketAddr, Token);

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Latest accepted status per (remote address, token).
///
/// Lookups share a read lock. A notification check holds an upgradable read
/// and upgrades only when it accepts, so the update is never observed half
/// done and concurrent readers are not blocked by rejected notifications.
///
/// # Examples
///
/// ```rust
/// use commlink::observation::{ObservationTracker, Token};
///
/// let tracker = ObservationTracker::new();
/// let remote = "192.0.2.1:5683".parse().unwrap();
/// let token = Token::new(vec![1, 2]);
/// tracker.start_observation(remote, token.clone());
///
/// assert!(tracker.handle_notification(remote, &token, 5, 1_000));
/// // An older sequence number shortly after is stale.
/// assert!(!tracker.handle_notification(remote, &token, 4, 1_100));
/// ```
#[derive(Default)]
pub struct ObservationTracker {
    observations: RwLock<HashMap<Key, Option<ResourceStatusAge>>>,
}

impl ObservationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking. Returns false if the observation already existed.
    pub fn start_observation(&self, remote: SocketAddr, token: Token) -> bool {
        let mut observations = self.observations.write();
        if observations.contains_key(&(remote, token.clone())) {
            return false;
        }
        debug!(%remote, %token, "observation started");
        observations.insert((remote, token), None);
        true
    }

    /// Stops tracking. Returns false if nothing was tracked.
    pub fn stop_observation(&self, remote: SocketAddr, token: &Token) -> bool {
        let removed = self
            .observations
            .write()
            .remove(&(remote, token.clone()))
            .is_some();
        if removed {
            debug!(%remote, %token, "observation stopped");
        }
        removed
    }

    /// Returns true while `(remote, token)` is tracked.
    pub fn is_observing(&self, remote: SocketAddr, token: &Token) -> bool {
        self.observations
            .read()
            .contains_key(&(remote, token.clone()))
    }

    /// Number of tracked observations.
    pub fn len(&self) -> usize {
        self.observations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The latest accepted status, if any notification was accepted yet.
    pub fn latest(&self, remote: SocketAddr, token: &Token) -> Option<ResourceStatusAge> {
        self.observations
            .read()
            .get(&(remote, token.clone()))
            .copied()
            .flatten()
    }

    /// Decides whether a notification is fresh, and records it if so.
    ///
    /// Notifications for unknown observations and stale notifications are
    /// logged and rejected.
    pub fn handle_notification(
        &self,
        remote: SocketAddr,
        token: &Token,
        sequence: u32,
        now: u64,
    ) -> bool {
        let received = ResourceStatusAge::new(sequence, now);
        let key = (remote, token.clone());
        let observations = self.observations.upgradable_read();
        let latest = match observations.get(&key) {
            Some(latest) => *latest,
            None => {
                warn!(%remote, %token, sequence, "notification for unknown observation");
                return false;
            }
        };
        if let Some(latest) = latest {
            if !is_received_status_newer(&latest, &received) {
                debug!(
                    %remote,
                    %token,
                    sequence,
                    latest = latest.sequence(),
                    "discarding out-of-order notification"
                );
                return false;
            }
        }
        let mut observations = RwLockUpgradableReadGuard::upgrade(observations);
        observations.insert(key, Some(received));
        true
    }

    /// Registers this tracker for every event kind it reacts to.
    pub fn register(self: &Arc<Self>, dispatcher: &mut EventDispatcher) {
        dispatcher
            .on_token_released(self.clone())
            .on_remote_socket_changed(self.clone())
            .on_observation_cancelled(self.clone());
    }
}

impl TokenReleaseHandler for ObservationTracker {
    fn on_token_released(&self, remote: SocketAddr, token: &Token) {
        self.stop_observation(remote, token);
    }
}

impl ObservationCancelHandler for ObservationTracker {
    fn on_observation_cancelled(&self, remote: SocketAddr, token: &Token) {
        self.stop_observation(remote, token);
    }
}

impl RemoteSocketChangeHandler for ObservationTracker {
    fn on_remote_socket_changed(&self, previous: SocketAddr, current: SocketAddr) {
        let mut observations = self.observations.write();
        let moved: Vec<Key> = observations
            .keys()
            .filter(|(remote, _)| *remote == previous)
            .cloned()
            .collect();
        for key in moved {
            if let Some(status) = observations.remove(&key) {
                observations.insert((current, key.1), status);
            }
        }
        debug!(%previous, %current, "observations moved to new remote address");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{ObservationEvent, STALENESS_WINDOW_MS};

    fn remote() -> SocketAddr {
        "192.0.2.1:5683".parse().unwrap()
    }

    #[test]
    fn test_unknown_observation_rejected() {
        let tracker = ObservationTracker::new();
        assert!(!tracker.handle_notification(remote(), &Token::new(vec![1]), 1, 0));
    }

    #[test]
    fn test_first_then_ordered_notifications() {
        let tracker = ObservationTracker::new();
        let token = Token::new(vec![1]);
        assert!(tracker.start_observation(remote(), token.clone()));
        assert!(!tracker.start_observation(remote(), token.clone()));

        assert!(tracker.handle_notification(remote(), &token, 40, 1_000));
        assert!(tracker.handle_notification(remote(), &token, 41, 1_010));
        assert!(!tracker.handle_notification(remote(), &token, 41, 1_020));
        assert!(!tracker.handle_notification(remote(), &token, 39, 1_030));
        assert_eq!(tracker.latest(remote(), &token).map(|s| s.sequence()), Some(41));

        let late = 1_010 + STALENESS_WINDOW_MS + 1;
        assert!(tracker.handle_notification(remote(), &token, 2, late));
    }

    #[test]
    fn test_events_update_table() {
        let tracker = Arc::new(ObservationTracker::new());
        let mut dispatcher = EventDispatcher::new();
        tracker.register(&mut dispatcher);

        let (a, b) = (Token::new(vec![1]), Token::new(vec![2]));
        tracker.start_observation(remote(), a.clone());
        tracker.start_observation(remote(), b.clone());
        tracker.handle_notification(remote(), &b, 7, 0);

        let current: SocketAddr = "192.0.2.1:6000".parse().unwrap();
        dispatcher.dispatch(&ObservationEvent::RemoteSocketChanged {
            previous: remote(),
            current,
        });
        assert!(!tracker.is_observing(remote(), &a));
        assert!(tracker.is_observing(current, &a));
        assert_eq!(tracker.latest(current, &b).map(|s| s.sequence()), Some(7));

        dispatcher.dispatch(&ObservationEvent::TokenReleased {
            remote: current,
            token: a.clone(),
        });
        dispatcher.dispatch(&ObservationEvent::ObservationCancelled {
            remote: current,
            token: b.clone(),
        });
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_concurrent_notifications_converge() {
        let tracker = Arc::new(ObservationTracker::new());
        let token = Token::new(vec![9]);
        tracker.start_observation(remote(), token.clone());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                let token = token.clone();
                std::thread::spawn(move || {
                    (1..=100)
                        .filter(|seq| tracker.handle_notification(remote(), &token, *seq, 0))
                        .count()
                })
            })
            .collect();
        let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert!(accepted > 0);
        assert_eq!(tracker.latest(remote(), &token).map(|s| s.sequence()), Some(100));
    }
}
