//! Logout coordination between the bridge and the external provider.
//!
//! A bridge-initiated logout sets a per-session flag. The provider then echoes
//! the logout back to `/logout/sso`; consuming the flag there tells the echo
//! apart from a genuine provider-initiated logout. Set and consume are single
//! map operations, so each flag is observed by exactly one consumer. Flags whose
//! echo never arrives are swept whenever a new flag is set.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use idp_bridge_sdk::SessionId;

/// Per-session "external logout in flight" flags
#[derive(Debug)]
pub struct LogoutCoordinator {
    in_flight: DashMap<SessionId, Instant>,
    echo_ttl: Duration,
}

impl LogoutCoordinator {
    #[must_use]
    pub fn new(echo_ttl: Duration) -> Self {
        Self {
            in_flight: DashMap::new(),
            echo_ttl,
        }
    }

    /// Record that the bridge started an external logout for `session`.
    ///
    /// Stale flags of other sessions are dropped first.
    pub fn mark_initiated(&self, session: &SessionId) {
        let purged = self.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "Dropped stale external logout flags");
        }
        self.in_flight.insert(session.clone(), Instant::now());
        tracing::debug!(session = %session, "External logout flag set");
    }

    /// Check-and-clear the flag for `session`.
    ///
    /// Returns `true` exactly once per [`mark_initiated`](Self::mark_initiated),
    /// and only while the flag is younger than the echo TTL.
    pub fn consume(&self, session: &SessionId) -> bool {
        match self.in_flight.remove(session) {
            Some((_, set_at)) if set_at.elapsed() <= self.echo_ttl => {
                tracing::debug!(session = %session, "External logout flag consumed");
                true
            }
            Some(_) => {
                tracing::warn!(session = %session, "Discarding stale external logout flag");
                false
            }
            None => false,
        }
    }

    /// Whether a flag is currently set for `session` (expired or not).
    #[must_use]
    pub fn is_pending(&self, session: &SessionId) -> bool {
        self.in_flight.contains_key(session)
    }

    /// Drop flags older than the echo TTL. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.in_flight.len();
        self.in_flight
            .retain(|_, set_at| set_at.elapsed() <= self.echo_ttl);
        before.saturating_sub(self.in_flight.len())
    }
}
