//! Per-club fan-out of projection-derived notifications.
//!
//! The [ClubChannels] registry maps each club to the set of WebSocket
//! connections subscribed to it. Delivery goes through per-connection
//! channels: the registry never blocks on socket I/O, and a connection
//! whose channel is gone is pruned on the next send.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::ClubId;

/// A JSON message pushed to the clients of a club after the read model has
/// been updated.
///
/// Serialized as `{"type": "<snake_case name>"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    ClubPlayerListUpdated,
    ClubCollectiveListUpdated,
    ClubTrainingSessionListUpdated,
    ClubTrainingSessionUpdated,
}

/// Identifier assigned to a registered connection.
pub type ConnectionId = u64;

/// The sending half handed over by the transport layer on registration.
/// Serialized notification payloads are pushed through it.
pub type ConnectionSender = mpsc::UnboundedSender<String>;

#[derive(Debug, Default)]
struct Registry {
    next_connection_id: ConnectionId,
    senders: HashMap<ConnectionId, ConnectionSender>,
    by_club: HashMap<ClubId, HashSet<ConnectionId>>,
    club_by_connection: HashMap<ConnectionId, ClubId>,
}

/// The per-club connection registry.
///
/// All mutations are serialized by an internal lock; [ClubChannels::send]
/// snapshots the target connections under the lock and delivers outside it.
#[derive(Debug, Clone, Default)]
pub struct ClubChannels {
    registry: Arc<RwLock<Registry>>,
}

impl ClubChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection for the given club, returning its id.
    pub fn register(&self, club_id: ClubId, sender: ConnectionSender) -> ConnectionId {
        let mut registry = self
            .registry
            .write()
            .expect("acquire write lock on channel registry");

        let connection_id = registry.next_connection_id;
        registry.next_connection_id += 1;

        registry.senders.insert(connection_id, sender);
        registry
            .by_club
            .entry(club_id.clone())
            .or_default()
            .insert(connection_id);
        registry.club_by_connection.insert(connection_id, club_id);

        connection_id
    }

    /// Removes a connection from the registry. Unknown ids are ignored.
    pub fn unregister(&self, connection_id: ConnectionId) {
        let mut registry = self
            .registry
            .write()
            .expect("acquire write lock on channel registry");

        registry.senders.remove(&connection_id);

        if let Some(club_id) = registry.club_by_connection.remove(&connection_id) {
            if let Some(connections) = registry.by_club.get_mut(&club_id) {
                connections.remove(&connection_id);

                if connections.is_empty() {
                    registry.by_club.remove(&club_id);
                }
            }
        }
    }

    /// Sends the notification to every connection of the given club.
    ///
    /// The message is serialized once; connections whose channel has been
    /// closed are unregistered after the send. Delivery is best-effort.
    pub fn send(&self, club_id: &str, notification: &Notification) {
        let targets: Vec<(ConnectionId, ConnectionSender)> = {
            let registry = self
                .registry
                .read()
                .expect("acquire read lock on channel registry");

            match registry.by_club.get(club_id) {
                None => return,
                Some(connections) => connections
                    .iter()
                    .filter_map(|id| {
                        registry.senders.get(id).map(|sender| (*id, sender.clone()))
                    })
                    .collect(),
            }
        };

        let payload = serde_json::to_string(notification)
            .expect("notification serialization should not fail");

        let mut closed = Vec::new();

        for (connection_id, sender) in targets {
            if sender.send(payload.clone()).is_err() {
                closed.push(connection_id);
            }
        }

        for connection_id in closed {
            tracing::debug!(connection_id, club_id, "pruning closed connection");
            self.unregister(connection_id);
        }
    }

    /// Sends the notification to every club with registered connections,
    /// except the ones listed in `exclude`.
    pub fn broadcast(&self, notification: &Notification, exclude: &[ClubId]) {
        let club_ids: Vec<ClubId> = {
            let registry = self
                .registry
                .read()
                .expect("acquire read lock on channel registry");

            registry.by_club.keys().cloned().collect()
        };

        for club_id in club_ids {
            if !exclude.contains(&club_id) {
                self.send(&club_id, notification);
            }
        }
    }

    /// Returns the number of connections registered for the given club.
    pub fn connection_count(&self, club_id: &str) -> usize {
        self.registry
            .read()
            .expect("acquire read lock on channel registry")
            .by_club
            .get(club_id)
            .map(HashSet::len)
            .unwrap_or_default()
    }
}
