/// Live connection registry
///
/// Tracks exactly one live connection per user and the community index used
/// for scoped broadcast. The three maps form a single consistency domain:
///
/// - `by_user`: user_id -> Connection
/// - `community_of_user`: user_id -> community_id
/// - `users_of_community`: community_id -> set of user_ids
///
/// They are only ever mutated together, under one write lock, and the lock is
/// never held across a peer write.
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::peer::PeerHandle;
use crate::metrics;

/// A registered live connection
#[derive(Clone)]
pub struct Connection {
    pub user_id: String,
    pub connection_id: Uuid,
    pub community_id: Option<String>,
    pub handle: Arc<dyn PeerHandle>,
}

impl Connection {
    pub fn new(
        user_id: impl Into<String>,
        community_id: Option<String>,
        handle: Arc<dyn PeerHandle>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            connection_id: Uuid::new_v4(),
            community_id: community_id.filter(|c| !c.is_empty()),
            handle,
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("user_id", &self.user_id)
            .field("connection_id", &self.connection_id)
            .field("community_id", &self.community_id)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct RegistryState {
    by_user: HashMap<String, Connection>,
    community_of_user: HashMap<String, String>,
    users_of_community: HashMap<String, HashSet<String>>,
}

impl RegistryState {
    fn insert(&mut self, connection: Connection) -> Option<Connection> {
        let user_id = connection.user_id.clone();
        let previous = self.by_user.remove(&user_id);
        self.detach_community(&user_id);

        if let Some(community_id) = &connection.community_id {
            self.community_of_user
                .insert(user_id.clone(), community_id.clone());
            self.users_of_community
                .entry(community_id.clone())
                .or_default()
                .insert(user_id.clone());
        }

        self.by_user.insert(user_id, connection);
        previous
    }

    fn remove(&mut self, user_id: &str) -> Option<Connection> {
        let removed = self.by_user.remove(user_id);
        self.detach_community(user_id);
        removed
    }

    /// Drop the user's community membership, garbage-collecting an emptied community
    fn detach_community(&mut self, user_id: &str) {
        let Some(community_id) = self.community_of_user.remove(user_id) else {
            return;
        };

        if let Some(members) = self.users_of_community.get_mut(&community_id) {
            members.remove(user_id);
            if members.is_empty() {
                self.users_of_community.remove(&community_id);
                tracing::debug!(community_id = %community_id, "Removed empty community from registry");
            }
        }
    }
}

/// Registry of live connections, one per user
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<RegistryState>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the live connection for `connection.user_id`
    ///
    /// Returns the replaced connection, if there was one. The caller owns
    /// closing its handle.
    pub async fn register(&self, connection: Connection) -> Option<Connection> {
        let user_id = connection.user_id.clone();
        let community_id = connection.community_id.clone();

        let (previous, total) = {
            let mut state = self.inner.write().await;
            let previous = state.insert(connection);
            (previous, state.by_user.len())
        };
        metrics::set_live_connections(total);

        tracing::debug!(
            user_id = %user_id,
            community_id = ?community_id,
            replaced = previous.is_some(),
            connected_users = total,
            "Connection registered"
        );

        previous
    }

    /// Remove the user's connection, whatever it is. No-op if absent.
    pub async fn unregister(&self, user_id: &str) -> Option<Connection> {
        let (removed, total) = {
            let mut state = self.inner.write().await;
            let removed = state.remove(user_id);
            (removed, state.by_user.len())
        };
        metrics::set_live_connections(total);

        if removed.is_some() {
            tracing::debug!(user_id = %user_id, connected_users = total, "Connection unregistered");
        }
        removed
    }

    /// Remove the user's connection only if it is still `connection_id`
    ///
    /// A newer connection registered for the same user is left untouched.
    pub async fn unregister_connection(
        &self,
        user_id: &str,
        connection_id: Uuid,
    ) -> Option<Connection> {
        let (removed, total) = {
            let mut state = self.inner.write().await;
            let current = state
                .by_user
                .get(user_id)
                .map(|c| c.connection_id == connection_id)
                .unwrap_or(false);
            let removed = if current { state.remove(user_id) } else { None };
            (removed, state.by_user.len())
        };
        metrics::set_live_connections(total);

        if removed.is_some() {
            tracing::debug!(
                user_id = %user_id,
                connection_id = %connection_id,
                connected_users = total,
                "Connection unregistered"
            );
        }
        removed
    }

    pub async fn lookup(&self, user_id: &str) -> Option<Connection> {
        self.inner.read().await.by_user.get(user_id).cloned()
    }

    pub async fn is_connected(&self, user_id: &str) -> bool {
        self.inner.read().await.by_user.contains_key(user_id)
    }

    pub async fn community_of(&self, user_id: &str) -> Option<String> {
        self.inner
            .read()
            .await
            .community_of_user
            .get(user_id)
            .cloned()
    }

    /// Member ids of a community (empty if the community is unknown)
    pub async fn members_of(&self, community_id: &str) -> HashSet<String> {
        self.inner
            .read()
            .await
            .users_of_community
            .get(community_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of the connections of every member of a community
    pub async fn community_connections(&self, community_id: &str) -> Vec<Connection> {
        let state = self.inner.read().await;
        state
            .users_of_community
            .get(community_id)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|user_id| state.by_user.get(user_id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of every live connection
    pub async fn all_connections(&self) -> Vec<Connection> {
        self.inner.read().await.by_user.values().cloned().collect()
    }

    pub async fn has_community(&self, community_id: &str) -> bool {
        self.inner
            .read()
            .await
            .users_of_community
            .contains_key(community_id)
    }

    pub async fn connected_users_count(&self) -> usize {
        self.inner.read().await.by_user.len()
    }

    pub async fn community_count(&self) -> usize {
        self.inner.read().await.users_of_community.len()
    }
}
