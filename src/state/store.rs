use crate::identity::{Connection, Membership, User, UserId, Verification};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockWriteGuard};

/// 通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    /// Fewer recovery connections than the social-recovery threshold
    BackupPending { recovery_connections: usize, required: usize },

    /// The node does not list the user as sponsored yet
    SponsorshipMissing,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::BackupPending { recovery_connections, required } => write!(
                f,
                "Choose recovery connections to back up your account ({}/{})",
                recovery_connections, required
            ),
            Notification::SponsorshipMissing => write!(f, "Your account is not sponsored yet"),
        }
    }
}

/// Everything the client has published about the local user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub user: User,
    pub memberships: Vec<Membership>,
    pub connections: Vec<Connection>,
    pub notifications: Vec<Notification>,
}

impl Snapshot {
    pub fn new(user: User) -> Self {
        Self {
            user,
            memberships: Vec::new(),
            connections: Vec::new(),
            notifications: Vec::new(),
        }
    }

    pub fn connection(&self, id: &UserId) -> Option<&Connection> {
        self.connections.iter().find(|c| &c.id == id)
    }

    pub fn connection_mut(&mut self, id: &UserId) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| &c.id == id)
    }

    pub fn recovery_connections(&self) -> Vec<&Connection> {
        self.connections.iter().filter(|c| c.level.is_recovery()).collect()
    }

    /// Replaces the connection set. Peers already known locally keep their
    /// name, signing key and flag.
    pub fn replace_connections(&mut self, merged: Vec<Connection>) {
        let mut previous: HashMap<UserId, Connection> = self
            .connections
            .drain(..)
            .map(|c| (c.id.clone(), c))
            .collect();

        self.connections = merged
            .into_iter()
            .map(|mut conn| {
                if let Some(old) = previous.remove(&conn.id) {
                    conn.carry_local_fields(&old);
                }
                conn
            })
            .collect();
    }

    pub fn replace_memberships(&mut self, memberships: Vec<Membership>) {
        self.memberships = memberships;
    }

    pub fn set_verifications(&mut self, verifications: Vec<Verification>) {
        self.user.set_verifications(verifications);
    }
}

/// Process-wide store of the published snapshot.
///
/// Full replaces are done by the sync coordinator only; trust changes go
/// through [`StateStore::update_connection`] after the node confirmed them.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<RwLock<Snapshot>>,
}

impl StateStore {
    pub fn new(user: User) -> Self {
        Self::from_snapshot(Snapshot::new(user))
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(snapshot)),
        }
    }

    /// Copy of the current snapshot
    pub async fn snapshot(&self) -> Snapshot {
        self.inner.read().await.clone()
    }

    pub async fn user(&self) -> User {
        self.inner.read().await.user.clone()
    }

    pub async fn self_id(&self) -> UserId {
        self.inner.read().await.user.id.clone()
    }

    pub async fn connections(&self) -> Vec<Connection> {
        self.inner.read().await.connections.clone()
    }

    pub async fn connection(&self, id: &UserId) -> Option<Connection> {
        self.inner.read().await.connection(id).cloned()
    }

    pub async fn memberships(&self) -> Vec<Membership> {
        self.inner.read().await.memberships.clone()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.inner.read().await.notifications.clone()
    }

    pub async fn recovery_connections(&self) -> Vec<Connection> {
        self.inner
            .read()
            .await
            .recovery_connections()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Applies `f` to the connection with `id`. Returns `None` if the peer is
    /// not in the connection set.
    pub async fn update_connection<R>(&self, id: &UserId, f: impl FnOnce(&mut Connection) -> R) -> Option<R> {
        let mut snapshot = self.inner.write().await;
        snapshot.connection_mut(id).map(f)
    }

    /// Adds a connection made on this device, replacing any entry for the same peer
    pub async fn add_connection(&self, connection: Connection) {
        let mut snapshot = self.inner.write().await;
        snapshot.connections.retain(|c| c.id != connection.id);
        snapshot.connections.push(connection);
    }

    /// Records a membership created on this device before the node knows it
    pub async fn add_membership(&self, membership: Membership) {
        let mut snapshot = self.inner.write().await;
        if !snapshot.memberships.iter().any(|m| m.id == membership.id) {
            snapshot.memberships.push(membership);
        }
    }

    pub async fn update_user<R>(&self, f: impl FnOnce(&mut User) -> R) -> R {
        f(&mut self.inner.write().await.user)
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.inner.write().await
    }
}
