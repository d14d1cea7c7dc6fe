use crate::crypto::{SecretKey, SignatureError};
use crate::identity::{GroupId, TrustLevel, UserId};
use crate::node::{ConnectionUpdate, NodeError, RemoteNodeClient};
use crate::state::StateStore;
use log::{info, warn};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrustError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Unknown peer: {0}")]
    UnknownPeer(UserId),

    #[error("Node error: {0}")]
    Remote(#[from] NodeError),

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),
}

/// A confirmed level change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustTransition {
    pub peer: UserId,
    pub from: TrustLevel,
    pub to: TrustLevel,
}

impl TrustTransition {
    pub fn entered_recovery(&self) -> bool {
        !self.from.is_recovery() && self.to.is_recovery()
    }

    pub fn left_recovery(&self) -> bool {
        self.from.is_recovery() && !self.to.is_recovery()
    }
}

/// 信任级别状态机
///
/// A level only changes locally after the node accepted the signed update.
/// There is no retry; a failed update leaves the connection as it was.
pub struct TrustLevelStateMachine {
    node: Arc<dyn RemoteNodeClient>,
    store: StateStore,
    secret_key: SecretKey,
}

impl TrustLevelStateMachine {
    pub fn new(node: Arc<dyn RemoteNodeClient>, store: StateStore, secret_key: SecretKey) -> Self {
        Self {
            node,
            store,
            secret_key,
        }
    }

    pub async fn set_level(
        &self,
        self_id: &UserId,
        peer_id: &UserId,
        new_level: TrustLevel,
        group_id: Option<GroupId>,
        timestamp: u64,
    ) -> Result<TrustTransition, TrustError> {
        if self_id.is_empty() {
            return Err(TrustError::Precondition("id missing".to_string()));
        }

        let current = self
            .store
            .connection(peer_id)
            .await
            .ok_or_else(|| TrustError::UnknownPeer(peer_id.clone()))?;

        let mut update = ConnectionUpdate::new(self_id.clone(), peer_id.clone(), new_level, group_id, timestamp);
        update.sign(&self.secret_key)?;

        if let Err(e) = self.node.submit_connection_update(&update).await {
            warn!("level change {} -> {} for {} rejected: {}", current.level, new_level, peer_id, e);
            return Err(e.into());
        }

        // 节点确认后才修改本地状态
        let from = self
            .store
            .update_connection(peer_id, |conn| {
                let from = conn.level;
                conn.level = new_level;
                conn.timestamp = timestamp;
                from
            })
            .await
            .unwrap_or(current.level);

        info!("{} is now {} (was {})", peer_id, new_level, from);
        Ok(TrustTransition {
            peer: peer_id.clone(),
            from,
            to: new_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::identity::{Connection, User};
    use crate::node::{Endpoint, MemoryNode};

    async fn setup() -> (MemoryNode, TrustLevelStateMachine, KeyPair) {
        let keypair = KeyPair::generate().unwrap();
        let node = MemoryNode::new();
        node.register_key(&UserId::from("alice"), keypair.public);

        let store = StateStore::new(User::new(UserId::from("alice"), "Alice"));
        store.add_connection(Connection::new("bob", TrustLevel::JustMet, 1)).await;

        let machine = TrustLevelStateMachine::new(Arc::new(node.clone()), store, keypair.secret.clone());
        (node, machine, keypair)
    }

    #[tokio::test]
    async fn test_promote_to_recovery() {
        let (node, machine, _) = setup().await;
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        let transition = machine
            .set_level(&alice, &bob, TrustLevel::Recovery, None, 10)
            .await
            .unwrap();

        assert!(transition.entered_recovery());
        assert_eq!(node.edge_level(&alice, &bob), Some(TrustLevel::Recovery));
        let conn = machine.store.connection(&bob).await.unwrap();
        assert_eq!(conn.level, TrustLevel::Recovery);
        assert_eq!(conn.timestamp, 10);
    }

    #[tokio::test]
    async fn test_failed_update_keeps_level() {
        let (node, machine, _) = setup().await;
        node.set_failing(Endpoint::ConnectionUpdate, true);

        let result = machine
            .set_level(&UserId::from("alice"), &UserId::from("bob"), TrustLevel::AlreadyKnown, None, 10)
            .await;

        assert!(matches!(result, Err(TrustError::Remote(_))));
        let conn = machine.store.connection(&UserId::from("bob")).await.unwrap();
        assert_eq!(conn.level, TrustLevel::JustMet);
    }

    #[tokio::test]
    async fn test_wrong_key_is_rejected() {
        let (node, _, _) = setup().await;
        let store = StateStore::new(User::new(UserId::from("alice"), "Alice"));
        store.add_connection(Connection::new("bob", TrustLevel::JustMet, 1)).await;
        let other = KeyPair::generate().unwrap();
        let machine = TrustLevelStateMachine::new(Arc::new(node), store, other.secret);

        let result = machine
            .set_level(&UserId::from("alice"), &UserId::from("bob"), TrustLevel::Suspicious, None, 10)
            .await;
        assert!(matches!(result, Err(TrustError::Remote(NodeError::Rejected(_)))));
    }

    #[tokio::test]
    async fn test_preconditions() {
        let (node, machine, _) = setup().await;

        let missing_self = machine
            .set_level(&UserId::from(""), &UserId::from("bob"), TrustLevel::Recovery, None, 1)
            .await;
        assert!(matches!(missing_self, Err(TrustError::Precondition(_))));

        let unknown = machine
            .set_level(&UserId::from("alice"), &UserId::from("zed"), TrustLevel::Recovery, None, 1)
            .await;
        assert!(matches!(unknown, Err(TrustError::UnknownPeer(_))));
        assert_eq!(node.call_count(Endpoint::ConnectionUpdate), 0);
    }
}
