use crate::crypto::{KeyError, KeyPair, PublicKey, SecretKey, SignatureError};
use crate::identity::{Connection, FlagDisposition, TrustLevel, UserId};
use crate::node::{ConnectionUpdate, FlagReport, GroupJoin, NodeError, RemoteNodeClient};
use crate::state::StateStore;
use crate::utils::now_millis;
use log::{debug, info, warn};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlagError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("{0} is only available in debug mode")]
    DebugDisabled(FlagDisposition),

    #[error("Unknown peer: {0}")]
    UnknownPeer(UserId),

    #[error("No signing key held for {0}")]
    MissingPeerKey(UserId),

    #[error("Node error: {0}")]
    Remote(#[from] NodeError),

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),
}

/// 标记引擎配置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlaggingConfig {
    /// Enables the dispositions that act on behalf of fake peers
    pub debug_mode: bool,
}

/// Result of a completed flag action
#[derive(Debug, Clone, PartialEq)]
pub enum FlagOutcome {
    Reported {
        peer: UserId,
        disposition: FlagDisposition,
    },

    JoinedGroups {
        peer: UserId,
        groups: usize,
    },

    FakeConnected {
        peer: UserId,
        connections: usize,
    },

    /// `new_key` is set when the peer rotated its signing key
    Reconnected {
        peer: UserId,
        new_key: Option<PublicKey>,
    },
}

impl FlagOutcome {
    pub fn peer(&self) -> &UserId {
        match self {
            FlagOutcome::Reported { peer, .. }
            | FlagOutcome::JoinedGroups { peer, .. }
            | FlagOutcome::FakeConnected { peer, .. }
            | FlagOutcome::Reconnected { peer, .. } => peer,
        }
    }
}

/// Applies flag dispositions to connections.
///
/// Every action runs remote first; local state changes only after the node
/// accepted all submitted operations, then the completion callback runs.
pub struct FlaggingEngine {
    node: Arc<dyn RemoteNodeClient>,
    store: StateStore,
    keypair: KeyPair,
    config: FlaggingConfig,
}

impl FlaggingEngine {
    pub fn new(node: Arc<dyn RemoteNodeClient>, store: StateStore, keypair: KeyPair, config: FlaggingConfig) -> Self {
        Self {
            node,
            store,
            keypair,
            config,
        }
    }

    pub fn config(&self) -> FlaggingConfig {
        self.config
    }

    /// Dispositions offered to the user, in presentation order
    pub fn options(&self) -> Vec<FlagDisposition> {
        FlagDisposition::ALL
            .iter()
            .copied()
            .filter(|d| self.config.debug_mode || !d.is_debug())
            .collect()
    }

    /// 按菜单序号选择处置方式
    pub fn option_at(&self, index: usize) -> Option<FlagDisposition> {
        self.options().get(index).copied()
    }

    /// Applies `disposition` to `peer_id`.
    ///
    /// Reports are signed with the local user's key and take no
    /// `signing_key`; passing one is a precondition error. Debug dispositions
    /// act as the peer and need its key: `signing_key` if given, otherwise
    /// the key stored on the connection.
    pub async fn apply_flag<F>(
        &self,
        peer_id: &UserId,
        disposition: FlagDisposition,
        signing_key: Option<&SecretKey>,
        on_complete: F,
    ) -> Result<FlagOutcome, FlagError>
    where
        F: FnOnce(&FlagOutcome) + Send,
    {
        if disposition.is_debug() && !self.config.debug_mode {
            return Err(FlagError::DebugDisabled(disposition));
        }
        if disposition.is_report() && signing_key.is_some() {
            return Err(FlagError::Precondition("reports are signed with the local user's key".to_string()));
        }

        let self_id = self.store.self_id().await;
        if self_id.is_empty() {
            return Err(FlagError::Precondition("id missing".to_string()));
        }

        let connection = self
            .store
            .connection(peer_id)
            .await
            .ok_or_else(|| FlagError::UnknownPeer(peer_id.clone()))?;

        debug!("applying {:?} to {}", disposition, peer_id);

        let outcome = if disposition.is_report() {
            self.report(&self_id, &connection, disposition).await?
        } else {
            let peer_key = signing_key
                .cloned()
                .or_else(|| connection.secret_key.clone())
                .ok_or_else(|| FlagError::MissingPeerKey(peer_id.clone()))?;

            match disposition {
                FlagDisposition::BulkJoinGroups => self.join_all_groups(&connection, &peer_key).await?,
                FlagDisposition::BulkFakeConnect => self.connect_fakes(&connection, &peer_key).await?,
                FlagDisposition::ReconnectChangedProfile => {
                    self.reconnect(&self_id, &connection, &peer_key, true).await?
                }
                _ => self.reconnect(&self_id, &connection, &peer_key, false).await?,
            }
        };

        self.store
            .update_connection(peer_id, |conn| conn.flag = Some(disposition))
            .await;

        info!("{} applied to {}", disposition, peer_id);
        on_complete(&outcome);
        Ok(outcome)
    }

    async fn report(
        &self,
        self_id: &UserId,
        connection: &Connection,
        disposition: FlagDisposition,
    ) -> Result<FlagOutcome, FlagError> {
        let mut report = FlagReport::new(self_id.clone(), connection.id.clone(), disposition, now_millis());
        report.sign(&self.keypair.secret)?;

        if let Err(e) = self.node.submit_flag(&report).await {
            warn!("flagging {} failed: {}", connection.id, e);
            return Err(e.into());
        }

        self.store
            .update_connection(&connection.id, |conn| conn.level = TrustLevel::Reported)
            .await;

        Ok(FlagOutcome::Reported {
            peer: connection.id.clone(),
            disposition,
        })
    }

    /// The peer joins every group the local user is a member of
    async fn join_all_groups(&self, connection: &Connection, peer_key: &SecretKey) -> Result<FlagOutcome, FlagError> {
        let memberships = self.store.memberships().await;

        for membership in &memberships {
            let mut join = GroupJoin::new(connection.id.clone(), membership.id.clone(), now_millis());
            join.sign(peer_key)?;
            self.node.join_group(&join).await?;
        }

        Ok(FlagOutcome::JoinedGroups {
            peer: connection.id.clone(),
            groups: memberships.len(),
        })
    }

    /// The peer connects to every other connection whose key is held locally
    async fn connect_fakes(&self, connection: &Connection, peer_key: &SecretKey) -> Result<FlagOutcome, FlagError> {
        let others: Vec<Connection> = self
            .store
            .connections()
            .await
            .into_iter()
            .filter(|c| c.id != connection.id && c.secret_key.is_some())
            .collect();

        for other in &others {
            let mut update = ConnectionUpdate::new(
                connection.id.clone(),
                other.id.clone(),
                TrustLevel::JustMet,
                None,
                now_millis(),
            );
            update.sign(peer_key)?;
            self.node.submit_connection_update(&update).await?;
        }

        Ok(FlagOutcome::FakeConnected {
            peer: connection.id.clone(),
            connections: others.len(),
        })
    }

    /// The peer connects back to the local user, optionally with a new key
    async fn reconnect(
        &self,
        self_id: &UserId,
        connection: &Connection,
        peer_key: &SecretKey,
        rotate_key: bool,
    ) -> Result<FlagOutcome, FlagError> {
        let level = connection.incoming_level.unwrap_or(TrustLevel::JustMet);
        let mut update = ConnectionUpdate::new(connection.id.clone(), self_id.clone(), level, None, now_millis());

        let new_keypair = if rotate_key { Some(KeyPair::generate()?) } else { None };
        if let Some(new_keypair) = &new_keypair {
            update = update.with_signing_key(new_keypair.public);
        }

        // 用旧密钥签名，节点据此接受新公钥
        update.sign(peer_key)?;
        self.node.submit_connection_update(&update).await?;

        let new_key = new_keypair.as_ref().map(|kp| kp.public);
        self.store
            .update_connection(&connection.id, |conn| {
                conn.incoming_level = Some(level);
                if let Some(new_keypair) = new_keypair {
                    conn.secret_key = Some(new_keypair.secret);
                }
            })
            .await;

        Ok(FlagOutcome::Reconnected {
            peer: connection.id.clone(),
            new_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Membership, User};
    use crate::node::{Endpoint, MemoryNode};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Fixture {
        node: MemoryNode,
        store: StateStore,
        fake_key: KeyPair,
    }

    async fn fixture(debug_mode: bool) -> (Fixture, FlaggingEngine) {
        let keypair = KeyPair::generate().unwrap();
        let fake_key = KeyPair::generate().unwrap();
        let node = MemoryNode::new();
        node.register_key(&UserId::from("alice"), keypair.public);
        node.register_key(&UserId::from("fake1"), fake_key.public);

        let store = StateStore::new(User::new(UserId::from("alice"), "Alice"));
        store.add_connection(Connection::new("bob", TrustLevel::JustMet, 1)).await;
        store
            .add_connection(Connection::new("fake1", TrustLevel::JustMet, 1).with_secret_key(fake_key.secret.clone()))
            .await;
        store
            .add_connection(
                Connection::new("fake2", TrustLevel::JustMet, 1)
                    .with_secret_key(KeyPair::generate().unwrap().secret),
            )
            .await;

        let engine = FlaggingEngine::new(
            Arc::new(node.clone()),
            store.clone(),
            keypair,
            FlaggingConfig { debug_mode },
        );
        (Fixture { node, store, fake_key }, engine)
    }

    #[tokio::test]
    async fn test_options_hide_debug_dispositions() {
        let (_, engine) = fixture(false).await;
        let options = engine.options();
        assert_eq!(options.len(), 4);
        assert!(options.iter().all(|d| d.is_report()));
        assert_eq!(engine.option_at(2), Some(FlagDisposition::ReportedFake));
        assert_eq!(engine.option_at(4), None);

        let (_, debug_engine) = fixture(true).await;
        assert_eq!(debug_engine.options(), FlagDisposition::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_debug_disposition_rejected_without_debug_mode() {
        let (f, engine) = fixture(false).await;
        let result = engine
            .apply_flag(&UserId::from("fake1"), FlagDisposition::BulkJoinGroups, None, |_| {})
            .await;

        assert!(matches!(result, Err(FlagError::DebugDisabled(_))));
        assert_eq!(f.node.call_count(Endpoint::JoinGroup), 0);
    }

    #[tokio::test]
    async fn test_report_updates_local_state_and_calls_back() {
        let (f, engine) = fixture(false).await;
        let called = AtomicBool::new(false);

        let outcome = engine
            .apply_flag(&UserId::from("bob"), FlagDisposition::ReportedSpammer, None, |outcome| {
                assert_eq!(outcome.peer(), &UserId::from("bob"));
                called.store(true, Ordering::SeqCst);
            })
            .await
            .unwrap();

        assert!(called.load(Ordering::SeqCst));
        assert!(matches!(outcome, FlagOutcome::Reported { .. }));
        let bob = f.store.connection(&UserId::from("bob")).await.unwrap();
        assert_eq!(bob.flag, Some(FlagDisposition::ReportedSpammer));
        assert_eq!(bob.level, TrustLevel::Reported);
        assert_eq!(f.node.edge_level(&UserId::from("alice"), &UserId::from("bob")), Some(TrustLevel::Reported));
    }

    #[tokio::test]
    async fn test_failed_report_leaves_disposition() {
        let (f, engine) = fixture(false).await;
        f.node.set_failing(Endpoint::Flag, true);
        let called = AtomicBool::new(false);

        let result = engine
            .apply_flag(&UserId::from("bob"), FlagDisposition::ReportedFake, None, |_| {
                called.store(true, Ordering::SeqCst)
            })
            .await;

        assert!(matches!(result, Err(FlagError::Remote(_))));
        assert!(!called.load(Ordering::SeqCst));
        let bob = f.store.connection(&UserId::from("bob")).await.unwrap();
        assert_eq!(bob.flag, None);
        assert_eq!(bob.level, TrustLevel::JustMet);
    }

    #[tokio::test]
    async fn test_report_rejects_explicit_signing_key() {
        let (f, engine) = fixture(false).await;
        let other = KeyPair::generate().unwrap();

        let result = engine
            .apply_flag(&UserId::from("bob"), FlagDisposition::ReportedSpammer, Some(&other.secret), |_| {})
            .await;

        assert!(matches!(result, Err(FlagError::Precondition(_))));
        assert_eq!(f.node.call_count(Endpoint::Flag), 0);
        assert_eq!(f.store.connection(&UserId::from("bob")).await.unwrap().flag, None);
    }

    #[tokio::test]
    async fn test_bulk_join_groups() {
        let (f, engine) = fixture(true).await;
        f.store.add_membership(Membership::new("g1", 1)).await;
        f.store.add_membership(Membership::new("g2", 1)).await;

        let outcome = engine
            .apply_flag(&UserId::from("fake1"), FlagDisposition::BulkJoinGroups, None, |_| {})
            .await
            .unwrap();

        assert_eq!(
            outcome,
            FlagOutcome::JoinedGroups {
                peer: UserId::from("fake1"),
                groups: 2
            }
        );
        assert_eq!(f.node.group_joins().len(), 2);
    }

    #[tokio::test]
    async fn test_bulk_fake_connect() {
        let (f, engine) = fixture(true).await;

        let outcome = engine
            .apply_flag(&UserId::from("fake1"), FlagDisposition::BulkFakeConnect, None, |_| {})
            .await
            .unwrap();

        assert!(matches!(outcome, FlagOutcome::FakeConnected { connections: 1, .. }));
        assert_eq!(
            f.node.edge_level(&UserId::from("fake1"), &UserId::from("fake2")),
            Some(TrustLevel::JustMet)
        );
    }

    #[tokio::test]
    async fn test_debug_action_needs_peer_key() {
        let (_, engine) = fixture(true).await;
        let result = engine
            .apply_flag(&UserId::from("bob"), FlagDisposition::ReconnectIdenticalProfile, None, |_| {})
            .await;
        assert!(matches!(result, Err(FlagError::MissingPeerKey(_))));
    }

    #[tokio::test]
    async fn test_reconnect_changed_profile_rotates_key() {
        let (f, engine) = fixture(true).await;
        let fake1 = UserId::from("fake1");

        let outcome = engine
            .apply_flag(&fake1, FlagDisposition::ReconnectChangedProfile, None, |_| {})
            .await
            .unwrap();

        let new_key = match outcome {
            FlagOutcome::Reconnected { new_key: Some(key), .. } => key,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_ne!(new_key, f.fake_key.public);
        assert_eq!(f.node.registered_key(&fake1), Some(new_key));

        let conn = f.store.connection(&fake1).await.unwrap();
        assert_eq!(conn.incoming_level, Some(TrustLevel::JustMet));
        assert_eq!(conn.secret_key.map(|k| k.public_key()), Some(new_key));
        assert_eq!(conn.flag, Some(FlagDisposition::ReconnectChangedProfile));
    }
}
