//! Trust level and flagging tests against the in-memory node.

use brightid_core::crypto::KeyPair;
use brightid_core::identity::{Connection, FlagDisposition, Membership, TrustLevel, User, UserId};
use brightid_core::node::{Endpoint, MemoryNode};
use brightid_core::state::{PendingOperations, StateStore};
use brightid_core::sync::SyncCoordinator;
use brightid_core::trust::{
    fetch_overlap, FlagError, FlaggingConfig, FlaggingEngine, TrustError, TrustLevelStateMachine,
};
use std::sync::Arc;

struct Harness {
    node: MemoryNode,
    store: StateStore,
    keypair: KeyPair,
    alice: UserId,
}

impl Harness {
    /// A registered local user with connections synced from the node
    async fn new() -> Self {
        let keypair = KeyPair::generate().expect("Failed to generate keypair");
        let alice = UserId::from_public_key(&keypair.public);
        let node = MemoryNode::new();
        node.register_key(&alice, keypair.public);
        for peer in ["bob", "carol"] {
            node.connect(&alice, &UserId::from(peer), TrustLevel::JustMet, 1);
        }

        let store = StateStore::new(User::new(alice.clone(), "Alice"));
        SyncCoordinator::new(Arc::new(node.clone()), store.clone(), PendingOperations::new())
            .refresh(&alice)
            .await
            .expect("refresh failed");

        Self {
            node,
            store,
            keypair,
            alice,
        }
    }

    fn levels(&self) -> TrustLevelStateMachine {
        TrustLevelStateMachine::new(Arc::new(self.node.clone()), self.store.clone(), self.keypair.secret.clone())
    }

    fn flagging(&self, debug_mode: bool) -> FlaggingEngine {
        FlaggingEngine::new(
            Arc::new(self.node.clone()),
            self.store.clone(),
            self.keypair.clone(),
            FlaggingConfig { debug_mode },
        )
    }
}

#[tokio::test]
async fn test_set_level_success_sets_exact_level() {
    let h = Harness::new().await;
    let bob = UserId::from("bob");

    for level in [TrustLevel::Recovery, TrustLevel::Suspicious, TrustLevel::AlreadyKnown] {
        h.levels()
            .set_level(&h.alice, &bob, level, None, 10)
            .await
            .expect("set_level failed");
        assert_eq!(h.store.connection(&bob).await.expect("bob missing").level, level);
        assert_eq!(h.node.edge_level(&h.alice, &bob), Some(level));
    }

    let update = h.node.submitted_updates().pop().expect("no update submitted");
    update.verify(&h.keypair.public).expect("bad signature");
}

#[tokio::test]
async fn test_set_level_failure_leaves_level() {
    let h = Harness::new().await;
    let bob = UserId::from("bob");
    h.node.set_failing(Endpoint::ConnectionUpdate, true);

    let result = h.levels().set_level(&h.alice, &bob, TrustLevel::Recovery, None, 10).await;

    assert!(matches!(result, Err(TrustError::Remote(_))));
    assert_eq!(h.store.connection(&bob).await.expect("bob missing").level, TrustLevel::JustMet);
    assert!(h.store.recovery_connections().await.is_empty());
}

/// `ReportedFake` against a failing node: the disposition stays unset and
/// the caller sees the failure.
#[tokio::test]
async fn test_reported_fake_with_failing_remote() {
    let h = Harness::new().await;
    let carol = UserId::from("carol");
    h.node.set_failing(Endpoint::Flag, true);

    let mut completed = false;
    let result = h
        .flagging(false)
        .apply_flag(&carol, FlagDisposition::ReportedFake, None, |_| completed = true)
        .await;

    assert!(matches!(result, Err(FlagError::Remote(_))));
    assert!(!completed);
    let conn = h.store.connection(&carol).await.expect("carol missing");
    assert_eq!(conn.flag, None);
    assert_eq!(conn.level, TrustLevel::JustMet);
    assert!(h.node.submitted_flags().is_empty());
}

#[tokio::test]
async fn test_flag_survives_next_refresh() {
    let h = Harness::new().await;
    let carol = UserId::from("carol");

    h.flagging(false)
        .apply_flag(&carol, FlagDisposition::ReportedDeceased, None, |_| {})
        .await
        .expect("flag failed");

    SyncCoordinator::new(Arc::new(h.node.clone()), h.store.clone(), PendingOperations::new())
        .refresh(&h.alice)
        .await
        .expect("refresh failed");

    let conn = h.store.connection(&carol).await.expect("carol missing");
    assert_eq!(conn.level, TrustLevel::Reported);
    assert_eq!(conn.flag, Some(FlagDisposition::ReportedDeceased));
}

#[tokio::test]
async fn test_debug_options_only_in_debug_mode() {
    let h = Harness::new().await;

    assert!(h.flagging(false).options().iter().all(|d| !d.is_debug()));
    assert_eq!(h.flagging(true).options().len(), FlagDisposition::ALL.len());

    let fake = KeyPair::generate().expect("Failed to generate keypair");
    let result = h
        .flagging(false)
        .apply_flag(
            &UserId::from("bob"),
            FlagDisposition::ReconnectIdenticalProfile,
            Some(&fake.secret),
            |_| {},
        )
        .await;
    assert!(matches!(result, Err(FlagError::DebugDisabled(_))));
    assert_eq!(h.node.call_count(Endpoint::ConnectionUpdate), 0);
}

#[tokio::test]
async fn test_reconnect_with_explicit_key() {
    let h = Harness::new().await;
    let bob = UserId::from("bob");
    let bob_key = KeyPair::generate().expect("Failed to generate keypair");
    h.node.register_key(&bob, bob_key.public);

    h.flagging(true)
        .apply_flag(&bob, FlagDisposition::ReconnectIdenticalProfile, Some(&bob_key.secret), |_| {})
        .await
        .expect("reconnect failed");

    assert_eq!(h.node.edge_level(&bob, &h.alice), Some(TrustLevel::JustMet));
    let conn = h.store.connection(&bob).await.expect("bob missing");
    assert_eq!(conn.incoming_level, Some(TrustLevel::JustMet));
    assert!(conn.is_mutual());
}

/// Overlap is computed from the peer's node profile and the local snapshot.
#[tokio::test]
async fn test_fetch_overlap() {
    let h = Harness::new().await;
    let dave = UserId::from("dave");
    h.node.connect(&dave, &UserId::from("carol"), TrustLevel::JustMet, 1);
    h.node.connect(&dave, &UserId::from("bob"), TrustLevel::JustMet, 1);
    h.node.set_memberships(&dave, vec![Membership::new("g1", 1)]);
    h.store.add_membership(Membership::new("g1", 1)).await;
    h.store.add_membership(Membership::new("g2", 1)).await;
    h.store.add_connection(Connection::new("dave", TrustLevel::JustMet, 1)).await;

    let first = fetch_overlap(&h.node, &h.store, &dave).await.expect("overlap failed");
    let second = fetch_overlap(&h.node, &h.store, &dave).await.expect("overlap failed");

    assert_eq!(first, second);
    let ids: Vec<&str> = first.mutual_connections.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["bob", "carol"]);
    assert_eq!(first.mutual_groups, vec![Membership::new("g1", 1)]);
}
