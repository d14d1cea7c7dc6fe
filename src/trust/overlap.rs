use crate::identity::{Connection, Membership, UserId};
use crate::node::{NodeError, Profile, RemoteNodeClient};
use crate::state::StateStore;
use std::collections::HashSet;

/// What the local user and a peer have in common
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutualOverlap {
    pub peer_id: UserId,

    /// Local connections the peer is also connected to
    pub mutual_connections: Vec<Connection>,

    /// Local groups the peer is also a member of
    pub mutual_groups: Vec<Membership>,

    /// Verifications the peer holds
    pub verifications: Vec<String>,
}

impl MutualOverlap {
    pub fn is_empty(&self) -> bool {
        self.mutual_connections.is_empty() && self.mutual_groups.is_empty()
    }
}

/// 计算与对方的共同连接和共同群组
///
/// Pure. Output order follows the local lists; the peer itself never counts
/// as a mutual connection.
pub fn compute_overlap(
    peer_id: &UserId,
    local_connections: &[Connection],
    local_groups: &[Membership],
    peer: &Profile,
) -> MutualOverlap {
    let peer_connections: HashSet<&UserId> = peer.connections.iter().collect();
    let peer_groups: HashSet<_> = peer.groups.iter().collect();

    let mutual_connections = local_connections
        .iter()
        .filter(|c| &c.id != peer_id && peer_connections.contains(&c.id))
        .cloned()
        .collect();

    let mutual_groups = local_groups
        .iter()
        .filter(|m| peer_groups.contains(&m.id))
        .cloned()
        .collect();

    let mut seen = HashSet::new();
    let verifications = peer
        .verifications
        .iter()
        .filter(|v| seen.insert(v.as_str()))
        .cloned()
        .collect();

    MutualOverlap {
        peer_id: peer_id.clone(),
        mutual_connections,
        mutual_groups,
        verifications,
    }
}

/// Fetches the peer's profile and computes the overlap with the local state
pub async fn fetch_overlap(
    node: &dyn RemoteNodeClient,
    store: &StateStore,
    peer_id: &UserId,
) -> Result<MutualOverlap, NodeError> {
    let profile = node.get_profile(peer_id).await?;
    let snapshot = store.snapshot().await;
    Ok(compute_overlap(peer_id, &snapshot.connections, &snapshot.memberships, &profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{GroupId, TrustLevel};

    fn local() -> (Vec<Connection>, Vec<Membership>) {
        let connections = vec![
            Connection::new("carol", TrustLevel::JustMet, 0),
            Connection::new("bob", TrustLevel::AlreadyKnown, 0),
            Connection::new("dave", TrustLevel::Recovery, 0),
        ];
        let groups = vec![Membership::new("g1", 0), Membership::new("g2", 0)];
        (connections, groups)
    }

    fn bob_profile() -> Profile {
        Profile {
            sponsored: true,
            verifications: vec!["BrightID".to_string(), "SeedConnected".to_string(), "BrightID".to_string()],
            connections: vec![UserId::from("dave"), UserId::from("carol"), UserId::from("eve")],
            groups: vec![GroupId::from("g2"), GroupId::from("g3")],
        }
    }

    #[test]
    fn test_overlap_follows_local_order() {
        let (connections, groups) = local();
        let overlap = compute_overlap(&UserId::from("bob"), &connections, &groups, &bob_profile());

        let ids: Vec<&str> = overlap.mutual_connections.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["carol", "dave"]);
        assert_eq!(overlap.mutual_groups, vec![Membership::new("g2", 0)]);
        assert_eq!(overlap.verifications, vec!["BrightID", "SeedConnected"]);
    }

    #[test]
    fn test_overlap_is_idempotent() {
        let (connections, groups) = local();
        let bob = UserId::from("bob");
        let first = compute_overlap(&bob, &connections, &groups, &bob_profile());
        let second = compute_overlap(&bob, &connections, &groups, &bob_profile());
        assert_eq!(first, second);
    }

    #[test]
    fn test_peer_is_not_its_own_mutual() {
        let (connections, groups) = local();
        let mut profile = bob_profile();
        profile.connections.push(UserId::from("bob"));

        let overlap = compute_overlap(&UserId::from("bob"), &connections, &groups, &profile);
        assert!(overlap.mutual_connections.iter().all(|c| c.id.as_str() != "bob"));
    }

    #[test]
    fn test_no_overlap() {
        let overlap = compute_overlap(&UserId::from("bob"), &[], &[], &Profile::default());
        assert!(overlap.is_empty());
        assert!(overlap.verifications.is_empty());
    }
}
