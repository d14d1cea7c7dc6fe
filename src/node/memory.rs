//! In-memory node for tests and offline demos.
//!
//! Keeps a directed connection graph, verifications, memberships and app
//! contexts. Failures and latency can be injected per endpoint.

use super::{
    ConnectionUpdate, ContextInfo, ContextVerification, FlagReport, GroupJoin, NodeError, Profile,
    RemoteNodeClient,
};
use crate::crypto::PublicKey;
use crate::identity::{Connection, Direction, Membership, TrustLevel, UserId, Verification};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Node endpoints, used to target failure and latency injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Verifications,
    Memberships,
    Connections,
    Profile,
    ConnectionUpdate,
    Flag,
    JoinGroup,
    Context,
}

#[derive(Debug, Clone)]
struct Edge {
    from: UserId,
    to: UserId,
    level: TrustLevel,
    timestamp: u64,
}

#[derive(Default)]
struct NodeState {
    verifications: HashMap<UserId, Vec<Verification>>,
    memberships: HashMap<UserId, Vec<Membership>>,
    edges: Vec<Edge>,
    sponsored: HashSet<UserId>,
    keys: HashMap<UserId, PublicKey>,
    contexts: HashMap<String, ContextInfo>,
    context_verifications: HashMap<(String, String), ContextVerification>,
    failing: HashSet<Endpoint>,
    delays: HashMap<Endpoint, Duration>,
    calls: Vec<Endpoint>,
    updates: Vec<ConnectionUpdate>,
    flags: Vec<FlagReport>,
    joins: Vec<GroupJoin>,
}

impl NodeState {
    fn upsert_edge(&mut self, from: &UserId, to: &UserId, level: TrustLevel, timestamp: u64) {
        match self.edges.iter_mut().find(|e| &e.from == from && &e.to == to) {
            Some(edge) => {
                edge.level = level;
                edge.timestamp = timestamp;
            }
            None => self.edges.push(Edge {
                from: from.clone(),
                to: to.clone(),
                level,
                timestamp,
            }),
        }
    }

    /// 已登记公钥的身份必须提供有效签名
    fn check_signer(&self, signer: &UserId, verify: impl FnOnce(&PublicKey) -> bool) -> Result<(), NodeError> {
        match self.keys.get(signer) {
            Some(key) if !verify(key) => {
                Err(NodeError::Rejected(format!("bad signature from {}", signer)))
            }
            _ => Ok(()),
        }
    }
}

/// In-memory [`RemoteNodeClient`]
#[derive(Clone, Default)]
pub struct MemoryNode {
    state: Arc<Mutex<NodeState>>,
}

impl MemoryNode {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the call, applies injected latency, then injected failure
    async fn enter(&self, endpoint: Endpoint) -> Result<(), NodeError> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(endpoint);
            state.delays.get(&endpoint).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.lock().failing.contains(&endpoint) {
            return Err(NodeError::Unavailable(format!("{:?} is failing", endpoint)));
        }
        Ok(())
    }

    pub fn set_verifications(&self, id: &UserId, verifications: Vec<Verification>) {
        self.lock().verifications.insert(id.clone(), verifications);
    }

    pub fn set_memberships(&self, id: &UserId, memberships: Vec<Membership>) {
        self.lock().memberships.insert(id.clone(), memberships);
    }

    /// Adds or updates the directed edge `from -> to`
    pub fn connect(&self, from: &UserId, to: &UserId, level: TrustLevel, timestamp: u64) {
        self.lock().upsert_edge(from, to, level, timestamp);
    }

    pub fn set_sponsored(&self, id: &UserId, sponsored: bool) {
        let mut state = self.lock();
        if sponsored {
            state.sponsored.insert(id.clone());
        } else {
            state.sponsored.remove(id);
        }
    }

    /// Once registered, operations signed by `id` are checked against this key
    pub fn register_key(&self, id: &UserId, key: PublicKey) {
        self.lock().keys.insert(id.clone(), key);
    }

    pub fn add_context(&self, name: &str, info: ContextInfo) {
        self.lock().contexts.insert(name.to_string(), info);
    }

    pub fn add_context_verification(&self, context: &str, account_id: &str, verification: ContextVerification) {
        self.lock()
            .context_verifications
            .insert((context.to_string(), account_id.to_string()), verification);
    }

    pub fn set_failing(&self, endpoint: Endpoint, failing: bool) {
        let mut state = self.lock();
        if failing {
            state.failing.insert(endpoint);
        } else {
            state.failing.remove(&endpoint);
        }
    }

    pub fn set_delay(&self, endpoint: Endpoint, delay: Option<Duration>) {
        let mut state = self.lock();
        match delay {
            Some(delay) => state.delays.insert(endpoint, delay),
            None => state.delays.remove(&endpoint),
        };
    }

    pub fn call_count(&self, endpoint: Endpoint) -> usize {
        self.lock().calls.iter().filter(|e| **e == endpoint).count()
    }

    pub fn submitted_updates(&self) -> Vec<ConnectionUpdate> {
        self.lock().updates.clone()
    }

    pub fn submitted_flags(&self) -> Vec<FlagReport> {
        self.lock().flags.clone()
    }

    pub fn group_joins(&self) -> Vec<GroupJoin> {
        self.lock().joins.clone()
    }

    /// Current level on the edge `from -> to`
    pub fn edge_level(&self, from: &UserId, to: &UserId) -> Option<TrustLevel> {
        self.lock()
            .edges
            .iter()
            .find(|e| &e.from == from && &e.to == to)
            .map(|e| e.level)
    }

    pub fn registered_key(&self, id: &UserId) -> Option<PublicKey> {
        self.lock().keys.get(id).copied()
    }
}

#[async_trait]
impl RemoteNodeClient for MemoryNode {
    async fn get_verifications(&self, id: &UserId) -> Result<Vec<Verification>, NodeError> {
        self.enter(Endpoint::Verifications).await?;
        Ok(self.lock().verifications.get(id).cloned().unwrap_or_default())
    }

    async fn get_memberships(&self, id: &UserId) -> Result<Vec<Membership>, NodeError> {
        self.enter(Endpoint::Memberships).await?;
        Ok(self.lock().memberships.get(id).cloned().unwrap_or_default())
    }

    async fn get_connections(&self, id: &UserId, direction: Direction) -> Result<Vec<Connection>, NodeError> {
        self.enter(Endpoint::Connections).await?;

        let state = self.lock();
        let connections = state
            .edges
            .iter()
            .filter_map(|edge| match direction {
                Direction::Outbound if &edge.from == id => {
                    Some(Connection::new(edge.to.clone(), edge.level, edge.timestamp))
                }
                Direction::Inbound if &edge.to == id => {
                    Some(Connection::new(edge.from.clone(), edge.level, edge.timestamp))
                }
                _ => None,
            })
            .collect();
        Ok(connections)
    }

    async fn get_profile(&self, id: &UserId) -> Result<Profile, NodeError> {
        self.enter(Endpoint::Profile).await?;

        let state = self.lock();
        let verifications = state
            .verifications
            .get(id)
            .map(|vs| vs.iter().map(|v| v.name.clone()).collect())
            .unwrap_or_default();
        let connections = state
            .edges
            .iter()
            .filter(|e| &e.from == id)
            .map(|e| e.to.clone())
            .collect();
        let groups = state
            .memberships
            .get(id)
            .map(|ms| ms.iter().map(|m| m.id.clone()).collect())
            .unwrap_or_default();

        Ok(Profile {
            sponsored: state.sponsored.contains(id),
            verifications,
            connections,
            groups,
        })
    }

    async fn submit_connection_update(&self, update: &ConnectionUpdate) -> Result<(), NodeError> {
        self.enter(Endpoint::ConnectionUpdate).await?;

        let mut state = self.lock();
        state.check_signer(&update.from, |key| update.verify(key).is_ok())?;
        state.upsert_edge(&update.from, &update.to, update.level, update.timestamp);
        if let Some(key) = update.signing_key {
            state.keys.insert(update.from.clone(), key);
        }
        state.updates.push(update.clone());
        Ok(())
    }

    async fn submit_flag(&self, report: &FlagReport) -> Result<(), NodeError> {
        self.enter(Endpoint::Flag).await?;

        let mut state = self.lock();
        state.check_signer(&report.reporter, |key| report.verify(key).is_ok())?;
        state.upsert_edge(&report.reporter, &report.peer_id, TrustLevel::Reported, report.timestamp);
        state.flags.push(report.clone());
        Ok(())
    }

    async fn join_group(&self, join: &GroupJoin) -> Result<(), NodeError> {
        self.enter(Endpoint::JoinGroup).await?;

        let mut state = self.lock();
        state.check_signer(&join.member, |key| join.verify(key).is_ok())?;
        let memberships = state.memberships.entry(join.member.clone()).or_default();
        if !memberships.iter().any(|m| m.id == join.group) {
            memberships.push(Membership::new(join.group.clone(), join.timestamp));
        }
        state.joins.push(join.clone());
        Ok(())
    }

    async fn get_context(&self, context: &str) -> Result<ContextInfo, NodeError> {
        self.enter(Endpoint::Context).await?;
        self.lock()
            .contexts
            .get(context)
            .cloned()
            .ok_or_else(|| NodeError::NotFound(format!("context {}", context)))
    }

    async fn get_context_verification(
        &self,
        context: &str,
        account_id: &str,
    ) -> Result<ContextVerification, NodeError> {
        self.enter(Endpoint::Context).await?;
        self.lock()
            .context_verifications
            .get(&(context.to_string(), account_id.to_string()))
            .cloned()
            .ok_or_else(|| NodeError::NotFound(format!("verification {}/{}", context, account_id)))
    }
}
