//! Request/response contract with a BrightID node.
//!
//! ```text
//! SyncCoordinator / TrustLevelStateMachine / FlaggingEngine
//!       |
//!       v
//! RemoteNodeClient (trait)
//!       |
//!       +---> HttpNodeClient (node REST API)
//!       |
//!       +---> MemoryNode (tests, offline demos)
//! ```
//!
//! The core only orchestrates these calls. Transport, authentication and the
//! node's own signature validation are the node's business.

mod http;
mod memory;
mod operations;

pub use http::{HttpNodeClient, NodeClientConfig};
pub use memory::{Endpoint, MemoryNode};
pub use operations::{ConnectionUpdate, FlagReport, GroupJoin};

use crate::crypto::SignatureError;
use crate::identity::{Connection, Direction, GroupId, Membership, UserId, Verification};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Node error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation rejected: {0}")]
    Rejected(String),

    #[error("Node unavailable: {0}")]
    Unavailable(String),

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),
}

/// Profile of an identity as reported by the node.
///
/// For the local user only `sponsored` matters; for peers the connection,
/// group and verification lists feed the mutual overlap view.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub sponsored: bool,

    #[serde(default)]
    pub verifications: Vec<String>,

    #[serde(default)]
    pub connections: Vec<UserId>,

    #[serde(default)]
    pub groups: Vec<GroupId>,
}

/// An app context registered on the node
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInfo {
    /// Verification the app requires before linking
    #[serde(default)]
    pub verification: Option<String>,

    /// Where the app receives linked verifications
    #[serde(default)]
    pub verification_url: Option<String>,

    #[serde(default)]
    pub is_app: bool,
}

/// Node-signed statement that an app account belongs to a verified identity
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextVerification {
    #[serde(default)]
    pub unique: bool,

    #[serde(default)]
    pub context_ids: Vec<String>,

    #[serde(default)]
    pub timestamp: u64,

    #[serde(default)]
    pub sig: String,
}

/// Remote identity node.
#[async_trait]
pub trait RemoteNodeClient: Send + Sync {
    /// Verifications held by `id`
    async fn get_verifications(&self, id: &UserId) -> Result<Vec<Verification>, NodeError>;

    /// Groups `id` is a member of
    async fn get_memberships(&self, id: &UserId) -> Result<Vec<Membership>, NodeError>;

    /// Connections of `id` in one direction. Entries carry the peer id, the
    /// level on that edge and its timestamp.
    async fn get_connections(&self, id: &UserId, direction: Direction) -> Result<Vec<Connection>, NodeError>;

    async fn get_profile(&self, id: &UserId) -> Result<Profile, NodeError>;

    /// Registers a signed connection level
    async fn submit_connection_update(&self, update: &ConnectionUpdate) -> Result<(), NodeError>;

    /// Registers a signed flag report
    async fn submit_flag(&self, report: &FlagReport) -> Result<(), NodeError>;

    /// Adds a signed group membership
    async fn join_group(&self, join: &GroupJoin) -> Result<(), NodeError>;

    async fn get_context(&self, context: &str) -> Result<ContextInfo, NodeError>;

    async fn get_context_verification(
        &self,
        context: &str,
        account_id: &str,
    ) -> Result<ContextVerification, NodeError>;
}
