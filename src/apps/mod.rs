//! Linking app accounts to the local identity.
//!
//! An app hands the user a deep link naming its node, its context and the
//! account to link. The node signs a context verification which is then
//! pushed to the app's verification endpoint.

mod deep_link;
mod linker;

pub use deep_link::DeepLink;
pub use linker::{ContextLinker, LinkOutcome, VerificationSink};

use crate::node::NodeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Invalid link: {0}")]
    InvalidLink(String),

    #[error("Context {0} has no verification endpoint")]
    NoVerificationUrl(String),

    #[error("Node error: {0}")]
    Remote(#[from] NodeError),

    #[error("Publishing verification failed: {0}")]
    Publish(NodeError),
}
