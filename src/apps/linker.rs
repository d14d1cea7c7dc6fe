use super::LinkError;
use crate::identity::User;
use crate::node::{ContextVerification, NodeError, RemoteNodeClient};
use async_trait::async_trait;
use log::{info, warn};

/// Receiver of linked verifications, usually the app's own backend
#[async_trait]
pub trait VerificationSink: Send + Sync {
    async fn publish(
        &self,
        verification_url: &str,
        account_id: &str,
        verification: &ContextVerification,
    ) -> Result<(), NodeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The context does not ask for a verification
    NotRequired,

    /// The user lacks the verification the context requires
    MissingVerification(String),

    Linked { context: String, account_id: String },
}

/// 将应用账号与本地身份关联
pub struct ContextLinker;

impl ContextLinker {
    pub async fn link(
        node: &dyn RemoteNodeClient,
        sink: &dyn VerificationSink,
        user: &User,
        context: &str,
        account_id: &str,
    ) -> Result<LinkOutcome, LinkError> {
        let info = node.get_context(context).await?;

        let Some(required) = info.verification else {
            info!("context {} requires no verification", context);
            return Ok(LinkOutcome::NotRequired);
        };

        if !user.has_verification(&required) {
            warn!("cannot link {}: user is not verified for {}", context, required);
            return Ok(LinkOutcome::MissingVerification(required));
        }

        let verification_url = info
            .verification_url
            .ok_or_else(|| LinkError::NoVerificationUrl(context.to_string()))?;

        let verification = node.get_context_verification(context, account_id).await?;
        sink.publish(&verification_url, account_id, &verification)
            .await
            .map_err(LinkError::Publish)?;

        info!("linked {} account {}", context, account_id);
        Ok(LinkOutcome::Linked {
            context: context.to_string(),
            account_id: account_id.to_string(),
        })
    }
}
