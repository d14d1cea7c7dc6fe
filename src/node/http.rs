//! HTTP client for the BrightID node REST API

use super::{
    ConnectionUpdate, ContextInfo, ContextVerification, FlagReport, GroupJoin, NodeError, Profile,
    RemoteNodeClient,
};
use crate::apps::VerificationSink;
use crate::identity::{Connection, Direction, Membership, UserId, Verification};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Version tag sent with every operation
const OPERATION_VERSION: u8 = 6;

/// Connection settings for [`HttpNodeClient`]
#[derive(Debug, Clone)]
pub struct NodeClientConfig {
    /// Node base URL including the API prefix, e.g. `http://node.brightid.org/brightid/v6`
    pub base_url: String,

    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for NodeClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://node.brightid.org/brightid/v6".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Node responses wrap their payload in `{"data": ...}`
#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    error_message: String,
}

#[derive(Deserialize)]
struct VerificationsData {
    verifications: Vec<Verification>,
}

#[derive(Deserialize)]
struct MembershipsData {
    memberships: Vec<Membership>,
}

#[derive(Deserialize)]
struct ConnectionsData {
    connections: Vec<Connection>,
}

/// Operation body posted to `/operations`
#[derive(Serialize)]
struct Operation<'a, T: Serialize> {
    name: &'a str,
    v: u8,
    #[serde(flatten)]
    body: &'a T,
}

/// HTTP implementation of [`RemoteNodeClient`]
#[derive(Clone)]
pub struct HttpNodeClient {
    config: NodeClientConfig,
    client: Client,
}

impl HttpNodeClient {
    pub fn new(config: NodeClientConfig) -> Result<Self, NodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Same settings against another node, used when a deep link names its own host
    pub fn with_base_url(&self, base_url: &str) -> Self {
        Self {
            config: NodeClientConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                timeout_secs: self.config.timeout_secs,
            },
            client: self.client.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, NodeError> {
        let url = self.url(path);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let envelope: Envelope<T> = Self::handle_response(response, path).await?;
        Ok(envelope.data)
    }

    async fn post_operation<T: Serialize>(&self, name: &str, body: &T) -> Result<(), NodeError> {
        let url = self.url("/operations");
        debug!("POST {} ({})", url, name);

        let operation = Operation {
            name,
            v: OPERATION_VERSION,
            body,
        };
        let response = self.client.post(&url).json(&operation).send().await?;
        let _: serde_json::Value = Self::handle_response(response, "/operations").await?;
        Ok(())
    }

    async fn handle_response<T: DeserializeOwned>(response: Response, path: &str) -> Result<T, NodeError> {
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.error_message)
            .unwrap_or_default();
        warn!("node request {} failed with {}: {}", path, status, message);

        match status {
            StatusCode::NOT_FOUND => Err(NodeError::NotFound(path.to_string())),
            StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST => Err(NodeError::Rejected(message)),
            StatusCode::SERVICE_UNAVAILABLE => Err(NodeError::Unavailable(message)),
            _ => Err(NodeError::Server {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

#[async_trait]
impl RemoteNodeClient for HttpNodeClient {
    async fn get_verifications(&self, id: &UserId) -> Result<Vec<Verification>, NodeError> {
        let path = format!("/users/{}/verifications", urlencoding::encode(id.as_str()));
        let data: VerificationsData = self.get(&path).await?;
        Ok(data.verifications)
    }

    async fn get_memberships(&self, id: &UserId) -> Result<Vec<Membership>, NodeError> {
        let path = format!("/users/{}/memberships", urlencoding::encode(id.as_str()));
        let data: MembershipsData = self.get(&path).await?;
        Ok(data.memberships)
    }

    async fn get_connections(&self, id: &UserId, direction: Direction) -> Result<Vec<Connection>, NodeError> {
        let path = format!(
            "/users/{}/connections/{}",
            urlencoding::encode(id.as_str()),
            direction.as_str()
        );
        let data: ConnectionsData = self.get(&path).await?;
        Ok(data.connections)
    }

    async fn get_profile(&self, id: &UserId) -> Result<Profile, NodeError> {
        let path = format!("/users/{}/profile", urlencoding::encode(id.as_str()));
        self.get(&path).await
    }

    async fn submit_connection_update(&self, update: &ConnectionUpdate) -> Result<(), NodeError> {
        self.post_operation("Connect", update).await
    }

    async fn submit_flag(&self, report: &FlagReport) -> Result<(), NodeError> {
        self.post_operation("Flag", report).await
    }

    async fn join_group(&self, join: &GroupJoin) -> Result<(), NodeError> {
        self.post_operation("Add Membership", join).await
    }

    async fn get_context(&self, context: &str) -> Result<ContextInfo, NodeError> {
        let path = format!("/apps/{}", urlencoding::encode(context));
        self.get(&path).await
    }

    async fn get_context_verification(
        &self,
        context: &str,
        account_id: &str,
    ) -> Result<ContextVerification, NodeError> {
        let path = format!(
            "/verifications/{}/{}",
            urlencoding::encode(context),
            urlencoding::encode(account_id)
        );
        self.get(&path).await
    }
}

#[async_trait]
impl VerificationSink for HttpNodeClient {
    async fn publish(
        &self,
        verification_url: &str,
        account_id: &str,
        verification: &ContextVerification,
    ) -> Result<(), NodeError> {
        let url = format!(
            "{}/{}",
            verification_url.trim_end_matches('/'),
            urlencoding::encode(account_id)
        );
        debug!("PUT {}", url);

        let response = self.client.put(&url).json(verification).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(NodeError::Server { status, message });
        }
        Ok(())
    }
}
