//! Signed operations submitted to the node.
//!
//! Each operation is signed over its JSON body with the signature field left
//! empty.

use crate::crypto::{self, PublicKey, SecretKey, SignatureError};
use crate::identity::{FlagDisposition, GroupId, TrustLevel, UserId};
use serde::{Deserialize, Serialize};

fn signing_bytes<T: Serialize>(unsigned: &T) -> Result<Vec<u8>, SignatureError> {
    serde_json::to_vec(unsigned).map_err(|e| SignatureError::InvalidEncoding(e.to_string()))
}

/// 连接更新：本地用户为对方设定信任级别
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpdate {
    /// Identity issuing the update
    #[serde(rename = "id1")]
    pub from: UserId,

    /// Peer the level is about
    #[serde(rename = "id2")]
    pub to: UserId,

    pub level: TrustLevel,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub group_id: Option<GroupId>,

    pub timestamp: u64,

    /// Replacement signing key announced on reconnect
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signing_key: Option<PublicKey>,

    #[serde(rename = "sig1", default)]
    pub signature: String,
}

impl ConnectionUpdate {
    pub fn new(
        from: UserId,
        to: UserId,
        level: TrustLevel,
        group_id: Option<GroupId>,
        timestamp: u64,
    ) -> Self {
        Self {
            from,
            to,
            level,
            group_id,
            timestamp,
            signing_key: None,
            signature: String::new(),
        }
    }

    pub fn with_signing_key(mut self, key: PublicKey) -> Self {
        self.signing_key = Some(key);
        self
    }

    /// Bytes covered by the signature
    pub fn signing_payload(&self) -> Result<Vec<u8>, SignatureError> {
        let mut unsigned = self.clone();
        unsigned.signature = String::new();
        signing_bytes(&unsigned)
    }

    pub fn sign(&mut self, secret_key: &SecretKey) -> Result<(), SignatureError> {
        let payload = self.signing_payload()?;
        self.signature = crypto::sign_hex(secret_key, &payload);
        Ok(())
    }

    pub fn verify(&self, public_key: &PublicKey) -> Result<(), SignatureError> {
        crypto::verify_hex(public_key, &self.signing_payload()?, &self.signature)
    }
}

mod report_reason {
    use crate::identity::FlagDisposition;
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(disposition: &FlagDisposition, serializer: S) -> Result<S::Ok, S::Error> {
        match disposition.report_reason() {
            Some(reason) => serializer.serialize_str(reason),
            None => Err(S::Error::custom(format!("{:?} is not a report", disposition))),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FlagDisposition, D::Error> {
        let reason = String::deserialize(deserializer)?;
        FlagDisposition::from_report_reason(&reason)
            .ok_or_else(|| D::Error::custom(format!("unknown report reason: {}", reason)))
    }
}

/// 举报：对某个连接提交标记
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagReport {
    #[serde(rename = "id1")]
    pub reporter: UserId,

    #[serde(rename = "id2")]
    pub peer_id: UserId,

    /// Sent as the node's reason string, e.g. `"fake"`
    #[serde(rename = "reason", with = "report_reason")]
    pub disposition: FlagDisposition,

    pub timestamp: u64,

    #[serde(rename = "sig1", default)]
    pub signature: String,
}

impl FlagReport {
    pub fn new(reporter: UserId, peer_id: UserId, disposition: FlagDisposition, timestamp: u64) -> Self {
        Self {
            reporter,
            peer_id,
            disposition,
            timestamp,
            signature: String::new(),
        }
    }

    pub fn signing_payload(&self) -> Result<Vec<u8>, SignatureError> {
        let mut unsigned = self.clone();
        unsigned.signature = String::new();
        signing_bytes(&unsigned)
    }

    pub fn sign(&mut self, secret_key: &SecretKey) -> Result<(), SignatureError> {
        let payload = self.signing_payload()?;
        self.signature = crypto::sign_hex(secret_key, &payload);
        Ok(())
    }

    pub fn verify(&self, public_key: &PublicKey) -> Result<(), SignatureError> {
        crypto::verify_hex(public_key, &self.signing_payload()?, &self.signature)
    }
}

/// 加入群组
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupJoin {
    #[serde(rename = "id")]
    pub member: UserId,

    pub group: GroupId,

    pub timestamp: u64,

    #[serde(rename = "sig", default)]
    pub signature: String,
}

impl GroupJoin {
    pub fn new(member: UserId, group: GroupId, timestamp: u64) -> Self {
        Self {
            member,
            group,
            timestamp,
            signature: String::new(),
        }
    }

    pub fn signing_payload(&self) -> Result<Vec<u8>, SignatureError> {
        let mut unsigned = self.clone();
        unsigned.signature = String::new();
        signing_bytes(&unsigned)
    }

    pub fn sign(&mut self, secret_key: &SecretKey) -> Result<(), SignatureError> {
        let payload = self.signing_payload()?;
        self.signature = crypto::sign_hex(secret_key, &payload);
        Ok(())
    }

    pub fn verify(&self, public_key: &PublicKey) -> Result<(), SignatureError> {
        crypto::verify_hex(public_key, &self.signing_payload()?, &self.signature)
    }
}
