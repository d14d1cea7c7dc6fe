use crate::crypto::SecretKey;
use crate::identity::{TrustLevel, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a connection list fetched from the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Connections the local user made to others
    Outbound,

    /// Connections others made to the local user
    Inbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outbound => "outbound",
            Direction::Inbound => "inbound",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flag disposition applied to a connection.
///
/// The four `Reported*` variants are product features. The remaining ones
/// drive fake peers during development and are only available when the
/// flagging engine runs with debug mode enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlagDisposition {
    ReportedSpammer,
    ReportedDuplicate,
    ReportedFake,
    ReportedDeceased,
    BulkJoinGroups,
    BulkFakeConnect,
    ReconnectChangedProfile,
    ReconnectIdenticalProfile,
}

impl FlagDisposition {
    /// Presentation order, production dispositions first
    pub const ALL: [FlagDisposition; 8] = [
        FlagDisposition::ReportedSpammer,
        FlagDisposition::ReportedDuplicate,
        FlagDisposition::ReportedFake,
        FlagDisposition::ReportedDeceased,
        FlagDisposition::BulkJoinGroups,
        FlagDisposition::BulkFakeConnect,
        FlagDisposition::ReconnectChangedProfile,
        FlagDisposition::ReconnectIdenticalProfile,
    ];

    pub fn is_debug(&self) -> bool {
        !self.is_report()
    }

    pub fn is_report(&self) -> bool {
        matches!(
            self,
            FlagDisposition::ReportedSpammer
                | FlagDisposition::ReportedDuplicate
                | FlagDisposition::ReportedFake
                | FlagDisposition::ReportedDeceased
        )
    }

    /// Reason string the node stores with a report
    pub fn report_reason(&self) -> Option<&'static str> {
        match self {
            FlagDisposition::ReportedSpammer => Some("spammer"),
            FlagDisposition::ReportedDuplicate => Some("duplicate"),
            FlagDisposition::ReportedFake => Some("fake"),
            FlagDisposition::ReportedDeceased => Some("deceased"),
            _ => None,
        }
    }

    /// Inverse of [`report_reason`](Self::report_reason)
    pub fn from_report_reason(reason: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.report_reason() == Some(reason))
    }

    pub fn label(&self) -> &'static str {
        match self {
            FlagDisposition::ReportedSpammer => "Flag as spammer",
            FlagDisposition::ReportedDuplicate => "Flag as duplicate",
            FlagDisposition::ReportedFake => "Flag as fake",
            FlagDisposition::ReportedDeceased => "Flag as deceased",
            FlagDisposition::BulkJoinGroups => "Join All Groups",
            FlagDisposition::BulkFakeConnect => "Connect to other fake connections",
            FlagDisposition::ReconnectChangedProfile => "Reconnect - changed profile",
            FlagDisposition::ReconnectIdenticalProfile => "Reconnect - identical profile",
        }
    }
}

impl fmt::Display for FlagDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 连接记录
///
/// Node responses carry `id`, `level` and `timestamp`; the remaining fields
/// are local and default when deserializing a node response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// 对方ID
    pub id: UserId,

    /// 显示名称（仅本地）
    #[serde(default)]
    pub name: String,

    /// 本地用户给对方的信任级别
    pub level: TrustLevel,

    /// 对方给本地用户的信任级别，仅来自入站列表
    #[serde(default)]
    pub incoming_level: Option<TrustLevel>,

    /// 最后更新时间（毫秒）
    #[serde(default)]
    pub timestamp: u64,

    /// Signing key held for fake peers created by the debug tooling
    #[serde(default)]
    pub secret_key: Option<SecretKey>,

    /// 标记状态
    #[serde(default)]
    pub flag: Option<FlagDisposition>,
}

impl Connection {
    pub fn new(id: impl Into<UserId>, level: TrustLevel, timestamp: u64) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            level,
            incoming_level: None,
            timestamp,
            secret_key: None,
            flag: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_secret_key(mut self, key: SecretKey) -> Self {
        self.secret_key = Some(key);
        self
    }

    /// Name to show, falling back to the id for peers never named locally
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }

    /// Whether both sides consider each other connected
    pub fn is_mutual(&self) -> bool {
        self.incoming_level.is_some()
    }

    /// Copies the fields the node does not know about from a previous local
    /// record of the same peer.
    pub fn carry_local_fields(&mut self, previous: &Connection) {
        if self.name.is_empty() {
            self.name = previous.name.clone();
        }
        if self.secret_key.is_none() {
            self.secret_key = previous.secret_key.clone();
        }
        if self.flag.is_none() {
            self.flag = previous.flag;
        }
    }
}
