use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TrustLevelError {
    #[error("Invalid trust level: {0}")]
    InvalidTrustLevel(String),
}

/// 信任级别
///
/// A connection's level is the trust one identity assigns to another. The set
/// is fixed and totally ordered from least to most trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrustLevel {
    /// 已举报
    #[serde(rename = "reported")]
    Reported = 0,

    /// 可疑
    #[serde(rename = "suspicious")]
    Suspicious = 1,

    /// 刚认识
    #[serde(rename = "just met")]
    JustMet = 2,

    /// 早已认识
    #[serde(rename = "already known")]
    AlreadyKnown = 3,

    /// 恢复联系人，可参与社交恢复
    #[serde(rename = "recovery")]
    Recovery = 4,
}

impl TrustLevel {
    /// All levels in ascending order of trust
    pub const ALL: [TrustLevel; 5] = [
        TrustLevel::Reported,
        TrustLevel::Suspicious,
        TrustLevel::JustMet,
        TrustLevel::AlreadyKnown,
        TrustLevel::Recovery,
    ];

    /// Whether this level makes the peer a social-recovery connection
    pub fn is_recovery(&self) -> bool {
        matches!(self, TrustLevel::Recovery)
    }

    /// Node wire name of the level
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLevel::Reported => "reported",
            TrustLevel::Suspicious => "suspicious",
            TrustLevel::JustMet => "just met",
            TrustLevel::AlreadyKnown => "already known",
            TrustLevel::Recovery => "recovery",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrustLevel {
    type Err = TrustLevelError;

    /// Accepts the wire name as well as `just-met` / `just_met` spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', '_'], " ");
        Self::ALL
            .iter()
            .find(|level| level.as_str() == normalized)
            .copied()
            .ok_or_else(|| TrustLevelError::InvalidTrustLevel(s.to_string()))
    }
}
