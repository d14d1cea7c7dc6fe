use serde::{Deserialize, Serialize};
use std::fmt;

/// 群组标识符
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({})", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The local user's membership in one group
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// 群组ID
    pub id: GroupId,

    /// 加入时间（毫秒）
    #[serde(default)]
    pub timestamp: u64,
}

impl Membership {
    pub fn new(id: impl Into<GroupId>, timestamp: u64) -> Self {
        Self {
            id: id.into(),
            timestamp,
        }
    }
}

impl From<String> for GroupId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
