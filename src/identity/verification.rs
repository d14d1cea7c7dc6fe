use serde::{Deserialize, Serialize};

/// A named attestation issued by the node, e.g. "BrightID" or "SeedConnected".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    /// 验证名称
    pub name: String,

    /// 签发时间（毫秒）
    #[serde(default)]
    pub timestamp: u64,
}

impl Verification {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: 0,
        }
    }
}

/// Name of the verification that marks an identity as unique
pub const BRIGHTID_VERIFICATION: &str = "BrightID";
