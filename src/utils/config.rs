use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::node::NodeClientConfig;
use crate::sync::DEFAULT_RECOVERY_THRESHOLD;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Path error: {0}")]
    PathError(String),
}

/// 应用程序配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 节点地址
    pub node_url: String,

    /// 请求超时（秒）
    pub timeout_secs: u64,

    /// 数据目录
    pub data_dir: PathBuf,

    /// 日志级别
    pub log_level: String,

    /// Exposes the debug flag dispositions
    pub debug_mode: bool,

    /// Recovery connections needed before the backup notice goes away
    pub recovery_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        let node = NodeClientConfig::default();
        Self {
            node_url: node.base_url,
            timeout_secs: node.timeout_secs,
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            debug_mode: false,
            recovery_threshold: DEFAULT_RECOVERY_THRESHOLD,
        }
    }
}

impl Config {
    /// Default location, `<config dir>/brightid/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("brightid").join("config.json"))
            .ok_or_else(|| ConfigError::PathError("no config directory on this platform".to_string()))
    }

    /// 从文件加载配置，文件不存在时使用默认值
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 确保数据目录存在
    pub fn ensure_data_dir(&self) -> Result<(), ConfigError> {
        create_dir_all(&self.data_dir)?;
        Ok(())
    }

    /// Path of the sled database holding the local snapshot
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("brightid.db")
    }

    pub fn node_client_config(&self) -> NodeClientConfig {
        NodeClientConfig {
            base_url: self.node_url.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}
