mod config;
mod logger;

pub use config::{Config, ConfigError};
pub use logger::{parse_log_level, setup_logger};

/// 获取应用程序版本
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 获取应用程序名称
pub fn name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

/// Milliseconds since the Unix epoch, the timestamp unit the node uses
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// 格式化毫秒时间戳为人类可读时间
pub fn format_timestamp(timestamp_millis: u64) -> String {
    match chrono::DateTime::from_timestamp_millis(timestamp_millis as i64) {
        Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}
