use env_logger::{Builder, Env};
use log::LevelFilter;

/// Crates that log too much at debug level
const QUIET_MODULES: [&str; 3] = ["sled", "hyper", "reqwest"];

/// 初始化日志记录器，RUST_LOG 优先于传入的级别
pub fn setup_logger(level: Option<LevelFilter>) -> Result<(), String> {
    let default_level = level.unwrap_or(LevelFilter::Info);
    let env = Env::default().default_filter_or(default_level.as_str().to_lowercase());

    let mut builder = Builder::from_env(env);
    if default_level > LevelFilter::Info {
        for module in QUIET_MODULES {
            builder.filter_module(module, LevelFilter::Info);
        }
    }
    builder.format_module_path(false);

    builder.try_init().map_err(|e| format!("Logger already initialised: {}", e))
}

/// 从字符串解析日志级别
pub fn parse_log_level(level_str: &str) -> Result<LevelFilter, String> {
    match level_str.trim().to_lowercase().as_str() {
        "off" => Ok(LevelFilter::Off),
        "error" => Ok(LevelFilter::Error),
        "warn" | "warning" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        _ => Err(format!("Invalid log level: {}", level_str)),
    }
}
