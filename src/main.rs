use brightid_core::cli::{CommandProcessor, Session};
use brightid_core::crypto::KeyPair;
use brightid_core::identity::{User, UserId};
use brightid_core::node::HttpNodeClient;
use brightid_core::state::{PendingOperations, Snapshot, StateStore};
use brightid_core::storage::StorageManager;
use brightid_core::utils::{self, parse_log_level, setup_logger, Config};

use clap::{ArgAction, Parser};
use colored::*;
use log::{info, warn, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;

/// 命令行参数
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// 首次运行时使用的显示名称
    #[clap(short, long, default_value = "BrightID User")]
    name: String,

    /// 节点地址，覆盖配置文件
    #[clap(long)]
    node_url: Option<String>,

    /// 数据目录，覆盖配置文件
    #[clap(long)]
    data_dir: Option<PathBuf>,

    /// 配置文件路径
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// 日志级别
    #[clap(long)]
    log_level: Option<String>,

    /// 启用详细日志
    #[clap(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// 启用调试标记选项
    #[clap(long, action = ArgAction::SetTrue)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 加载配置文件，首次运行时保存默认配置
    let config_path = match args.config.clone() {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let mut config = Config::load(&config_path)?;
    if !config_path.exists() {
        config.save(&config_path)?;
    }

    // 命令行参数覆盖配置
    if let Some(node_url) = args.node_url.clone() {
        config.node_url = node_url;
    }
    if let Some(data_dir) = args.data_dir.clone() {
        config.data_dir = data_dir;
    }
    if let Some(log_level) = args.log_level.clone() {
        config.log_level = log_level;
    }
    config.debug_mode |= args.debug;
    config.ensure_data_dir()?;

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        parse_log_level(&config.log_level).map_err(anyhow::Error::msg)?
    };
    setup_logger(Some(level)).map_err(anyhow::Error::msg)?;

    info!("{}", format!("Starting {} {}...", utils::name(), utils::version()).green().bold());

    let storage = StorageManager::open(&config.database_path())?;
    let snapshots = storage.snapshots();

    let keypair = match snapshots.load_keypair()? {
        Some(keypair) => keypair,
        None => {
            info!("Generating identity...");
            let keypair = KeyPair::generate()?;
            snapshots.save_keypair(&keypair)?;
            keypair
        }
    };
    let user_id = UserId::from_public_key(&keypair.public);
    info!("User ID: {}", user_id);

    let snapshot = match snapshots.load_snapshot()? {
        Some(snapshot) if snapshot.user.id == user_id => snapshot,
        Some(_) => {
            warn!("Stored state belongs to another identity, starting fresh");
            Snapshot::new(User::new(user_id.clone(), args.name.clone()))
        }
        None => Snapshot::new(User::new(user_id.clone(), args.name.clone())),
    };
    let store = StateStore::from_snapshot(snapshot);
    let pending = PendingOperations::from_operations(snapshots.load_pending()?);

    info!("Using node {}", config.node_url);
    let http = HttpNodeClient::new(config.node_client_config())?;
    let session = Session::new(
        Arc::new(http.clone()),
        Arc::new(http.clone()),
        store,
        pending,
        keypair,
        &config,
    )
    .with_http(http);
    let session = Arc::new(session);

    match session.sync.refresh_self().await {
        Ok(report) if report.is_complete() => info!("Initial refresh complete"),
        Ok(report) => warn!("Initial refresh incomplete: {:?}", report.status),
        Err(e) => warn!("Initial refresh skipped: {}", e),
    }

    let processor = CommandProcessor::new(session.clone());
    processor.run().await?;

    // 退出前持久化本地状态
    session.sync.notifications_settled().await;
    snapshots.save_snapshot(&session.store().snapshot().await)?;
    snapshots.save_pending(&session.sync.pending().list())?;
    storage.close()?;

    info!("BrightID client stopped.");
    Ok(())
}
