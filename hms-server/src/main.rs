//! HMS服务器主程序

use anyhow::{Context, Result};
use clap::Parser;
use hms_admin::{init_logging, ConfigManager, HmsConfig, StorageBackend};
use hms_admission::AdmissionRegistry;
use hms_billing::{BillingService, PricingPolicy};
use hms_core::Store;
use hms_database::{DatabasePool, DatabaseQueries, MemoryState, MemoryStore, PgStore, PoolSettings};
use hms_relay::EventRelay;
use hms_web::{AppState, WebServer};
use std::net::SocketAddr;
use tracing::{error, info};

/// HMS服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "hms-server")]
#[command(about = "HMS (Hospital Management System) 服务器")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 监听主机
    #[arg(long)]
    host: Option<String>,

    /// 服务器端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 存储后端 (postgres | memory)
    #[arg(short, long)]
    storage: Option<StorageBackend>,

    /// 日志级别
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Args {
    /// 命令行参数覆盖配置文件
    fn apply(&self, config: &mut HmsConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(storage) = self.storage {
            config.storage.backend = storage;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 日志尚未初始化，配置错误直接输出到标准错误
    let config = match load_config(&args).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("配置加载失败: {:#}", e);
            return Err(e);
        }
    };

    // 初始化日志
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("日志初始化失败: {:#}", e);
        return Err(e);
    }

    info!("启动HMS服务器...");
    match &args.config {
        Some(path) => info!("配置来源: {} + 环境变量", path),
        None => info!("配置来源: 默认值 + 环境变量"),
    }
    info!("HMS服务器配置:");
    info!("  监听地址: {}:{}", config.server.host, config.server.port);
    info!("  存储后端: {:?}", config.storage.backend);
    info!("  税率: {}", config.billing.tax_rate);
    info!("  手术室管理员房间: {}", config.relay.ot_manager_room);

    let result = match config.storage.backend {
        StorageBackend::Postgres => {
            let settings = PoolSettings {
                url: config.database.url.clone(),
                max_connections: config.database.max_connections,
                min_connections: config.database.min_connections,
                connect_timeout: config.database.connect_timeout(),
            };
            let pool = DatabasePool::connect(&settings).await?;
            DatabaseQueries::new(&pool).create_tables().await?;
            serve(PgStore::new(pool), &config).await
        }
        StorageBackend::Memory => {
            info!("使用内存存储，已写入演示数据");
            serve(MemoryStore::new(MemoryState::demo()), &config).await
        }
    };

    if let Err(e) = &result {
        error!("服务器启动失败: {:#}", e);
    }
    result
}

/// 读取配置并应用命令行覆盖，覆盖后重新校验
async fn load_config(args: &Args) -> Result<HmsConfig> {
    let manager = ConfigManager::new(args.config.as_deref())?;
    let mut config = manager.get_config().await;
    args.apply(&mut config);
    manager.update_config(config.clone()).await?;
    Ok(config)
}

async fn serve<S: Store + Clone>(store: S, config: &HmsConfig) -> Result<()> {
    let pricing = PricingPolicy::new(config.billing.tax_rate)?;
    let state = AppState::new(
        BillingService::new(store.clone(), pricing),
        AdmissionRegistry::new(store),
        EventRelay::new(config.relay.clone()),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    WebServer::new(addr, state).run().await?;
    Ok(())
}
