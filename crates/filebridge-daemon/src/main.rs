//! FileBridge Daemon
//!
//! 后台守护进程，负责：
//! - 运行手机上传用的 HTTP 服务
//! - 保存配置和上传历史
//! - 通过 Unix Socket 与 CLI 通信

mod ipc;

use anyhow::Result;
use clap::Parser;
use filebridge_core::config::default_config_dir;
use filebridge_core::{ConfigStore, HISTORY_FILE, HistoryStore, ServerManager, ServerOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "filebridge-daemon", version, about = "FileBridge - 局域网文件接收服务")]
struct Args {
    /// 配置目录 (默认: ~/.config/filebridge)
    #[arg(long)]
    config_dir: Option<PathBuf>,
    /// 本次运行使用的端口 (不写入配置)
    #[arg(short, long)]
    port: Option<u16>,
    /// 本次运行保留的历史记录条数 (不写入配置)
    #[arg(long)]
    history_limit: Option<usize>,
    /// 启动后不立即开启 HTTP 服务，等待 CLI 的 start 命令
    #[arg(long)]
    no_start: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 桥接 log crate（filebridge-core 使用）到 tracing
    let _ = tracing_log::LogTracer::init();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,filebridge_core=debug")),
        )
        .try_init();

    let args = Args::parse();
    tracing::info!("FileBridge Daemon starting...");

    let config_dir = args.config_dir.unwrap_or_else(default_config_dir);
    let store = ConfigStore::in_dir(&config_dir);
    let config = store.load();
    tracing::info!("配置目录: {:?}", config_dir);
    tracing::info!("保存目录: {:?}", config.save_dir);

    // 命令行参数只对本次运行生效，不进入会被保存的配置
    let history_limit = args.history_limit.unwrap_or(config.history_limit).max(1);
    let history = Arc::new(HistoryStore::load(
        config_dir.join(HISTORY_FILE),
        history_limit,
    ));
    let options = ServerOptions {
        port_override: args.port,
        ..ServerOptions::default()
    };
    let manager = Arc::new(ServerManager::with_config(store, config, history, options));

    if !args.no_start {
        match manager.start().await {
            Ok(status) => tracing::info!("在手机浏览器中打开: {}", status.url),
            Err(e) => tracing::error!("HTTP 服务启动失败: {}", e),
        }
    }

    let ipc_handle = tokio::spawn(ipc::run_ipc_server(manager.clone()));

    tokio::select! {
        res = ipc_handle => {
            tracing::error!("IPC server exited: {:?}", res);
        }
        res = shutdown_signal() => {
            if let Err(e) = res {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("收到退出信号");
        }
    }

    manager.stop().await;
    let _ = std::fs::remove_file(filebridge_core::ipc::socket_path());
    tracing::info!("FileBridge Daemon stopped");
    Ok(())
}

async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = term.recv() => Ok(()),
    }
}
