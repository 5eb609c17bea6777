//! FileBridge CLI
//!
//! 命令行客户端，通过 Unix Socket 与守护进程通信

mod client;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use filebridge_core::{IpcRequest, IpcResponse, Lang, ServerStatus, UploadRecord};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "filebridge", version, about = "FileBridge - 从手机向电脑发送文件")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 查看服务器状态和连接地址
    Status,
    /// 查看最近的上传记录
    History,
    /// 切换保存目录 (不指定路径视为取消)
    SetDir {
        /// 新的保存目录
        path: Option<PathBuf>,
    },
    /// 切换上传页面语言 (ja / en)
    Lang { lang: Lang },
    /// 启动 HTTP 服务
    Start,
    /// 停止 HTTP 服务
    Stop,
    /// 持续显示新上传的文件
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Status => {
            if let IpcResponse::ServerInfo { status } =
                client::send_request(IpcRequest::GetServerInfo).await?
            {
                print_status(&status);
            }
        }
        Commands::History => {
            if let IpcResponse::UploadHistory { records } =
                client::send_request(IpcRequest::GetUploadHistory).await?
            {
                if records.is_empty() {
                    println!("   暂无上传记录");
                }
                for record in &records {
                    print_record(record);
                }
            }
        }
        Commands::SetDir { path } => {
            // 守护进程的工作目录不同，先转为绝对路径
            let path = path.map(std::path::absolute).transpose()?;
            if let IpcResponse::SaveDir { path } =
                client::send_request(IpcRequest::SelectSaveDir { path }).await?
            {
                match path {
                    Some(dir) => println!("✅ 保存目录: {}", dir.display()),
                    None => println!("   已取消，保存目录未改变"),
                }
            }
        }
        Commands::Lang { lang } => {
            if let IpcResponse::ServerInfo { status } =
                client::send_request(IpcRequest::SetLang { lang }).await?
            {
                println!("✅ 语言: {}", status.lang);
                if status.running {
                    println!("   连接地址: {}", status.url);
                }
            }
        }
        Commands::Start => {
            if let IpcResponse::ServerInfo { status } =
                client::send_request(IpcRequest::Start).await?
            {
                print_status(&status);
            }
        }
        Commands::Stop => {
            println!("⏹️  停止 HTTP 服务");
            client::send_request(IpcRequest::Stop).await?;
        }
        Commands::Watch => watch().await?,
    }

    Ok(())
}

/// 订阅上传事件，每次收到通知后重新拉取历史记录
async fn watch() -> Result<()> {
    let mut conn = client::Connection::connect().await?;
    conn.send(&IpcRequest::Subscribe).await?;
    println!("👀 等待上传... (Ctrl+C 退出)");

    while let Some(response) = conn.next_response().await? {
        if let IpcResponse::Event { .. } = response
            && let IpcResponse::UploadHistory { records } =
                client::send_request(IpcRequest::GetUploadHistory).await?
            && let Some(latest) = records.first()
        {
            print_record(latest);
        }
    }

    println!("守护进程已断开");
    Ok(())
}

fn print_status(status: &ServerStatus) {
    if status.running {
        println!("状态: 运行中");
        println!("连接地址: {}", status.url);
        println!("地址: {}:{}", status.lan_ip, status.port);
    } else {
        println!("状态: 已停止");
    }
    println!("保存目录: {}", status.save_dir.display());
    println!("语言: {}", status.lang);
}

fn print_record(record: &UploadRecord) {
    println!(
        "📥 {}  {} ({})",
        record.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
        record.file_name,
        format_size(record.size)
    );
    println!("   {}", record.save_path.display());
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    #[allow(clippy::cast_precision_loss)]
    let value = bytes as f64;
    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", value / KB as f64)
    } else if bytes < GB {
        format!("{:.1} MB", value / MB as f64)
    } else {
        format!("{:.2} GB", value / GB as f64)
    }
}
