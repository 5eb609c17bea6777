//! FileBridge Core Library
//!
//! 局域网文件接收服务的核心实现：手机浏览器打开连接地址，
//! 选择文件上传，文件保存到本机指定目录。
//!
//! # 模块
//!
//! - **net**: 局域网 IPv4 地址解析、空闲端口探测
//! - **history**: 有上限的上传历史记录，持久化到磁盘
//! - **transfer**: HTTP 上传页面和上传接口、文件名去重
//! - **server**: 服务器生命周期、状态快照、保存目录和语言设置
//! - **events**: `upload:completed` 通知总线
//! - **config**: 配置持久化
//! - **ipc**: 守护进程的本地 IPC 协议
//!
//! # 使用示例
//!
//! ```ignore
//! use filebridge_core::{ConfigStore, HistoryStore, ServerManager, ServerOptions};
//!
//! let dir = filebridge_core::config::default_config_dir();
//! let store = ConfigStore::in_dir(&dir);
//! let config = store.load();
//! let history = Arc::new(HistoryStore::load(dir.join(HISTORY_FILE), config.history_limit));
//! let manager = ServerManager::with_config(store, config, history, ServerOptions::default());
//!
//! let status = manager.start().await?;
//! println!("打开 {}", status.url);
//!
//! let mut events = manager.subscribe();
//! while events.recv().await.is_ok() {
//!     for record in manager.upload_history() {
//!         println!("{} ({} bytes)", record.file_name, record.size);
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod ipc;
pub mod net;
pub mod server;
pub mod transfer;

pub use config::{ConfigStore, Configuration, HISTORY_FILE, Lang};
pub use error::{InvalidDirectoryError, PersistenceError, StartupError, TransferError};
pub use events::{NotificationBus, ServerEvent};
pub use history::{HistoryStore, UploadRecord};
pub use ipc::{IpcRequest, IpcResponse};
pub use net::{ResolvedAddress, is_private_ipv4};
pub use server::{DirectoryPicker, ServerManager, ServerOptions, ServerStatus};
