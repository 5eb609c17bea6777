//! 错误类型
//!
//! 每类错误只影响产生它的操作：上传失败不会波及监听器或其他上传，
//! 持久化失败只会让当前会话退化为纯内存模式。

use axum::http::StatusCode;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// 监听器无法绑定
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to read bound address: {0}")]
    LocalAddr(#[source] io::Error),
}

/// 保存目录不可用，在修改任何状态之前拒绝
#[derive(Debug, Error)]
pub enum InvalidDirectoryError {
    #[error("directory does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("directory is not writable: {}: {source}", path.display())]
    NotWritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 单次上传的失败，临时文件已被清理
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("request is not a multipart upload: {0}")]
    NotMultipart(String),

    #[error("no file in upload")]
    MissingFile,

    #[error("only one file per upload is accepted")]
    MultipleFiles,

    #[error("failed to read upload body: {message}")]
    Body { status: StatusCode, message: String },

    #[error("i/o error while storing upload: {0}")]
    Io(#[from] io::Error),

    #[error("no free file name left for {0}")]
    NamesExhausted(String),

    #[error("upload aborted by server shutdown")]
    Cancelled,
}

impl TransferError {
    /// 返回给上传设备的 HTTP 状态码
    pub fn status(&self) -> StatusCode {
        match self {
            TransferError::NotMultipart(_)
            | TransferError::MissingFile
            | TransferError::MultipleFiles => StatusCode::BAD_REQUEST,
            TransferError::Body { status, .. } => *status,
            TransferError::Io(_) | TransferError::NamesExhausted(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            TransferError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// 配置或历史记录无法写入磁盘
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode settings: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("failed to encode history: {0}")]
    Json(#[from] serde_json::Error),
}
