//! 本地 IPC 协议
//!
//! 守护进程通过 Unix Socket 暴露给界面/命令行的接口，每行一个 JSON。
//! `subscribe` 请求之后，该连接只单向推送事件。

use crate::config::Lang;
use crate::history::UploadRecord;
use crate::server::ServerStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub fn socket_path() -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join("filebridge.sock")
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcRequest {
    GetServerInfo,
    GetUploadHistory,
    /// `path` 为空表示用户取消了选择
    SelectSaveDir {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    SetLang {
        lang: Lang,
    },
    Start,
    Stop,
    Subscribe,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcResponse {
    Ok,
    Error { message: String },
    ServerInfo { status: ServerStatus },
    UploadHistory { records: Vec<UploadRecord> },
    SaveDir { path: Option<PathBuf> },
    Event { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::to_string(&IpcRequest::SetLang { lang: Lang::En }).unwrap();
        assert_eq!(json, r#"{"type":"set_lang","lang":"en"}"#);

        let parsed: IpcRequest = serde_json::from_str(r#"{"type":"select_save_dir"}"#).unwrap();
        assert_eq!(parsed, IpcRequest::SelectSaveDir { path: None });

        let parsed: IpcRequest = serde_json::from_str(r#"{"type":"get_server_info"}"#).unwrap();
        assert_eq!(parsed, IpcRequest::GetServerInfo);
    }

    #[test]
    fn test_event_wire_format() {
        let event = IpcResponse::Event {
            name: "upload:completed".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"event","name":"upload:completed"}"#
        );
    }
}
