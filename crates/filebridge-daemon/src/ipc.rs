//! IPC Server - Unix Domain Socket 通信

use anyhow::Result;
use filebridge_core::ipc::socket_path;
use filebridge_core::{IpcRequest, IpcResponse, ServerEvent, ServerManager};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::broadcast::error::RecvError;

pub async fn run_ipc_server(manager: Arc<ServerManager>) -> Result<()> {
    let path = socket_path();

    // 删除旧的 socket 文件
    let _ = std::fs::remove_file(&path);

    let listener = UnixListener::bind(&path)?;
    tracing::info!("IPC 服务器已启动: {:?}", path);

    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let manager = manager.clone();
                tokio::spawn(async move {
                    let (reader, writer) = stream.into_split();
                    if let Err(e) = handle_client(&manager, reader, writer).await {
                        tracing::debug!("IPC client disconnected: {}", e);
                    }
                });
            }
            Err(e) => {
                tracing::warn!("接受连接失败: {}", e);
            }
        }
    }
}

async fn handle_client<R, W>(manager: &ServerManager, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let request: IpcRequest = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                let resp = IpcResponse::Error {
                    message: format!("Invalid request: {}", e),
                };
                write_response(&mut writer, &resp).await?;
                line.clear();
                continue;
            }
        };

        tracing::debug!("收到请求: {:?}", request);

        if request == IpcRequest::Subscribe {
            return stream_events(manager, &mut reader, &mut writer).await;
        }

        let response = dispatch(manager, request).await;
        write_response(&mut writer, &response).await?;
        line.clear();
    }

    Ok(())
}

/// 处理一个普通请求
async fn dispatch(manager: &ServerManager, request: IpcRequest) -> IpcResponse {
    match request {
        IpcRequest::GetServerInfo => IpcResponse::ServerInfo {
            status: manager.status(),
        },
        IpcRequest::GetUploadHistory => IpcResponse::UploadHistory {
            records: manager.upload_history(),
        },
        IpcRequest::SelectSaveDir { path } => {
            // 目录由客户端选择，这里只负责校验
            let picker = move |_: &Path| path.clone();
            match manager.select_save_dir(&picker).await {
                Ok(path) => IpcResponse::SaveDir { path },
                Err(e) => IpcResponse::Error {
                    message: e.to_string(),
                },
            }
        }
        IpcRequest::SetLang { lang } => {
            manager.set_lang(lang).await;
            IpcResponse::ServerInfo {
                status: manager.status(),
            }
        }
        IpcRequest::Start => match manager.start().await {
            Ok(status) => IpcResponse::ServerInfo { status },
            Err(e) => IpcResponse::Error {
                message: e.to_string(),
            },
        },
        IpcRequest::Stop => {
            tracing::info!("停止 HTTP 服务");
            manager.stop().await;
            IpcResponse::ServerInfo {
                status: manager.status(),
            }
        }
        IpcRequest::Subscribe => IpcResponse::Ok,
    }
}

/// 订阅后连接只推送事件，直到客户端断开
///
/// 落后的客户端只收到一个合并后的通知，反正它都要重新拉取历史记录。
async fn stream_events<R, W>(manager: &ServerManager, reader: &mut R, writer: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut events = manager.subscribe();
    write_response(writer, &IpcResponse::Ok).await?;

    let mut discard = String::new();
    loop {
        let event = tokio::select! {
            received = events.recv() => received,
            read = reader.read_line(&mut discard) => {
                if read? == 0 {
                    return Ok(());
                }
                discard.clear();
                continue;
            }
        };
        let name = match event {
            Ok(event) => event.name(),
            Err(RecvError::Lagged(missed)) => {
                tracing::debug!("Subscriber lagged by {} events", missed);
                ServerEvent::UploadCompleted.name()
            }
            Err(RecvError::Closed) => return Ok(()),
        };
        write_response(
            writer,
            &IpcResponse::Event {
                name: name.to_string(),
            },
        )
        .await?;
    }
}

async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, response: &IpcResponse) -> Result<()> {
    writer
        .write_all(serde_json::to_string(response)?.as_bytes())
        .await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filebridge_core::{ConfigStore, HistoryStore, Lang, ServerOptions};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader, duplex};

    fn manager(dir: &Path) -> Arc<ServerManager> {
        Arc::new(ServerManager::new(
            ConfigStore::in_dir(dir),
            Arc::new(HistoryStore::in_memory(10)),
            ServerOptions::default(),
        ))
    }

    #[tokio::test]
    async fn test_dispatch_server_info_while_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        match dispatch(&manager, IpcRequest::GetServerInfo).await {
            IpcResponse::ServerInfo { status } => {
                assert!(!status.running);
                assert!(status.url.is_empty());
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_select_save_dir() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let target = dir.path().join("inbox");
        std::fs::create_dir(&target).unwrap();

        let resp = dispatch(&manager, IpcRequest::SelectSaveDir { path: None }).await;
        assert_eq!(resp, IpcResponse::SaveDir { path: None });

        let resp = dispatch(
            &manager,
            IpcRequest::SelectSaveDir {
                path: Some(target.clone()),
            },
        )
        .await;
        assert_eq!(resp, IpcResponse::SaveDir { path: Some(target.clone()) });
        assert_eq!(manager.status().save_dir, target);

        let resp = dispatch(
            &manager,
            IpcRequest::SelectSaveDir {
                path: Some(dir.path().join("missing")),
            },
        )
        .await;
        assert!(matches!(resp, IpcResponse::Error { .. }));
        assert_eq!(manager.status().save_dir, target);
    }

    #[tokio::test]
    async fn test_dispatch_set_lang() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        match dispatch(&manager, IpcRequest::SetLang { lang: Lang::En }).await {
            IpcResponse::ServerInfo { status } => assert_eq!(status.lang, Lang::En),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_request_gets_error_line() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let (client, server) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let task = tokio::spawn(async move {
            handle_client(&manager, server_read, server_write).await
        });

        let (client_read, mut client_write) = tokio::io::split(client);
        let mut lines = BufReader::new(client_read).lines();
        client_write.write_all(b"not json\n").await.unwrap();
        let line = lines.next_line().await.unwrap().unwrap();
        let resp: IpcResponse = serde_json::from_str(&line).unwrap();
        assert!(matches!(resp, IpcResponse::Error { .. }));

        client_write
            .write_all(b"{\"type\":\"get_upload_history\"}\n")
            .await
            .unwrap();
        let line = lines.next_line().await.unwrap().unwrap();
        let resp: IpcResponse = serde_json::from_str(&line).unwrap();
        assert_eq!(resp, IpcResponse::UploadHistory { records: vec![] });

        drop(client_write);
        drop(lines);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let (client, server) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let task = {
            let manager = manager.clone();
            tokio::spawn(async move { handle_client(&manager, server_read, server_write).await })
        };

        let (client_read, mut client_write) = tokio::io::split(client);
        let mut lines = BufReader::new(client_read).lines();
        client_write
            .write_all(b"{\"type\":\"subscribe\"}\n")
            .await
            .unwrap();
        let line = lines.next_line().await.unwrap().unwrap();
        assert_eq!(serde_json::from_str::<IpcResponse>(&line).unwrap(), IpcResponse::Ok);

        manager.bus().publish(ServerEvent::UploadCompleted);
        let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(line, r#"{"type":"event","name":"upload:completed"}"#);

        drop(client_write);
        drop(lines);
        task.await.unwrap().unwrap();
    }
}
