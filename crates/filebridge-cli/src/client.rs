//! IPC Client - 与守护进程通信

use anyhow::{Result, bail};
use filebridge_core::ipc::socket_path;
use filebridge_core::{IpcRequest, IpcResponse};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

/// 与守护进程的一条连接
pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    pub async fn connect() -> Result<Self> {
        let path = socket_path();

        let stream = match UnixStream::connect(&path).await {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ 无法连接到守护进程: {}", e);
                eprintln!("   请确保 filebridge-daemon 正在运行");
                eprintln!("   运行: cargo xtask dev");
                return Err(e.into());
            }
        };

        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    pub async fn send(&mut self, request: &IpcRequest) -> Result<()> {
        let json = serde_json::to_string(request)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }

    /// 读取下一行响应，连接关闭时返回 `None`
    pub async fn next_response(&mut self) -> Result<Option<IpcResponse>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&line)?))
    }
}

/// 发送一个请求并等待响应，守护进程返回错误时转为 `Err`
pub async fn send_request(request: IpcRequest) -> Result<IpcResponse> {
    let mut conn = Connection::connect().await?;
    conn.send(&request).await?;

    match conn.next_response().await? {
        Some(IpcResponse::Error { message }) => bail!(message),
        Some(response) => Ok(response),
        None => bail!("守护进程关闭了连接"),
    }
}
