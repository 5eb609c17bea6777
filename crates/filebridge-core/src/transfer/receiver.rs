//! 上传接收
//!
//! 单个上传请求的完整处理流程:
//! 1. 把文件内容流式写入保存目录中的隐藏临时文件
//! 2. 读取完毕后刷盘，确定不冲突的最终文件名
//! 3. 在阻塞线程池中以不覆盖的方式重命名到最终文件名
//! 4. 追加历史记录并发布 `upload:completed`
//!
//! 任何一步失败（磁盘满、客户端断开、服务器关闭）都会删除临时文件，
//! 不会产生历史记录或通知。

use crate::config::Lang;
use crate::error::TransferError;
use crate::events::{NotificationBus, ServerEvent};
use crate::history::{HistoryStore, UploadRecord};
use crate::server::SharedState;
use crate::transfer::naming::{candidate_names, sanitize_file_name};
use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use chrono::Utc;
use log::{debug, info};
use parking_lot::RwLock;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// 临时文件前缀（隐藏文件）
pub const TEMP_PREFIX: &str = ".filebridge-";
/// 临时文件后缀
pub const TEMP_SUFFIX: &str = ".part";

/// 上传处理器共享的上下文
pub(crate) struct UploadContext {
    pub(crate) state: Arc<RwLock<SharedState>>,
    pub(crate) history: Arc<HistoryStore>,
    pub(crate) bus: NotificationBus,
    /// 关闭宽限期结束时触发，中止仍在进行的上传
    pub(crate) cancel: CancellationToken,
    pub(crate) host_name: String,
    pub(crate) max_upload_size: u64,
}

impl UploadContext {
    fn save_dir(&self) -> PathBuf {
        self.state.read().config.save_dir.clone()
    }

    pub(crate) fn lang(&self) -> Lang {
        self.state.read().config.lang
    }
}

/// 正在写入的临时文件，drop 时自动删除
struct PartialUpload {
    temp: NamedTempFile,
    file: tokio::fs::File,
    written: u64,
}

impl PartialUpload {
    fn create(dir: &Path) -> io::Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(dir)?;
        let file = tokio::fs::File::from_std(temp.as_file().try_clone()?);
        Ok(Self {
            temp,
            file,
            written: 0,
        })
    }

    async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes).await?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await
    }

    /// 关闭写入句柄，交出临时文件和已写入的字节数
    fn into_parts(self) -> (NamedTempFile, u64) {
        let Self {
            temp,
            file,
            written,
        } = self;
        drop(file);
        (temp, written)
    }
}

/// 以不覆盖的方式重命名为第一个空闲的候选文件名
///
/// 阻塞调用，在 `spawn_blocking` 中执行。
fn persist_unique(
    mut temp: NamedTempFile,
    dir: &Path,
    name: &str,
) -> Result<PathBuf, TransferError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }

    for candidate in candidate_names(name) {
        let path = dir.join(&candidate);
        match temp.persist_noclobber(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!("{:?} already exists, trying next name", path);
                temp = e.file;
            }
            Err(e) => return Err(TransferError::Io(e.error)),
        }
    }
    Err(TransferError::NamesExhausted(name.to_string()))
}

fn join_error(e: tokio::task::JoinError) -> TransferError {
    TransferError::Io(io::Error::other(e))
}

fn body_error(e: MultipartError) -> TransferError {
    TransferError::Body {
        status: e.status(),
        message: e.body_text(),
    }
}

/// 处理一个 multipart 上传请求
pub(crate) async fn receive_upload(
    ctx: &UploadContext,
    mut multipart: Multipart,
) -> Result<UploadRecord, TransferError> {
    let save_dir = std::path::absolute(ctx.save_dir())?;
    tokio::fs::create_dir_all(&save_dir).await?;

    let mut pending: Option<(String, PartialUpload)> = None;

    loop {
        let next = tokio::select! {
            next = multipart.next_field() => next.map_err(body_error)?,
            () = ctx.cancel.cancelled() => return Err(TransferError::Cancelled),
        };
        let Some(mut field) = next else { break };

        let Some(raw_name) = field.file_name().map(str::to_owned) else {
            debug!("Ignoring form field {:?}", field.name());
            continue;
        };
        if pending.is_some() {
            return Err(TransferError::MultipleFiles);
        }

        let name = sanitize_file_name(&raw_name);
        debug!("Receiving {:?} (sent as {:?}) into {:?}", name, raw_name, save_dir);

        let mut part = PartialUpload::create(&save_dir)?;
        loop {
            let chunk = tokio::select! {
                chunk = field.chunk() => chunk.map_err(body_error)?,
                () = ctx.cancel.cancelled() => return Err(TransferError::Cancelled),
            };
            match chunk {
                Some(bytes) => part.write(&bytes).await?,
                None => break,
            }
        }
        part.finish().await?;
        pending = Some((name, part));
    }

    let (name, part) = pending.ok_or(TransferError::MissingFile)?;
    let (temp, size) = part.into_parts();

    // 内容已完整收到，即使请求在此之后被丢弃也要完成命名和记录
    let history = ctx.history.clone();
    let bus = ctx.bus.clone();
    let completion = tokio::spawn(async move {
        let fallback_name = name.clone();
        let save_path =
            tokio::task::spawn_blocking(move || persist_unique(temp, &save_dir, &name))
                .await
                .map_err(join_error)??;

        let record = UploadRecord {
            file_name: save_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(fallback_name),
            size,
            timestamp: Utc::now(),
            save_path,
        };
        info!("File saved: {:?} ({} bytes)", record.save_path, record.size);

        if let Err(e) = history.append(record.clone()).await {
            debug!("History kept in memory only: {}", e);
        }
        bus.publish(ServerEvent::UploadCompleted);
        Ok::<_, TransferError>(record)
    });

    completion.await.map_err(join_error)?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_persist_skips_taken_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("note.txt"), b"old").unwrap();

        let mut part = PartialUpload::create(dir.path()).unwrap();
        part.write(b"new contents").await.unwrap();
        part.finish().await.unwrap();
        let (temp, size) = part.into_parts();
        assert_eq!(size, 12);

        let target = dir.path().to_path_buf();
        let path = tokio::task::spawn_blocking(move || persist_unique(temp, &target, "note.txt"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(path, dir.path().join("note (1).txt"));
        assert_eq!(std::fs::read(&path).unwrap(), b"new contents");
        assert_eq!(std::fs::read(dir.path().join("note.txt")).unwrap(), b"old");
        assert_eq!(entries(dir.path()), ["note (1).txt", "note.txt"]);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }
    }

    #[tokio::test]
    async fn test_dropped_partial_upload_is_removed() {
        let dir = tempfile::tempdir().unwrap();

        let mut part = PartialUpload::create(dir.path()).unwrap();
        part.write(&[7u8; 4096]).await.unwrap();
        let names = entries(dir.path());
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with(TEMP_PREFIX));
        assert!(names[0].ends_with(TEMP_SUFFIX));

        drop(part);
        assert!(entries(dir.path()).is_empty());
    }
}
