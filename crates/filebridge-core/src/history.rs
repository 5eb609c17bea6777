//! 上传历史记录
//!
//! 按完成顺序保存最近的上传记录（最新在前），超过上限时淘汰最旧的。
//! 每次追加后写入磁盘；读取只复制内存快照，不做任何 I/O。

use crate::config::write_atomically;
use crate::error::PersistenceError;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// 一次完成的上传
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    /// 最终保存的文件名（可能带有去重后缀）
    pub file_name: String,
    /// 写入的字节数
    pub size: u64,
    /// 完成时间
    pub timestamp: DateTime<Utc>,
    /// 文件的绝对路径
    pub save_path: PathBuf,
}

/// 有上限的历史记录存储
pub struct HistoryStore {
    path: Option<PathBuf>,
    capacity: usize,
    records: RwLock<VecDeque<UploadRecord>>,
    /// 串行化追加与落盘
    writer: Mutex<()>,
    in_memory_only: AtomicBool,
}

impl HistoryStore {
    /// 不落盘的存储
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            path: None,
            capacity: capacity.max(1),
            records: RwLock::new(VecDeque::new()),
            writer: Mutex::new(()),
            in_memory_only: AtomicBool::new(true),
        }
    }

    /// 从文件加载（文件不存在或损坏时从空记录开始）
    pub fn load(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let capacity = capacity.max(1);
        let mut records = read_records(&path);
        records.truncate(capacity);

        Self {
            path: Some(path),
            capacity,
            records: RwLock::new(records),
            writer: Mutex::new(()),
            in_memory_only: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 是否因写入失败而退化为纯内存模式
    pub fn is_degraded(&self) -> bool {
        self.path.is_some() && self.in_memory_only.load(Ordering::Relaxed)
    }

    /// 最新在前的快照
    pub fn list(&self) -> Vec<UploadRecord> {
        self.records.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// 追加一条记录并落盘
    ///
    /// 内存中的记录总会更新；返回的错误只表示这次未能写入磁盘，
    /// 之后的追加不再尝试写盘。
    pub async fn append(&self, record: UploadRecord) -> Result<(), PersistenceError> {
        let _guard = self.writer.lock().await;

        let snapshot = {
            let mut records = self.records.write();
            records.push_front(record);
            records.truncate(self.capacity);
            records.iter().cloned().collect::<Vec<_>>()
        };

        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if self.in_memory_only.load(Ordering::Relaxed) {
            return Ok(());
        }

        let result = match serde_json::to_vec_pretty(&snapshot) {
            Ok(json) => {
                let target = path.clone();
                tokio::task::spawn_blocking(move || write_atomically(&target, &json))
                    .await
                    .unwrap_or_else(|e| {
                        Err(PersistenceError::Io {
                            path: path.clone(),
                            source: std::io::Error::other(e),
                        })
                    })
            }
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => {
                debug!("History saved ({} records)", snapshot.len());
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Failed to persist upload history, keeping it in memory only: {}",
                    e
                );
                self.in_memory_only.store(true, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}

fn read_records(path: &Path) -> VecDeque<UploadRecord> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return VecDeque::new(),
        Err(e) => {
            warn!("Failed to read history file {:?}: {}", path, e);
            return VecDeque::new();
        }
    };
    match serde_json::from_slice::<Vec<UploadRecord>>(&content) {
        Ok(records) => {
            debug!("Loaded {} history records from {:?}", records.len(), path);
            records.into()
        }
        Err(e) => {
            warn!("Corrupt history file {:?}: {}, starting empty", path, e);
            VecDeque::new()
        }
    }
}
