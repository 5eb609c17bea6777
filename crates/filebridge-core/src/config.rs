//! 应用配置和持久化
//!
//! 保存目录、界面语言、端口和历史记录上限的存储和读取。

use crate::error::PersistenceError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// 配置文件名
pub const SETTINGS_FILE: &str = "settings.toml";
/// 历史记录文件名（与配置文件同目录）
pub const HISTORY_FILE: &str = "history.json";
/// 默认保留的历史记录条数
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// 界面语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Ja,
    En,
}

impl Lang {
    /// 获取语言代码（用于 URL 查询参数）
    pub fn code(self) -> &'static str {
        match self {
            Lang::Ja => "ja",
            Lang::En => "en",
        }
    }

    /// 从语言代码解析，未知代码返回 `None`
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "ja" => Some(Lang::Ja),
            "en" => Some(Lang::En),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown language '{0}' (expected 'ja' or 'en')")]
pub struct UnknownLang(pub String);

impl FromStr for Lang {
    type Err = UnknownLang;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lang::from_code(s).ok_or_else(|| UnknownLang(s.to_string()))
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// 应用配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// 接收文件的保存目录
    pub save_dir: PathBuf,
    /// 界面语言（影响连接 URL 的 lang 参数）
    pub lang: Lang,
    /// 监听端口，0 表示自动选择空闲端口
    pub port: u16,
    /// 历史记录上限
    pub history_limit: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            lang: Lang::default(),
            port: 0,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl Configuration {
    /// 将无效字段替换为默认值
    fn normalized(mut self) -> Self {
        if self.save_dir.as_os_str().is_empty() {
            self.save_dir = default_save_dir();
        }
        if self.history_limit == 0 {
            self.history_limit = DEFAULT_HISTORY_LIMIT;
        }
        self
    }
}

/// 默认保存目录: ~/Downloads/FileBridge
pub fn default_save_dir() -> PathBuf {
    dirs::download_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("FileBridge")
}

/// 默认配置目录: ~/.config/filebridge
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filebridge")
}

/// 配置文件存储
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 使用指定配置目录下的 settings.toml
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 加载配置（文件不存在或损坏时使用默认值）
    pub fn load(&self) -> Configuration {
        if !self.path.exists() {
            debug!("No settings at {:?}, using defaults", self.path);
            return Configuration::default();
        }
        match fs::read_to_string(&self.path) {
            Ok(content) => match toml::from_str::<Configuration>(&content) {
                Ok(config) => {
                    debug!("Loaded settings from {:?}", self.path);
                    config.normalized()
                }
                Err(e) => {
                    warn!("Failed to parse settings: {}, using defaults", e);
                    Configuration::default()
                }
            },
            Err(e) => {
                warn!("Failed to read settings file: {}, using defaults", e);
                Configuration::default()
            }
        }
    }

    /// 同步保存配置（先写临时文件再重命名）
    pub fn save(&self, config: &Configuration) -> Result<(), PersistenceError> {
        let content = toml::to_string_pretty(config)?;
        write_atomically(&self.path, content.as_bytes())?;
        debug!("Saved settings to {:?}", self.path);
        Ok(())
    }
}

/// 写入同目录临时文件后重命名，读者不会看到写了一半的文件
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), PersistenceError> {
    let io_err = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        io_err(e)
    })
}
