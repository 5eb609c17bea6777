//! 服务器生命周期管理
//!
//! [`ServerManager`] 是“服务器是否在运行”的唯一权威，独占配置和监听器句柄。
//! 所有修改（启动、停止、切换目录、切换语言）都在同一把互斥锁内串行执行；
//! 状态读取只复制快照，不会等待网络 I/O。

use crate::config::{ConfigStore, Configuration, Lang};
use crate::error::{InvalidDirectoryError, StartupError};
use crate::events::{NotificationBus, ServerEvent};
use crate::history::{HistoryStore, UploadRecord};
use crate::net;
use crate::transfer::http_server;
use crate::transfer::receiver::UploadContext;
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 默认单次上传上限 (2 GiB)
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 2 << 30;
/// 默认关闭宽限期
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
/// 中止上传后等待连接关闭的时间
const ABORT_WAIT: Duration = Duration::from_secs(2);

/// 状态快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub running: bool,
    /// 连接地址，未运行时为空
    pub url: String,
    pub port: u16,
    #[serde(rename = "lanIP")]
    pub lan_ip: String,
    pub save_dir: PathBuf,
    pub lang: Lang,
}

/// 服务器选项
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// 监听地址
    pub bind_ip: IpAddr,
    /// 停止时等待进行中上传的时间
    pub shutdown_grace: Duration,
    /// 单次上传的最大字节数
    pub max_upload_size: u64,
    /// 本次运行使用的端口，优先于配置中的端口且不会被保存
    pub port_override: Option<u16>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            port_override: None,
        }
    }
}

/// 目录选择器（系统原生对话框等）
///
/// 返回 `None` 表示用户取消。
pub trait DirectoryPicker {
    fn pick_directory(&self, current: &Path) -> Option<PathBuf>;
}

impl<F> DirectoryPicker for F
where
    F: Fn(&Path) -> Option<PathBuf>,
{
    fn pick_directory(&self, current: &Path) -> Option<PathBuf> {
        self(current)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Endpoint {
    lan_ip: Ipv4Addr,
    port: u16,
    generation: u64,
}

/// 管理器与上传处理器共享的状态
pub(crate) struct SharedState {
    pub(crate) config: Configuration,
    endpoint: Option<Endpoint>,
}

struct RunningServer {
    shutdown_tx: oneshot::Sender<()>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// 服务器生命周期管理器
pub struct ServerManager {
    store: ConfigStore,
    state: Arc<RwLock<SharedState>>,
    /// 串行化所有修改操作
    control: Mutex<Option<RunningServer>>,
    generation: AtomicU64,
    config_in_memory_only: AtomicBool,
    history: Arc<HistoryStore>,
    bus: NotificationBus,
    options: ServerOptions,
    host_name: String,
}

impl ServerManager {
    /// 从配置文件加载配置并创建管理器
    pub fn new(store: ConfigStore, history: Arc<HistoryStore>, options: ServerOptions) -> Self {
        let config = store.load();
        Self::with_config(store, config, history, options)
    }

    pub fn with_config(
        store: ConfigStore,
        config: Configuration,
        history: Arc<HistoryStore>,
        options: ServerOptions,
    ) -> Self {
        Self {
            store,
            state: Arc::new(RwLock::new(SharedState {
                config,
                endpoint: None,
            })),
            control: Mutex::new(None),
            generation: AtomicU64::new(0),
            config_in_memory_only: AtomicBool::new(false),
            history,
            bus: NotificationBus::new(),
            options,
            host_name: default_host_name(),
        }
    }

    /// 当前配置快照
    pub fn config(&self) -> Configuration {
        self.state.read().config.clone()
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    /// 订阅 `upload:completed` 等事件
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.bus.subscribe()
    }

    /// 最近的上传记录（最新在前）
    pub fn upload_history(&self) -> Vec<UploadRecord> {
        self.history.list()
    }

    /// 当前状态快照
    pub fn status(&self) -> ServerStatus {
        let state = self.state.read();
        let config = &state.config;
        match state.endpoint {
            Some(ep) => ServerStatus {
                running: true,
                url: format!("http://{}:{}/?lang={}", ep.lan_ip, ep.port, config.lang),
                port: ep.port,
                lan_ip: ep.lan_ip.to_string(),
                save_dir: config.save_dir.clone(),
                lang: config.lang,
            },
            None => ServerStatus {
                running: false,
                url: String::new(),
                port: 0,
                lan_ip: String::new(),
                save_dir: config.save_dir.clone(),
                lang: config.lang,
            },
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.read().endpoint.is_some()
    }

    /// 启动服务器
    ///
    /// 已在运行时直接返回当前状态。绑定失败时保持停止状态。
    pub async fn start(&self) -> Result<ServerStatus, StartupError> {
        let mut control = self.control.lock().await;
        if control.is_some() {
            debug!("Server already running");
            return Ok(self.status());
        }

        let (preferred_port, save_dir) = {
            let state = self.state.read();
            (
                self.options.port_override.unwrap_or(state.config.port),
                state.config.save_dir.clone(),
            )
        };
        let resolved = net::resolve(preferred_port);
        let listener = bind_listener(self.options.bind_ip, resolved.port).await?;
        let port = listener
            .local_addr()
            .map_err(StartupError::LocalAddr)?
            .port();

        if let Err(e) = std::fs::create_dir_all(&save_dir) {
            warn!("Failed to create save directory {:?}: {}", save_dir, e);
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();
        let ctx = Arc::new(UploadContext {
            state: self.state.clone(),
            history: self.history.clone(),
            bus: self.bus.clone(),
            cancel: cancel.clone(),
            host_name: self.host_name.clone(),
            max_upload_size: self.options.max_upload_size,
        });
        let app = http_server::router(ctx);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = self.state.clone();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
            // 监听器已关闭；只清除本次启动写入的地址
            let mut shared = state.write();
            if shared.endpoint.is_some_and(|ep| ep.generation == generation) {
                shared.endpoint = None;
            }
        });

        self.state.write().endpoint = Some(Endpoint {
            lan_ip: resolved.lan_ip,
            port,
            generation,
        });
        *control = Some(RunningServer {
            shutdown_tx,
            cancel,
            handle,
        });

        let status = self.status();
        info!("HTTP server listening on {}:{}", self.options.bind_ip, port);
        info!("Upload URL: {}", status.url);
        Ok(status)
    }

    /// 停止服务器
    ///
    /// 先停止接受新连接，给进行中的上传一个宽限期；
    /// 超时后中止剩余上传并丢弃其临时文件。
    pub async fn stop(&self) {
        let mut control = self.control.lock().await;
        let Some(RunningServer {
            shutdown_tx,
            cancel,
            mut handle,
        }) = control.take()
        else {
            return;
        };

        let _ = shutdown_tx.send(());
        self.state.write().endpoint = None;

        let grace = self.options.shutdown_grace;
        debug!("Waiting up to {:?} for in-flight uploads", grace);
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            warn!("Shutdown grace period elapsed, aborting in-flight uploads");
            cancel.cancel();
            if tokio::time::timeout(ABORT_WAIT, &mut handle).await.is_err() {
                handle.abort();
            }
        }
        cancel.cancel();
        info!("HTTP server stopped");
    }

    /// 切换保存目录
    ///
    /// 目录必须存在且可写（用测试文件探测），否则不修改任何状态。
    pub async fn set_save_dir(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<PathBuf, InvalidDirectoryError> {
        let _control = self.control.lock().await;
        let dir = validate_save_dir(path.as_ref())?;

        let config = {
            let mut state = self.state.write();
            state.config.save_dir = dir.clone();
            state.config.clone()
        };
        self.persist(&config);
        info!("Save directory set to {:?}", dir);
        Ok(dir)
    }

    /// 通过目录选择器切换保存目录，取消时返回 `Ok(None)`
    pub async fn select_save_dir<P>(
        &self,
        picker: &P,
    ) -> Result<Option<PathBuf>, InvalidDirectoryError>
    where
        P: DirectoryPicker + ?Sized,
    {
        let current = self.state.read().config.save_dir.clone();
        match picker.pick_directory(&current) {
            Some(dir) => self.set_save_dir(dir).await.map(Some),
            None => {
                debug!("Directory selection cancelled");
                Ok(None)
            }
        }
    }

    /// 切换语言，下次读取状态时生效（不会重启监听器）
    pub async fn set_lang(&self, lang: Lang) {
        let _control = self.control.lock().await;
        let config = {
            let mut state = self.state.write();
            state.config.lang = lang;
            state.config.clone()
        };
        self.persist(&config);
        debug!("Language set to {}", lang);
    }

    fn persist(&self, config: &Configuration) {
        if self.config_in_memory_only.load(Ordering::Relaxed) {
            return;
        }
        if let Err(e) = self.store.save(config) {
            warn!(
                "Failed to save settings, keeping them in memory for this session: {}",
                e
            );
            self.config_in_memory_only.store(true, Ordering::Relaxed);
        }
    }
}

/// 绑定监听器，指定端口失败时改用任意空闲端口重试一次
async fn bind_listener(ip: IpAddr, port: u16) -> Result<TcpListener, StartupError> {
    let addr = SocketAddr::new(ip, port);
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(e) if port != 0 => {
            warn!("Failed to bind {}: {}, retrying with any free port", addr, e);
            let any = SocketAddr::new(ip, 0);
            TcpListener::bind(any)
                .await
                .map_err(|source| StartupError::Bind { addr: any, source })
        }
        Err(source) => Err(StartupError::Bind { addr, source }),
    }
}

fn validate_save_dir(path: &Path) -> Result<PathBuf, InvalidDirectoryError> {
    let meta = std::fs::metadata(path)
        .map_err(|_| InvalidDirectoryError::NotFound(path.to_path_buf()))?;
    if !meta.is_dir() {
        return Err(InvalidDirectoryError::NotADirectory(path.to_path_buf()));
    }

    let probe = || -> io::Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix(".filebridge-probe-")
            .tempfile_in(path)?;
        file.write_all(b"probe")?;
        file.flush()
    };
    probe().map_err(|source| InvalidDirectoryError::NotWritable {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()))
}

fn default_host_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "FileBridge".to_string())
}
