//! 文件接收
//!
//! 包含:
//! - HTTP 路由（上传页面和上传接口）
//! - 上传接收流程（流式写入、原子重命名、去重）
//! - 文件名清理
//! - 手机端上传页面

pub mod http_server;
pub mod naming;
pub mod page;
pub mod receiver;

pub use naming::{candidate_names, sanitize_file_name};
pub use page::render_upload_page;
