//! HTTP 路由
//!
//! - `GET /`, `GET /upload` 手机端上传页面（`?lang=ja|en`）
//! - `POST /api/upload` 单文件 multipart 上传

use crate::config::Lang;
use crate::error::TransferError;
use crate::transfer::page::render_upload_page;
use crate::transfer::receiver::{UploadContext, receive_upload};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State, multipart::MultipartRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::warn;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct PageQuery {
    pub lang: Option<String>,
}

pub(crate) fn router(ctx: Arc<UploadContext>) -> Router {
    let body_limit = usize::try_from(ctx.max_upload_size).unwrap_or(usize::MAX);

    Router::new()
        .route("/", get(page_handler))
        .route("/upload", get(page_handler))
        .route("/api/upload", post(upload_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(ctx)
}

/// 上传页面处理器
///
/// 未指定语言时使用当前配置的语言，无法识别的语言回退到日语。
async fn page_handler(
    Query(query): Query<PageQuery>,
    State(ctx): State<Arc<UploadContext>>,
) -> Html<String> {
    let lang = match query.lang.as_deref() {
        Some(code) => Lang::from_code(code).unwrap_or_default(),
        None => ctx.lang(),
    };
    Html(render_upload_page(lang, &ctx.host_name))
}

/// 上传处理器
async fn upload_handler(
    State(ctx): State<Arc<UploadContext>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => {
            return error_response(&TransferError::NotMultipart(rejection.body_text()));
        }
    };

    match receive_upload(&ctx, multipart).await {
        Ok(record) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "file": record,
            })),
        )
            .into_response(),
        Err(e) => {
            warn!("Upload failed: {}", e);
            error_response(&e)
        }
    }
}

fn error_response(e: &TransferError) -> Response {
    (e.status(), Json(serde_json::json!({ "error": e.to_string() }))).into_response()
}
