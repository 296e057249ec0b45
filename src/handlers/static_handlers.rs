use actix_web::{web, HttpResponse};
use std::path::{Component, Path};

use crate::config::AppSettings;
use crate::error::{AppError, AppResult};
use crate::utils::mime_utils::content_type_for_path;

/// GET /
pub async fn index(settings: web::Data<AppSettings>) -> AppResult<HttpResponse> {
    serve_asset(&settings.server.static_dir, "index.html").await
}

/// GET /{path}
pub async fn asset(
    settings: web::Data<AppSettings>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    serve_asset(&settings.server.static_dir, &path.into_inner()).await
}

pub(crate) async fn serve_asset(static_dir: &str, rel: &str) -> AppResult<HttpResponse> {
    let path = Path::new(rel);

    // Only plain relative paths below the static dir are servable.
    let is_plain = !rel.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if !is_plain {
        return Err(AppError::NotFound(format!("no such asset: {}", rel)));
    }

    match tokio::fs::read(Path::new(static_dir).join(path)).await {
        Ok(bytes) => Ok(HttpResponse::Ok()
            .content_type(content_type_for_path(rel))
            .body(bytes)),
        Err(_) => Err(AppError::NotFound(format!("no such asset: {}", rel))),
    }
}
