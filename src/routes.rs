use actix_web::web;

use crate::handlers;

/// Route layout: JSON API under /api, a health check, then the static
/// client as a GET catch-all.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/health").route(web::get().to(handlers::health::health_check)),
    );
    cfg.service(
        web::scope("/api")
            .route("/models", web::get().to(handlers::model_handlers::list_models))
            .route("/chat", web::post().to(handlers::chat_handlers::chat)),
    );
    cfg.service(web::resource("/").route(web::get().to(handlers::static_handlers::index)));
    cfg.service(
        web::resource("/{path:.*}").route(web::get().to(handlers::static_handlers::asset)),
    );
}
