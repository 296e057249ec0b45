use actix_web::{HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::models::chat::SUPPORTED_MODELS;

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

/// GET /api/models. Fixed, order-stable enumeration of the model ids the
/// validator accepts.
pub async fn list_models() -> impl Responder {
    HttpResponse::Ok().json(ModelsResponse {
        models: SUPPORTED_MODELS.iter().map(|m| m.to_string()).collect(),
    })
}
