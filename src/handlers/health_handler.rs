//! handlers/health_handler.rs
//! Endpoints de diagnóstico básicos.

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::config::app_config::AppConfig;

/// GET /
pub async fn root_endpoint() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "ok": true,
        "service": "luna-backend",
        "version": "1.0.0",
    }))
}

/// GET /api/health
/// Incluye los orígenes CORS permitidos para facilitar el diagnóstico
/// desde el frontend.
pub async fn health_endpoint(config: web::Data<AppConfig>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "ok": true,
        "origins": config.origins(),
    }))
}
