//! handlers/mod.rs
//! Módulo que agrupa los distintos handlers (auth, chats, CRM, pagos, etc.)
//! y los helpers HTTP que comparten.

pub mod auth_handler;
pub mod billing_handler;
pub mod chat_handler;
pub mod crm_handler;
pub mod health_handler;
pub mod instance_handler;
pub mod media_handler;
pub mod message_handler;
pub mod meta_handler;
pub mod payment_handler;
pub mod realtime_handler;
pub mod send_handler;
pub mod stage_handler;
pub mod user_handler;

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse};
use serde_json::{json, Value};

use crate::models::auth_model::GatewayCtx;
use crate::services::auth_service::AuthService;

/// Extrae el token del header `Authorization: Bearer <jwt>`.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    let header = req.headers().get("Authorization")?.to_str().ok()?;
    let rest = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))?;
    let token = rest.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Cuerpo de error uniforme de la API.
pub fn err_json(status: StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(json!({
        "success": false,
        "error": message,
    }))
}

/// Exige un JWT válido y devuelve sus claims decodificados.
pub fn require_claims(req: &HttpRequest, auth: &AuthService) -> Result<Value, HttpResponse> {
    let token = match bearer_token(req) {
        Some(t) => t,
        None => return Err(err_json(StatusCode::UNAUTHORIZED, "Token ausente")),
    };
    auth.decode(&token)
        .map_err(|e| err_json(StatusCode::UNAUTHORIZED, &e.to_string()))
}

/// Claims + contexto para hablar con la UAZAPI (host y token de instancia).
pub fn require_gateway_ctx(
    req: &HttpRequest,
    auth: &AuthService,
) -> Result<(Value, GatewayCtx), HttpResponse> {
    let claims = require_claims(req, auth)?;
    let ctx = auth
        .gateway_ctx(&claims)
        .map_err(|msg| err_json(StatusCode::UNAUTHORIZED, msg))?;
    Ok((claims, ctx))
}

/// Identificador de alcance para las tablas locales (lead_status, crm, ...).
/// Prefiere un id explícito del claim; como último recurso usa el token de
/// instancia, que es estable durante la vida del tenant. El sub genérico
/// del JWT no sirve como alcance.
pub fn claims_scope(claims: &Value) -> Option<String> {
    for key in ["instance_id", "phone_number_id", "pnid", "token", "instance_token"] {
        if let Some(v) = claims.get(key).and_then(|v| v.as_str()) {
            let v = v.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }
    None
}

pub fn instance_scope(claims: &Value, ctx: &GatewayCtx) -> String {
    claims_scope(claims).unwrap_or_else(|| ctx.token.clone())
}

/// Extrae el id numérico de un claim `sub` con formato "user:<id>".
pub fn require_user_id(claims: &Value) -> Result<i64, HttpResponse> {
    let sub = claims.get("sub").and_then(|v| v.as_str()).unwrap_or("");
    if let Some(raw) = sub.strip_prefix("user:") {
        if let Ok(id) = raw.parse::<i64>() {
            return Ok(id);
        }
    }
    Err(err_json(
        StatusCode::UNAUTHORIZED,
        "Token inválido: sem usuário",
    ))
}
