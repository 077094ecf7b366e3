//! handlers/realtime_handler.rs
//! Proxy SSE hacia la UAZAPI. El JWT viaja por header; acá se inyecta
//! el token de instancia en la query que espera el gateway.

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::StreamExt;

use crate::handlers::{err_json, require_gateway_ctx};
use crate::models::meta_model::SseQuery;
use crate::services::auth_service::AuthService;
use crate::services::uazapi_service::UazapiService;

const DEFAULT_EVENTS: &str = "chats,messages,messages_update";

/// GET /api/sse?events=
/// Uso en el front: new EventSource(`${BACK}/api/sse?events=messages`).
pub async fn sse_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    uazapi: web::Data<UazapiService>,
    query: web::Query<SseQuery>,
) -> HttpResponse {
    let (_claims, ctx) = match require_gateway_ctx(&req, &auth) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let events = query
        .events
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_EVENTS);

    let resp = match uazapi.sse_stream(&ctx.host, &ctx.token, events).await {
        Ok(r) => r,
        Err(e) => {
            return err_json(
                StatusCode::BAD_GATEWAY,
                &format!("Erro de rede em /sse: {}", e),
            )
        }
    };

    let status = resp.status().as_u16();
    if status >= 400 {
        let body = resp.text().await.unwrap_or_default();
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
        return err_json(status, &body);
    }

    let stream = resp
        .bytes_stream()
        .map(|chunk| chunk.map_err(actix_web::error::ErrorInternalServerError));

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream)
}
