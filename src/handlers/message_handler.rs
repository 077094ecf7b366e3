//! handlers/message_handler.rs
//! Proxy de /message/find con clasificación instantánea de la
//! transcripción y persistencia best-effort del histórico.

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use log::warn;
use serde_json::{json, Value};

use crate::handlers::{err_json, instance_scope, require_gateway_ctx};
use crate::services::auth_service::AuthService;
use crate::services::message_store_service::MessageStoreService;
use crate::services::stage_service::classify_transcript;
use crate::services::uazapi_service::{normalize_items, UazapiService};

fn int_or(body: &Value, key: &str, default: i64) -> i64 {
    let n = body.get(key).and_then(|v| {
        v.as_i64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    });
    match n {
        Some(0) | None => default,
        Some(v) => v,
    }
}

/// POST /api/messages
/// Devuelve la transcripción normalizada más la etapa calculada con la
/// misma regla que usa el frontend.
pub async fn find_messages_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    uazapi: web::Data<UazapiService>,
    store: web::Data<MessageStoreService>,
    raw_body: web::Bytes,
) -> HttpResponse {
    let (claims, ctx) = match require_gateway_ctx(&req, &auth) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body: Value = match serde_json::from_slice(&raw_body) {
        Ok(Value::Object(map)) => Value::Object(map),
        _ => return err_json(StatusCode::BAD_REQUEST, "Body inválido"),
    };

    let chatid = match body.get("chatid") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return err_json(StatusCode::BAD_REQUEST, "chatid é obrigatório"),
    };

    let sort = body
        .get("sort")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("-messageTimestamp");
    let payload = json!({
        "chatid": chatid,
        "limit": int_or(&body, "limit", 200),
        "offset": int_or(&body, "offset", 0),
        "sort": sort,
    });

    let reply = match uazapi.message_find(&ctx.host, &ctx.token, &payload).await {
        Ok(r) => r,
        Err(e) => {
            return err_json(
                StatusCode::BAD_GATEWAY,
                &format!("Erro de rede em /message/find: {}", e),
            )
        }
    };
    if reply.is_error() {
        let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
        return err_json(status, &reply.body);
    }
    let data = match reply.json() {
        Ok(d) => d,
        Err(_) => {
            return err_json(
                StatusCode::BAD_GATEWAY,
                "Resposta inválida da UAZAPI em /message/find",
            )
        }
    };

    let items = normalize_items(&data, "messages");
    let stage = classify_transcript(&items);

    // El histórico se guarda fuera del camino de la respuesta.
    let scope = instance_scope(&claims, &ctx);
    let store = store.get_ref().clone();
    let chatid_store = chatid.clone();
    let items_store = items.clone();
    tokio::spawn(async move {
        if let Err(e) = store.bulk_upsert(&scope, &chatid_store, &items_store).await {
            warn!("Error guardando historial de mensajes: {:?}", e);
        }
    });

    HttpResponse::Ok().json(json!({ "items": items, "stage": stage }))
}
