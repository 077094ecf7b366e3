//! handlers/meta_handler.rs
//! Proxies de metadatos: estado de instancia, etiquetas y
//! nombre/imagen de un chat.

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::{json, Value};

use crate::handlers::{err_json, require_gateway_ctx};
use crate::models::meta_model::{NameImageBody, NameImageQuery};
use crate::services::auth_service::AuthService;
use crate::services::uazapi_service::{UazReply, UazapiService};

fn relay_json(reply: UazReply, endpoint: &str) -> HttpResponse {
    if reply.is_error() {
        let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
        return err_json(status, &reply.body);
    }
    match reply.json() {
        Ok(v) => HttpResponse::Ok().json(v),
        Err(_) => err_json(
            StatusCode::BAD_GATEWAY,
            &format!("Resposta inválida da UAZAPI em {}", endpoint),
        ),
    }
}

/// GET /api/instance/status
pub async fn instance_status_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    uazapi: web::Data<UazapiService>,
) -> HttpResponse {
    let (_claims, ctx) = match require_gateway_ctx(&req, &auth) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match uazapi.instance_status(&ctx.host, &ctx.token).await {
        Ok(reply) => relay_json(reply, "/instance/status"),
        Err(e) => err_json(
            StatusCode::BAD_GATEWAY,
            &format!("Erro de rede em /instance/status: {}", e),
        ),
    }
}

/// GET /api/labels
pub async fn labels_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    uazapi: web::Data<UazapiService>,
) -> HttpResponse {
    let (_claims, ctx) = match require_gateway_ctx(&req, &auth) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match uazapi.labels(&ctx.host, &ctx.token).await {
        Ok(reply) => relay_json(reply, "/labels"),
        Err(e) => err_json(
            StatusCode::BAD_GATEWAY,
            &format!("Erro de rede em /labels: {}", e),
        ),
    }
}

/// GET /api/chat/name-image?chatid=
/// Normaliza la respuesta a { "name": "...", "imageUrl": "..." }.
pub async fn name_image_get_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    uazapi: web::Data<UazapiService>,
    query: web::Query<NameImageQuery>,
) -> HttpResponse {
    let (_claims, ctx) = match require_gateway_ctx(&req, &auth) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let chatid = query.chatid.trim();
    if chatid.len() < 5 {
        return err_json(StatusCode::BAD_REQUEST, "chatid inválido");
    }
    let reply = match uazapi.name_image_get(&ctx.host, &ctx.token, chatid).await {
        Ok(r) => r,
        Err(e) => {
            return err_json(
                StatusCode::BAD_GATEWAY,
                &format!("Erro de rede em /chat/GetNameAndImageURL: {}", e),
            )
        }
    };
    if reply.is_error() {
        let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
        return err_json(status, &reply.body);
    }
    // Algunas instancias devuelven texto plano; se normaliza a vacío.
    let data = reply.json().unwrap_or_else(|_| json!({}));
    let name = pick_str(&data, &["name", "Name"]);
    let image = pick_str(&data, &["imageUrl", "ImageURL", "url"]);
    HttpResponse::Ok().json(json!({ "name": name, "imageUrl": image }))
}

/// POST /api/chat/name-image { number, preview }
/// Devuelve la respuesta de la UAZAPI sin tocar (id, image,
/// imagePreview, wa_name, ...).
pub async fn name_image_post_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    uazapi: web::Data<UazapiService>,
    body: web::Json<NameImageBody>,
) -> HttpResponse {
    let (_claims, ctx) = match require_gateway_ctx(&req, &auth) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let reply = match uazapi
        .name_image_post(&ctx.host, &ctx.token, &body.number, body.preview)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            return err_json(
                StatusCode::BAD_GATEWAY,
                &format!("Erro ao contatar UAZAPI: {}", e),
            )
        }
    };
    if reply.status != 200 {
        let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
        return err_json(status, &reply.body);
    }
    match reply.json() {
        Ok(v) => HttpResponse::Ok().json(v),
        Err(_) => err_json(
            StatusCode::BAD_GATEWAY,
            "Resposta inválida da UAZAPI em /chat/GetNameAndImageURL",
        ),
    }
}

fn pick_str(data: &Value, keys: &[&str]) -> String {
    for key in keys {
        if let Some(s) = data.get(*key).and_then(Value::as_str) {
            if !s.is_empty() {
                return s.to_string();
            }
        }
    }
    String::new()
}
