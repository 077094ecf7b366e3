//! handlers/media_handler.rs
//! Proxy de descarga de medios (ruta pública, el frontend no puede
//! pegarle directo al CDN de WhatsApp por CORS) y resolución de la URL
//! de un adjunto a partir del mensaje crudo.

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::{json, Value};

use crate::handlers::{err_json, require_gateway_ctx};
use crate::models::meta_model::MediaProxyQuery;
use crate::services::auth_service::AuthService;
use crate::services::uazapi_service::UazapiService;

fn pick_path<'a>(m: &'a Value, paths: &[&str]) -> Option<&'a str> {
    for p in paths {
        let v = if p.starts_with('/') {
            m.pointer(p)
        } else {
            m.get(*p)
        };
        if let Some(s) = v.and_then(Value::as_str) {
            if !s.is_empty() {
                return Some(s);
            }
        }
    }
    None
}

/// GET /api/media/proxy?u=
/// Sin auth: el navegador la usa como src de <img>/<video>.
pub async fn media_proxy_endpoint(
    uazapi: web::Data<UazapiService>,
    query: web::Query<MediaProxyQuery>,
) -> HttpResponse {
    let u = query.u.trim();
    if !u.starts_with("http://") && !u.starts_with("https://") {
        return err_json(StatusCode::BAD_REQUEST, "URL inválida");
    }
    match uazapi.fetch_media(u).await {
        Ok((status, content_type, bytes)) => {
            if status >= 400 {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                return err_json(status, "Falha ao baixar mídia");
            }
            HttpResponse::Ok().content_type(content_type).body(bytes)
        }
        Err(e) => err_json(StatusCode::BAD_GATEWAY, &format!("proxy erro: {}", e)),
    }
}

/// POST /api/media/resolve
/// Primero intenta leer url/dataUrl directo del mensaje; si no hay,
/// consulta /media/resolve de la UAZAPI (por id y después con el
/// mensaje completo).
pub async fn media_resolve_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    uazapi: web::Data<UazapiService>,
    body: web::Json<Value>,
) -> HttpResponse {
    let (_claims, ctx) = match require_gateway_ctx(&req, &auth) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let m = body.into_inner();

    let mime = pick_path(
        &m,
        &[
            "mimetype",
            "mime",
            "/message/imageMessage/mimetype",
            "/message/videoMessage/mimetype",
            "/message/documentMessage/mimetype",
            "/message/audioMessage/mimetype",
            "/message/stickerMessage/mimetype",
        ],
    )
    .unwrap_or("")
    .to_string();
    let url = pick_path(
        &m,
        &[
            "mediaUrl",
            "url",
            "fileUrl",
            "downloadUrl",
            "image",
            "video",
            "/message/imageMessage/url",
            "/message/videoMessage/url",
            "/message/documentMessage/url",
            "/message/audioMessage/url",
            "/message/stickerMessage/url",
        ],
    )
    .unwrap_or("")
    .to_string();
    let data_url = pick_path(
        &m,
        &[
            "dataUrl",
            "/message/imageMessage/dataUrl",
            "/message/videoMessage/dataUrl",
            "/message/stickerMessage/dataUrl",
        ],
    )
    .unwrap_or("")
    .to_string();

    if !url.is_empty() || !data_url.is_empty() {
        return HttpResponse::Ok().json(json!({
            "url": url,
            "mime": mime,
            "dataUrl": data_url,
        }));
    }

    let media_id = pick_path(
        &m,
        &[
            "mediaId",
            "/message/documentMessage/mediaKey",
            "/message/imageMessage/mediaKey",
            "/message/videoMessage/mediaKey",
            "/message/audioMessage/mediaKey",
            "/message/stickerMessage/mediaKey",
        ],
    )
    .map(String::from);

    if let Some(id) = &media_id {
        if let Ok(reply) = uazapi.media_resolve_by_id(&ctx.host, &ctx.token, id).await {
            if let Some(resp) = accept_resolved(&reply, &mime) {
                return resp;
            }
        }
    }
    if let Ok(reply) = uazapi.media_resolve_message(&ctx.host, &ctx.token, &m).await {
        if let Some(resp) = accept_resolved(&reply, &mime) {
            return resp;
        }
    }

    err_json(StatusCode::NOT_FOUND, "Não foi possível resolver a mídia")
}

/// Acepta la respuesta del gateway sólo si trae una URL o un dataUrl.
fn accept_resolved(
    reply: &crate::services::uazapi_service::UazReply,
    mime_fallback: &str,
) -> Option<HttpResponse> {
    if !(200..300).contains(&reply.status) {
        return None;
    }
    let j = reply.json().ok()?;
    let u2 = pick_path(&j, &["url", "downloadUrl"]).unwrap_or("").to_string();
    let mm = pick_path(&j, &["mime", "mimetype"])
        .unwrap_or(mime_fallback)
        .to_string();
    let d2 = pick_path(&j, &["dataUrl"]).unwrap_or("").to_string();
    if u2.is_empty() && d2.is_empty() {
        return None;
    }
    Some(HttpResponse::Ok().json(json!({
        "url": u2,
        "mime": mm,
        "dataUrl": d2,
    })))
}
