//! handlers/chat_handler.rs
//! Listado paginado de chats vía /chat/find de la UAZAPI, con etapa de
//! funil resuelta por chat (banco → cache → transcripción).

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use bytes::Bytes;
use futures_util::StreamExt;
use log::warn;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::handlers::{err_json, instance_scope, require_gateway_ctx};
use crate::models::chat_model::{
    ChatsQuery, DEFAULT_MAX_TOTAL, DEFAULT_PAGE_SIZE, MAX_MAX_TOTAL, MAX_PAGE_SIZE,
};
use crate::services::auth_service::AuthService;
use crate::services::classify_service::ClassifyService;
use crate::services::crm_service::CrmService;
use crate::services::stage_service::last_msg_ts_of;
use crate::services::uazapi_service::{normalize_items, UazapiService};

/// Misma concurrencia que usa el gateway para clasificar transcripciones.
const CLASSIFY_CONCURRENCY: usize = 16;

/// Primer identificador utilizable del item de chat.
pub fn pick_chatid(item: &Value) -> String {
    for key in ["wa_chatid", "chatid", "wa_fastid", "id"] {
        if let Some(s) = item.get(key).and_then(Value::as_str) {
            if !s.is_empty() {
                return s.to_string();
            }
        }
    }
    String::new()
}

/// El body del caller se respeta tal cual; sin body (o con un objeto
/// vacío) se consulta todo ordenado por último mensaje.
fn base_payload(raw: &[u8]) -> Value {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(raw) {
        if !map.is_empty() {
            return Value::Object(map);
        }
    }
    json!({ "operator": "AND", "sort": "-wa_lastMsgTimestamp" })
}

fn page_payload(base: &Value, page_size: i64, offset: i64) -> Value {
    let mut payload = base.clone();
    if let Value::Object(ref mut map) = payload {
        map.insert("limit".into(), json!(page_size));
        map.insert("offset".into(), json!(offset));
    }
    payload
}

fn clamp(v: Option<i64>, default: i64, max: i64) -> i64 {
    v.unwrap_or(default).clamp(1, max)
}

fn ndjson_line(v: &Value) -> Bytes {
    let mut line = v.to_string();
    line.push('\n');
    Bytes::from(line)
}

/// POST /api/chats?classify=&page_size=&max_total=
/// Respuesta única: acumula páginas de /chat/find hasta max_total.
pub async fn find_chats_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    uazapi: web::Data<UazapiService>,
    classify_svc: web::Data<ClassifyService>,
    crm: web::Data<CrmService>,
    query: web::Query<ChatsQuery>,
    raw_body: web::Bytes,
) -> HttpResponse {
    let (claims, ctx) = match require_gateway_ctx(&req, &auth) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let classify = query.classify.unwrap_or(true);
    let page_size = clamp(query.page_size, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
    let max_total = clamp(query.max_total, DEFAULT_MAX_TOTAL, MAX_MAX_TOTAL);
    let base = base_payload(&raw_body);

    let mut items: Vec<Value> = Vec::new();
    let mut offset: i64 = 0;
    while (items.len() as i64) < max_total {
        let payload = page_payload(&base, page_size, offset);
        let reply = match uazapi.chat_find(&ctx.host, &ctx.token, &payload).await {
            Ok(r) => r,
            Err(e) => {
                return err_json(
                    StatusCode::BAD_GATEWAY,
                    &format!("Erro de rede em /chat/find: {}", e),
                )
            }
        };
        if reply.is_error() {
            let status =
                StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
            return err_json(status, &reply.body);
        }
        let data = match reply.json() {
            Ok(d) => d,
            Err(_) => {
                return err_json(
                    StatusCode::BAD_GATEWAY,
                    "Resposta inválida da UAZAPI em /chat/find",
                )
            }
        };
        let chunk = normalize_items(&data, "chats");
        if chunk.is_empty() {
            break;
        }
        let chunk_len = chunk.len() as i64;
        items.extend(chunk);
        if chunk_len < page_size {
            break;
        }
        offset += page_size;
    }
    items.truncate(max_total as usize);

    if classify && !items.is_empty() {
        let scope = instance_scope(&claims, &ctx);
        let jobs = items.iter().enumerate().map(|(idx, item)| {
            let svc = classify_svc.get_ref().clone();
            let host = ctx.host.clone();
            let token = ctx.token.clone();
            let scope = scope.clone();
            let chatid = pick_chatid(item);
            let last_ts = last_msg_ts_of(item);
            async move {
                if chatid.is_empty() {
                    return (idx, chatid, None);
                }
                let stage = svc
                    .stage_for_chat(&host, &token, &scope, &chatid, last_ts)
                    .await;
                (idx, chatid, stage)
            }
        });
        let results: Vec<(usize, String, Option<String>)> =
            futures_util::stream::iter(jobs)
                .buffer_unordered(CLASSIFY_CONCURRENCY)
                .collect()
                .await;
        for (idx, chatid, stage) in results {
            if let Some(stage) = stage {
                if let Some(obj) = items[idx].as_object_mut() {
                    obj.insert("_stage".into(), json!(stage));
                    obj.insert("stage".into(), json!(stage));
                }
                // El espejo en el tablero CRM es best-effort.
                if let Err(e) = crm.set_stage_internal(&scope, &chatid, &stage).await {
                    warn!("Error reflejando etapa en CRM: {:?}", e);
                }
            }
        }
    }

    HttpResponse::Ok().json(json!({ "items": items }))
}

/// POST /api/chats/stream?page_size=&max_total=
/// Igual que /api/chats pero emitiendo NDJSON a medida que cada chat
/// queda clasificado. Un error corta el stream con una línea {"error"}.
pub async fn stream_chats_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    uazapi: web::Data<UazapiService>,
    classify_svc: web::Data<ClassifyService>,
    crm: web::Data<CrmService>,
    query: web::Query<ChatsQuery>,
    raw_body: web::Bytes,
) -> HttpResponse {
    let (claims, ctx) = match require_gateway_ctx(&req, &auth) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let page_size = clamp(query.page_size, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
    let max_total = clamp(query.max_total, DEFAULT_MAX_TOTAL, MAX_MAX_TOTAL);
    let base = base_payload(&raw_body);
    let scope = instance_scope(&claims, &ctx);

    let uazapi = uazapi.get_ref().clone();
    let classify_svc = classify_svc.get_ref().clone();
    let crm = crm.get_ref().clone();
    let host = ctx.host.clone();
    let token = ctx.token.clone();

    // El task produce Bytes pelados; el Result que pide actix se agrega
    // recién en el adaptador del stream, fuera del spawn.
    let (tx, rx) = mpsc::channel::<Bytes>(32);
    tokio::spawn(async move {
        let mut count: i64 = 0;
        let mut offset: i64 = 0;
        'pages: while count < max_total {
            let payload = page_payload(&base, page_size, offset);
            let reply = match uazapi.chat_find(&host, &token, &payload).await {
                Ok(r) => r,
                Err(e) => {
                    let line = json!({ "error": format!("Erro de rede em /chat/find: {}", e) });
                    let _ = tx.send(ndjson_line(&line)).await;
                    return;
                }
            };
            if reply.is_error() {
                let _ = tx.send(ndjson_line(&json!({ "error": reply.body }))).await;
                return;
            }
            let data = match reply.json() {
                Ok(d) => d,
                Err(_) => {
                    let line = json!({ "error": "Resposta inválida da UAZAPI em /chat/find" });
                    let _ = tx.send(ndjson_line(&line)).await;
                    return;
                }
            };
            let chunk = normalize_items(&data, "chats");
            if chunk.is_empty() {
                break;
            }
            let chunk_len = chunk.len() as i64;

            let jobs = chunk.into_iter().map(|mut item| {
                let svc = classify_svc.clone();
                let crm = crm.clone();
                let host = host.clone();
                let token = token.clone();
                let scope = scope.clone();
                async move {
                    let chatid = pick_chatid(&item);
                    if !chatid.is_empty() {
                        let last_ts = last_msg_ts_of(&item);
                        if let Some(stage) = svc
                            .stage_for_chat(&host, &token, &scope, &chatid, last_ts)
                            .await
                        {
                            if let Some(obj) = item.as_object_mut() {
                                obj.insert("_stage".into(), json!(stage));
                                obj.insert("stage".into(), json!(stage));
                            }
                            if let Err(e) = crm.set_stage_internal(&scope, &chatid, &stage).await
                            {
                                warn!("Error reflejando etapa en CRM: {:?}", e);
                            }
                        }
                    }
                    item
                }
            });
            let mut done =
                futures_util::stream::iter(jobs).buffer_unordered(CLASSIFY_CONCURRENCY);
            while let Some(item) = done.next().await {
                if tx.send(ndjson_line(&item)).await.is_err() {
                    // El cliente cortó la conexión.
                    return;
                }
                count += 1;
                if count >= max_total {
                    break 'pages;
                }
            }

            if chunk_len < page_size {
                break;
            }
            offset += page_size;
        }
    });

    HttpResponse::Ok()
        .content_type("application/x-ndjson")
        .streaming(ReceiverStream::new(rx).map(Ok::<_, actix_web::Error>))
}
