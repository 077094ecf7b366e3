//! handlers/crm_handler.rs
//! Tablero CRM por instancia: vistas, listado, alta/baja de etapa y
//! sincronización inicial contra la UAZAPI.

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use log::error;
use serde_json::{json, Value};

use crate::handlers::chat_handler::pick_chatid;
use crate::handlers::{claims_scope, err_json, instance_scope, require_claims, require_gateway_ctx};
use crate::models::crm_model::{
    CrmDeleteQuery, CrmItemQuery, CrmListQuery, CrmSyncRequest, STAGES,
};
use crate::services::auth_service::AuthService;
use crate::services::crm_service::{is_valid_stage, normalize_chatid, CrmService};
use crate::services::uazapi_service::{normalize_items, UazapiService};

fn require_board_scope(
    req: &HttpRequest,
    auth: &AuthService,
) -> Result<String, HttpResponse> {
    let claims = require_claims(req, auth)?;
    claims_scope(&claims)
        .ok_or_else(|| err_json(StatusCode::UNAUTHORIZED, "JWT sem instance_id"))
}

fn db_error(e: anyhow::Error) -> HttpResponse {
    error!("Error de base CRM: {:?}", e);
    err_json(StatusCode::INTERNAL_SERVER_ERROR, "Falha ao acessar o CRM")
}

/// GET /api/crm/views
pub async fn crm_views_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    crm: web::Data<CrmService>,
) -> HttpResponse {
    let scope = match require_board_scope(&req, &auth) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match crm.views_counts(&scope).await {
        Ok(counts) => HttpResponse::Ok().json(json!({ "counts": counts, "stages": STAGES })),
        Err(e) => db_error(e),
    }
}

/// GET /api/crm/list?stage=&q=&limit=&offset=
pub async fn crm_list_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    crm: web::Data<CrmService>,
    query: web::Query<CrmListQuery>,
) -> HttpResponse {
    let scope = match require_board_scope(&req, &auth) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let stage = query.stage.trim();
    if !is_valid_stage(stage) {
        return err_json(
            StatusCode::BAD_REQUEST,
            &format!("Estágio inválido: {}", stage),
        );
    }
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let offset = query.offset.unwrap_or(0).max(0);
    match crm.list(&scope, stage, query.q.as_deref(), limit, offset).await {
        Ok((items, total)) => HttpResponse::Ok().json(json!({
            "items": items,
            "total": total,
            "stage": stage,
        })),
        Err(e) => db_error(e),
    }
}

/// GET /api/crm/item?chatid=
/// Sin registro guardado devuelve un default en etapa "lead".
pub async fn crm_item_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    crm: web::Data<CrmService>,
    query: web::Query<CrmItemQuery>,
) -> HttpResponse {
    let scope = match require_board_scope(&req, &auth) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match crm.get_item(&scope, query.chatid.trim()).await {
        Ok(Some(item)) => HttpResponse::Ok().json(item),
        Ok(None) => HttpResponse::Ok().json(json!({
            "chatid": query.chatid,
            "stage": "lead",
            "notes": "",
            "updated_at": 0,
        })),
        Err(e) => db_error(e),
    }
}

/// POST /api/crm/status { chatid|wa_chatid|number, stage, notes?, meta? }
pub async fn crm_set_status_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    crm: web::Data<CrmService>,
    body: web::Json<Value>,
) -> HttpResponse {
    let scope = match require_board_scope(&req, &auth) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let payload = body.into_inner();

    let stage = payload
        .get("stage")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();
    if !is_valid_stage(&stage) {
        return err_json(
            StatusCode::BAD_REQUEST,
            &format!("Estágio inválido: {}", stage),
        );
    }

    let raw_id = payload
        .get("chatid")
        .or_else(|| payload.get("wa_chatid"))
        .or_else(|| payload.get("number"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let chatid = normalize_chatid(raw_id);
    if chatid.is_empty() {
        return err_json(
            StatusCode::BAD_REQUEST,
            "chatid/wa_chatid/number é obrigatório",
        );
    }

    let notes = payload.get("notes").and_then(Value::as_str).unwrap_or("");
    let meta = payload.get("meta").cloned().unwrap_or_else(|| json!({}));

    match crm.set_status(&scope, &chatid, &stage, notes, &meta).await {
        Ok(item) => HttpResponse::Ok().json(json!({ "ok": true, "item": item })),
        Err(e) => db_error(e),
    }
}

/// DELETE /api/crm/status?chatid=
pub async fn crm_clear_status_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    crm: web::Data<CrmService>,
    query: web::Query<CrmDeleteQuery>,
) -> HttpResponse {
    let scope = match require_board_scope(&req, &auth) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match crm.delete(&scope, query.chatid.trim()).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "ok": true, "chatid": query.chatid })),
        Err(e) => db_error(e),
    }
}

/// POST /api/crm/sync { limit_per_page?, max_total?, sort? }
/// Pagina /chat/find y crea como "lead" los chats que el tablero aún
/// no conoce. Nunca modifica registros existentes.
pub async fn crm_sync_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    crm: web::Data<CrmService>,
    uazapi: web::Data<UazapiService>,
    raw_body: web::Bytes,
) -> HttpResponse {
    let (claims, ctx) = match require_gateway_ctx(&req, &auth) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let scope = instance_scope(&claims, &ctx);
    let body: CrmSyncRequest = serde_json::from_slice(&raw_body).unwrap_or_default();
    let limit_per_page = body.limit_per_page.max(1);
    let max_total = body.max_total;

    let mut created = 0i64;
    let mut total_fetched = 0i64;
    let mut offset = 0i64;

    while total_fetched < max_total {
        let payload = json!({
            "operator": "AND",
            "sort": body.sort,
            "limit": limit_per_page,
            "offset": offset,
        });
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
            let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
            return err_json(
                status,
                &format!(
                    "Falha ao obter lista de chats da UAZAPI para sincronização: {}",
                    reply.body
                ),
            );
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
        let items = normalize_items(&data, "chats");
        if items.is_empty() {
            break;
        }

        let chatids: Vec<String> = items
            .iter()
            .map(|c| normalize_chatid(&pick_chatid(c)))
            .filter(|c| !c.is_empty())
            .collect();
        match crm.create_missing(&scope, &chatids).await {
            Ok(n) => created += n,
            Err(e) => return db_error(e),
        }

        let fetched = items.len() as i64;
        total_fetched += fetched;
        offset += limit_per_page;
        if fetched < limit_per_page {
            break;
        }
    }

    let total = match crm.board_size(&scope).await {
        Ok(n) => n,
        Err(e) => return db_error(e),
    };
    HttpResponse::Ok().json(json!({
        "ok": true,
        "created": created,
        "total": total,
        "fetched": total_fetched,
    }))
}
