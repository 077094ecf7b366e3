//! handlers/stage_handler.rs
//! Cache de etapas por chat (lead_status) y clasificación directa de
//! transcripciones enviadas por el frontend.

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use log::warn;
use serde_json::{json, Map, Value};

use crate::handlers::{bearer_token, claims_scope, err_json};
use crate::models::lead_status_model::{BulkStatusRequest, LeadStatusQuery, StageClassifyRequest};
use crate::services::auth_service::AuthService;
use crate::services::lead_status_service::LeadStatusService;
use crate::services::stage_service::{classify_by_rules, extract_ts, is_from_me};

/// Instancia del caller: claims verificados primero, header
/// x-instance-id como fallback.
fn classify_scope(req: &HttpRequest, auth: &AuthService) -> Option<String> {
    if let Some(token) = bearer_token(req) {
        if let Ok(claims) = auth.decode(&token) {
            if let Some(scope) = claims_scope(&claims) {
                return Some(scope);
            }
        }
    }
    req.headers()
        .get("x-instance-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn require_scope(req: &HttpRequest, auth: &AuthService) -> Result<String, HttpResponse> {
    classify_scope(req, auth)
        .ok_or_else(|| err_json(StatusCode::UNAUTHORIZED, "JWT sem instance_id"))
}

/// GET /api/lead-status?chatid=
pub async fn get_lead_status_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    leads: web::Data<LeadStatusService>,
    query: web::Query<LeadStatusQuery>,
) -> HttpResponse {
    let scope = match require_scope(&req, &auth) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match leads.get(&scope, query.chatid.trim()).await {
        Ok(Some(row)) => {
            let mut out = match serde_json::to_value(&row) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            };
            out.insert("found".into(), json!(true));
            HttpResponse::Ok().json(Value::Object(out))
        }
        Ok(None) => HttpResponse::Ok().json(json!({ "found": false })),
        Err(e) => {
            warn!("Error leyendo lead_status: {:?}", e);
            err_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Falha ao consultar lead_status",
            )
        }
    }
}

fn pick_ids(body: &BulkStatusRequest) -> Value {
    for v in [&body.ids, &body.chatids].into_iter().flatten() {
        match v {
            Value::Null => continue,
            Value::Array(a) if a.is_empty() => continue,
            other => return other.clone(),
        }
    }
    Value::Array(Vec::new())
}

/// POST /api/lead-status/bulk { ids: [...] } o { chatids: [...] }
/// Respuesta: { items: { "<chatid>": { stage, last_msg_ts } } }.
pub async fn bulk_lead_status_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    leads: web::Data<LeadStatusService>,
    body: web::Json<BulkStatusRequest>,
) -> HttpResponse {
    let scope = match require_scope(&req, &auth) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let raw = pick_ids(&body);
    let arr = match raw {
        Value::Array(a) => a,
        _ => return err_json(StatusCode::BAD_REQUEST, "ids/chatids inválido"),
    };
    let mut ids = Vec::with_capacity(arr.len());
    for v in &arr {
        match v.as_str() {
            Some(s) if !s.is_empty() => ids.push(s.to_string()),
            _ => return err_json(StatusCode::BAD_REQUEST, "ids/chatids inválido"),
        }
    }

    let rows = match leads.get_many(&scope, &ids).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Error leyendo lead_status en lote: {:?}", e);
            return err_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Falha ao consultar lead_status",
            );
        }
    };
    let mut items = Map::new();
    for row in rows {
        items.insert(
            row.chatid.clone(),
            json!({ "stage": row.stage, "last_msg_ts": row.last_msg_ts }),
        );
    }
    HttpResponse::Ok().json(json!({ "items": items }))
}

/// POST /api/stage/classify { chatid?, messages: [...] }
/// Devuelve del banco si no hace falta reclasificar; si no, aplica las
/// reglas del tablero y persiste cuando hay chatid.
pub async fn stage_classify_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    leads: web::Data<LeadStatusService>,
    body: web::Json<StageClassifyRequest>,
) -> HttpResponse {
    let scope = match require_scope(&req, &auth) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let body = body.into_inner();
    let chatid = body
        .chatid
        .as_deref()
        .map(str::trim)
        .unwrap_or("")
        .to_string();

    let newest = body.messages.iter().max_by_key(|m| extract_ts(m));
    let last_ts = newest.map(|m| extract_ts(m)).unwrap_or(0);
    let last_from_me = newest.map(is_from_me).unwrap_or(false);

    if !chatid.is_empty() {
        let need = leads
            .should_reclassify(&scope, &chatid, last_ts, Some(last_from_me))
            .await
            .unwrap_or(true);
        if !need {
            if let Ok(Some(row)) = leads.get(&scope, &chatid).await {
                return HttpResponse::Ok().json(json!({
                    "stage": row.stage,
                    "cached": true,
                    "last_msg_ts": row.last_msg_ts,
                }));
            }
        }
    }

    let stage = classify_by_rules(&body.messages);

    if !chatid.is_empty() {
        match leads
            .upsert(&scope, &chatid, stage, last_ts, last_from_me)
            .await
        {
            Ok(rec) => {
                return HttpResponse::Ok().json(json!({
                    "stage": rec.stage,
                    "cached": false,
                    "last_msg_ts": rec.last_msg_ts,
                }))
            }
            Err(e) => warn!("Error persistiendo etapa clasificada: {:?}", e),
        }
    }

    HttpResponse::Ok().json(json!({
        "stage": stage,
        "cached": false,
        "last_msg_ts": last_ts,
    }))
}
