//! handlers/instance_handler.rs
//! Aprovisionamiento de instancias UAZAPI: creación, QR de conexión y
//! webhook de cambios de estado.

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use log::{info, warn};
use serde_json::{json, Map, Value};

use crate::handlers::{err_json, require_claims};
use crate::models::instance_model::{CreateInstanceRequest, InstanceCreated, InstanceQuery};
use crate::services::auth_service::AuthService;
use crate::services::instance_service::{sha256_hex, InstanceService};
use crate::services::uazapi_service::UazapiService;

/// Token master de la UAZAPI sacado de los claims del usuario.
fn master_token(claims: &Value) -> Option<String> {
    claims
        .get("token")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn claims_tenant(claims: &Value) -> String {
    for key in ["tenant", "email"] {
        if let Some(s) = claims.get(key).and_then(Value::as_str) {
            let s = s.trim();
            if !s.is_empty() {
                return s.to_string();
            }
        }
    }
    "default".to_string()
}

/// POST /api/uaz/instance
/// Crea la instancia en el host indicado y guarda el registro local con
/// el hash del token.
pub async fn create_instance_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    uazapi: web::Data<UazapiService>,
    instances: web::Data<InstanceService>,
    body: web::Json<CreateInstanceRequest>,
) -> HttpResponse {
    let claims = match require_claims(&req, &auth) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let token = match master_token(&claims) {
        Some(t) => t,
        None => return err_json(StatusCode::BAD_REQUEST, "Token Uazapi ausente no usuário"),
    };
    let tenant = claims_tenant(&claims);

    let mut payload = Map::new();
    if let Some(name) = body.display_name.as_deref().filter(|s| !s.trim().is_empty()) {
        payload.insert("name".into(), json!(name));
    }
    if let Some(hook) = body.webhook_url.as_deref().filter(|s| !s.trim().is_empty()) {
        payload.insert("webhook".into(), json!(hook));
    }

    let reply = match uazapi
        .instance_create(&body.host, &token, &Value::Object(payload))
        .await
    {
        Ok(r) => r,
        Err(e) => {
            return err_json(
                StatusCode::BAD_GATEWAY,
                &format!("Erro de rede em /instance/create: {}", e),
            )
        }
    };
    if reply.is_error() {
        let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
        return err_json(status, &reply.body);
    }
    let data = reply.json().unwrap_or_else(|_| json!({}));
    let instance = ["instance", "id", "name"]
        .iter()
        .filter_map(|k| data.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string);
    let instance = match instance {
        Some(i) => i,
        None => {
            return err_json(
                StatusCode::BAD_GATEWAY,
                "Resposta inesperada da Uazapi (sem instance)",
            )
        }
    };

    if let Err(e) = instances
        .save(&tenant, &body.host, &instance, &sha256_hex(&token), "CREATED")
        .await
    {
        warn!("Error guardando instancia {}: {:?}", instance, e);
    }

    HttpResponse::Ok().json(InstanceCreated {
        instance,
        status: "CREATED".to_string(),
    })
}

/// GET /api/uaz/instance/qr?instance=&host=
/// Respuesta normalizada para el front: { status, qr_data }.
pub async fn instance_qr_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    uazapi: web::Data<UazapiService>,
    query: web::Query<InstanceQuery>,
) -> HttpResponse {
    let claims = match require_claims(&req, &auth) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let token = match master_token(&claims) {
        Some(t) => t,
        None => return err_json(StatusCode::BAD_REQUEST, "Token Uazapi ausente no usuário"),
    };

    let reply = match uazapi
        .instance_qr(&query.host, &token, &query.instance)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            return err_json(
                StatusCode::BAD_GATEWAY,
                &format!("Erro de rede em /instance/qr: {}", e),
            )
        }
    };
    if reply.is_error() {
        let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
        return err_json(status, &reply.body);
    }
    let data = reply.json().unwrap_or_else(|_| json!({}));
    let status = data
        .get("status")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("UNKNOWN");
    let qr = data
        .get("qr")
        .or_else(|| data.get("qrcode"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    HttpResponse::Ok().json(json!({ "status": status, "qr_data": qr }))
}

/// GET /api/uaz/instance/status?instance=&host=
pub async fn instance_status_by_name_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    uazapi: web::Data<UazapiService>,
    query: web::Query<InstanceQuery>,
) -> HttpResponse {
    let claims = match require_claims(&req, &auth) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let token = match master_token(&claims) {
        Some(t) => t,
        None => return err_json(StatusCode::BAD_REQUEST, "Token Uazapi ausente no usuário"),
    };

    let reply = match uazapi
        .instance_status_by_name(&query.host, &token, &query.instance)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            return err_json(
                StatusCode::BAD_GATEWAY,
                &format!("Erro de rede em /instance/status: {}", e),
            )
        }
    };
    if reply.is_error() {
        let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
        return err_json(status, &reply.body);
    }
    match reply.json() {
        Ok(v) => HttpResponse::Ok().json(v),
        Err(_) => err_json(
            StatusCode::BAD_GATEWAY,
            "Resposta inválida da UAZAPI em /instance/status",
        ),
    }
}

/// POST /api/uaz/webhook
/// Eventos de la UAZAPI para actualizar el estado sin polling:
/// { event: "connected"|"onScan"|"disconnected", instance, ... }.
pub async fn instance_webhook_endpoint(
    instances: web::Data<InstanceService>,
    body: web::Json<Value>,
) -> HttpResponse {
    let payload = body.into_inner();
    let instance = payload
        .get("instance")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();
    let event = payload.get("event").and_then(Value::as_str).unwrap_or("");

    if !instance.is_empty() {
        let status = match event {
            "connected" => Some("CONNECTED"),
            "onScan" => Some("QRCODE"),
            "disconnected" => Some("DISCONNECTED"),
            _ => None,
        };
        if let Some(status) = status {
            if event == "onScan" {
                info!("Instancia {}: qr_available", instance);
            }
            match instances.update_status(&instance, status).await {
                Ok(0) => warn!("Webhook para instancia desconocida: {}", instance),
                Ok(_) => {}
                Err(e) => warn!("Error actualizando instancia {}: {:?}", instance, e),
            }
        }
    }

    HttpResponse::Ok().json(json!({ "ok": true }))
}
