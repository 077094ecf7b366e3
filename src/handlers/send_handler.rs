//! handlers/send_handler.rs
//! Envíos salientes (texto, media, botones, listas) detrás del gate de
//! facturación. El body viaja tal cual a la UAZAPI.

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::warn;
use serde_json::Value;

use crate::handlers::{err_json, instance_scope, require_gateway_ctx};
use crate::models::send_model::{SendButtons, SendList, SendMedia, SendText};
use crate::services::auth_service::AuthService;
use crate::services::billing_service::BillingService;
use crate::services::lead_status_service::LeadStatusService;
use crate::services::uazapi_service::UazapiService;

const PAYWALL_MSG: &str =
    "Assinatura inativa. Acesse /pagamentos/getnet para assinar/regularizar.";

#[allow(clippy::too_many_arguments)]
async fn relay_send(
    req: &HttpRequest,
    auth: &AuthService,
    billing: &BillingService,
    uazapi: &UazapiService,
    leads: &LeadStatusService,
    kind: &str,
    number: &str,
    payload: Value,
) -> HttpResponse {
    let (claims, ctx) = match require_gateway_ctx(req, auth) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match billing.is_active_for_claims(&claims).await {
        Ok(true) => {}
        Ok(false) => return err_json(StatusCode::PAYMENT_REQUIRED, PAYWALL_MSG),
        Err(e) => {
            return err_json(
                StatusCode::SERVICE_UNAVAILABLE,
                &format!("Billing indisponível: {}", e),
            )
        }
    }

    let reply = match uazapi.send(&ctx.host, &ctx.token, kind, &payload).await {
        Ok(r) => r,
        Err(e) => {
            return err_json(
                StatusCode::BAD_GATEWAY,
                &format!("Erro de rede em /send/{}: {}", kind, e),
            )
        }
    };
    if reply.is_error() {
        let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
        return err_json(status, &reply.body);
    }
    let resp_json = match reply.json() {
        Ok(v) => v,
        Err(_) => {
            return err_json(
                StatusCode::BAD_GATEWAY,
                &format!("Resposta inválida da UAZAPI em /send/{}", kind),
            )
        }
    };

    // Marca la salida sin tocar la etapa del funil.
    let scope = instance_scope(&claims, &ctx);
    if let Err(e) = leads
        .touch_outgoing(&scope, number, Utc::now().timestamp_millis())
        .await
    {
        warn!("Error registrando envío saliente: {:?}", e);
    }

    HttpResponse::Ok().json(resp_json)
}

/// POST /api/send-text
pub async fn send_text_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    billing: web::Data<BillingService>,
    uazapi: web::Data<UazapiService>,
    leads: web::Data<LeadStatusService>,
    body: web::Json<SendText>,
) -> HttpResponse {
    let body = body.into_inner();
    let number = body.number.clone();
    let payload = serde_json::to_value(&body).unwrap_or(Value::Null);
    relay_send(&req, &auth, &billing, &uazapi, &leads, "text", &number, payload).await
}

/// POST /api/send-media
pub async fn send_media_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    billing: web::Data<BillingService>,
    uazapi: web::Data<UazapiService>,
    leads: web::Data<LeadStatusService>,
    body: web::Json<SendMedia>,
) -> HttpResponse {
    let body = body.into_inner();
    let number = body.number.clone();
    let payload = serde_json::to_value(&body).unwrap_or(Value::Null);
    relay_send(&req, &auth, &billing, &uazapi, &leads, "media", &number, payload).await
}

/// POST /api/send-buttons
pub async fn send_buttons_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    billing: web::Data<BillingService>,
    uazapi: web::Data<UazapiService>,
    leads: web::Data<LeadStatusService>,
    body: web::Json<SendButtons>,
) -> HttpResponse {
    let body = body.into_inner();
    let number = body.number.clone();
    let payload = serde_json::to_value(&body).unwrap_or(Value::Null);
    relay_send(&req, &auth, &billing, &uazapi, &leads, "buttons", &number, payload).await
}

/// POST /api/send-list
pub async fn send_list_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    billing: web::Data<BillingService>,
    uazapi: web::Data<UazapiService>,
    leads: web::Data<LeadStatusService>,
    body: web::Json<SendList>,
) -> HttpResponse {
    let body = body.into_inner();
    let number = body.number.clone();
    let payload = serde_json::to_value(&body).unwrap_or(Value::Null);
    relay_send(&req, &auth, &billing, &uazapi, &leads, "list", &number, payload).await
}
