//! handlers/billing_handler.rs
//! Alta de trial y consulta de estado de la suscripción. Las cuentas
//! admin (bypass por env) siempre responden activas sin tocar el banco.

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::{json, Value};

use crate::handlers::{err_json, require_claims};
use crate::services::auth_service::AuthService;
use crate::services::billing_service::BillingService;

fn admin_status() -> Value {
    json!({
        "ok": true,
        "billing_key": null,
        "status": { "active": true, "plan": "admin", "admin_bypass": true },
    })
}

fn resolve_key(billing: &BillingService, claims: &Value) -> Result<String, HttpResponse> {
    match billing.billing_key_from_claims(claims) {
        Ok(Some(key)) => Ok(key),
        Ok(None) => Err(err_json(
            StatusCode::UNAUTHORIZED,
            "JWT inválido: sem token/host/email/sub",
        )),
        Err(e) => Err(err_json(
            StatusCode::SERVICE_UNAVAILABLE,
            &format!("Billing indisponível: {}", e),
        )),
    }
}

/// POST /api/billing/register-trial
/// Idempotente: si el tenant no existe arranca el trial; si ya existe
/// sólo devuelve el estado.
pub async fn register_trial_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    billing: web::Data<BillingService>,
) -> HttpResponse {
    let claims = match require_claims(&req, &auth) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if billing.is_admin_bypass(&claims) {
        return HttpResponse::Ok().json(admin_status());
    }
    let bkey = match resolve_key(&billing, &claims) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    let exists = billing
        .get_status(&bkey)
        .await
        .map(|st| st.exists)
        .unwrap_or(false);
    if !exists {
        // Si el alta falla, el estado se relee abajo igual.
        let _ = billing.ensure_trial(&bkey).await;
    }

    match billing.get_status(&bkey).await {
        Ok(st) => HttpResponse::Ok().json(json!({
            "ok": true,
            "billing_key": bkey,
            "status": st,
        })),
        Err(e) => err_json(
            StatusCode::SERVICE_UNAVAILABLE,
            &format!("Billing indisponível: {}", e),
        ),
    }
}

/// GET /api/billing/status
pub async fn billing_status_endpoint(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    billing: web::Data<BillingService>,
) -> HttpResponse {
    let claims = match require_claims(&req, &auth) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if billing.is_admin_bypass(&claims) {
        return HttpResponse::Ok().json(admin_status());
    }
    let bkey = match resolve_key(&billing, &claims) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match billing.get_status(&bkey).await {
        Ok(st) => HttpResponse::Ok().json(json!({
            "ok": true,
            "billing_key": bkey,
            "status": st,
        })),
        Err(e) => err_json(
            StatusCode::SERVICE_UNAVAILABLE,
            &format!("Billing indisponível: {}", e),
        ),
    }
}
