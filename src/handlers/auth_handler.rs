//! handlers/auth_handler.rs
//! Login por instance token de la UAZAPI y consulta del JWT vigente.

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use log::error;

use crate::handlers::{err_json, require_claims};
use crate::models::auth_model::{LoginRequest, LoginResponse};
use crate::services::auth_service::AuthService;

/// POST /api/auth/login
/// Recibe el instance token del cliente y emite un JWT para el resto
/// de las rutas.
pub async fn login_endpoint(
    auth: web::Data<AuthService>,
    req_body: web::Json<LoginRequest>,
) -> HttpResponse {
    let body = req_body.into_inner();
    let instance_token = body.token.trim();
    if instance_token.is_empty() {
        return err_json(StatusCode::BAD_REQUEST, "Informe o token da instância");
    }

    let label = body.label.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let number_hint = body
        .number_hint
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match auth.issue_instance_jwt(instance_token, label, number_hint) {
        Ok(jwt) => HttpResponse::Ok().json(LoginResponse {
            jwt,
            profile: serde_json::json!({
                "label": label,
                "number_hint": number_hint,
            }),
        }),
        Err(e) => {
            error!("Error firmando JWT: {:?}", e);
            err_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Falha ao assinar token: {}", e),
            )
        }
    }
}

/// GET /api/auth/me
/// Devuelve el payload del JWT tal cual (útil para debug del frontend).
pub async fn me_endpoint(req: HttpRequest, auth: web::Data<AuthService>) -> HttpResponse {
    match require_claims(&req, &auth) {
        Ok(claims) => HttpResponse::Ok().json(claims),
        Err(resp) => resp,
    }
}
