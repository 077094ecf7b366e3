//! handlers/user_handler.rs
//! Cuentas de usuario (registro, login) y vínculos usuario→instancia.

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use log::error;
use serde_json::json;

use crate::handlers::{err_json, require_claims, require_user_id};
use crate::models::user_model::{
    AttachInstanceRequest, DetachInstanceQuery, RegisterRequest, UserLoginRequest,
};
use crate::services::auth_service::AuthService;
use crate::services::user_service::UserService;

/// POST /api/users/register
pub async fn register_endpoint(
    users: web::Data<UserService>,
    auth: web::Data<AuthService>,
    req_body: web::Json<RegisterRequest>,
) -> HttpResponse {
    let body = req_body.into_inner();
    let user = match users.create_user(&body.email, &body.password).await {
        Ok(Some(u)) => u,
        Ok(None) => return err_json(StatusCode::BAD_REQUEST, "E-mail já cadastrado"),
        Err(e) => {
            error!("Error creando usuario: {:?}", e);
            return err_json(StatusCode::INTERNAL_SERVER_ERROR, "Falha ao criar usuário");
        }
    };
    match auth.issue_user_jwt(user.id, &user.email) {
        Ok(jwt) => HttpResponse::Ok().json(json!({
            "jwt": jwt,
            "profile": { "email": user.email },
        })),
        Err(e) => {
            error!("Error firmando JWT de usuario: {:?}", e);
            err_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Falha ao assinar token: {}", e),
            )
        }
    }
}

/// POST /api/users/login
pub async fn user_login_endpoint(
    users: web::Data<UserService>,
    auth: web::Data<AuthService>,
    req_body: web::Json<UserLoginRequest>,
) -> HttpResponse {
    let body = req_body.into_inner();
    let user = match users.get_user_by_email(&body.email).await {
        Ok(Some(u)) => u,
        Ok(None) => return err_json(StatusCode::UNAUTHORIZED, "Credenciais inválidas"),
        Err(e) => {
            error!("Error buscando usuario: {:?}", e);
            return err_json(StatusCode::INTERNAL_SERVER_ERROR, "Falha ao buscar usuário");
        }
    };
    if !users.verify_password(&body.password, &user.password_hash) {
        return err_json(StatusCode::UNAUTHORIZED, "Credenciais inválidas");
    }
    if let Err(e) = users.touch_last_login(user.id).await {
        error!("Error registrando last_login: {:?}", e);
    }
    match auth.issue_user_jwt(user.id, &user.email) {
        Ok(jwt) => HttpResponse::Ok().json(json!({
            "jwt": jwt,
            "profile": { "email": user.email },
        })),
        Err(e) => {
            error!("Error firmando JWT de usuario: {:?}", e);
            err_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Falha ao assinar token: {}", e),
            )
        }
    }
}

/// POST /api/users/instances
/// Vincula un instance token a la cuenta. Idempotente.
pub async fn attach_instance_endpoint(
    req: HttpRequest,
    users: web::Data<UserService>,
    auth: web::Data<AuthService>,
    req_body: web::Json<AttachInstanceRequest>,
) -> HttpResponse {
    let claims = match require_claims(&req, &auth) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let user_id = match require_user_id(&claims) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let token = req_body.token.trim().to_string();
    if token.len() < 4 {
        return err_json(StatusCode::BAD_REQUEST, "instance_token inválido");
    }
    match users.attach_instance(user_id, &token).await {
        Ok((binding, existing)) => HttpResponse::Ok().json(json!({
            "persisted": true,
            "existing": existing,
            "id": binding.id,
            "user_id": binding.user_id,
            "token": binding.token,
            "created_at": binding.created_at,
        })),
        Err(e) => {
            error!("Error vinculando instancia: {:?}", e);
            err_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Falha ao vincular instância",
            )
        }
    }
}

/// GET /api/users/instances
pub async fn list_instances_endpoint(
    req: HttpRequest,
    users: web::Data<UserService>,
    auth: web::Data<AuthService>,
) -> HttpResponse {
    let claims = match require_claims(&req, &auth) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let user_id = match require_user_id(&claims) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match users.list_instances(user_id).await {
        Ok(items) => HttpResponse::Ok().json(json!({ "items": items })),
        Err(e) => {
            error!("Error listando instancias: {:?}", e);
            err_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Falha ao listar instâncias",
            )
        }
    }
}

/// DELETE /api/users/instances?token=...
pub async fn detach_instance_endpoint(
    req: HttpRequest,
    users: web::Data<UserService>,
    auth: web::Data<AuthService>,
    query: web::Query<DetachInstanceQuery>,
) -> HttpResponse {
    let claims = match require_claims(&req, &auth) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let user_id = match require_user_id(&claims) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match users.detach_instance(user_id, &query.token).await {
        Ok(removed) => HttpResponse::Ok().json(json!({ "ok": true, "removed": removed })),
        Err(e) => {
            error!("Error desvinculando instancia: {:?}", e);
            err_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Falha ao desvincular instância",
            )
        }
    }
}
