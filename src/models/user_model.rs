//! models/user_model.rs
//! Cuentas de usuario (email + contraseña) y vínculos usuario→instancia.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserLoginRequest {
    pub email: String,
    pub password: String,
}

/// Fila de la tabla `users`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

/// Vínculo (user_id, token) de la tabla `user_instances`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InstanceBinding {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachInstanceRequest {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetachInstanceQuery {
    pub token: String,
}
