//! models/auth_model.rs
//! Login por token de instancia UAZAPI y contexto de gateway.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body de POST /api/auth/login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Instance token de la UAZAPI.
    pub token: String,
    /// Nombre/identificación opcional del operador o instancia.
    pub label: Option<String>,
    /// Número informativo (no se valida).
    pub number_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub jwt: String,
    pub profile: Value,
}

/// Datos mínimos para hablar con la UAZAPI en nombre del usuario.
/// `token` viene del claim `instance_token` (o `token` legado);
/// `host` del claim `host` o de `UAZAPI_HOST`.
#[derive(Debug, Clone)]
pub struct GatewayCtx {
    pub token: String,
    pub host: String,
}
