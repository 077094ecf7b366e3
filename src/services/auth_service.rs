//! services/auth_service.rs
//! Emisión y verificación de JWT (HS256) para sesiones de instancia y
//! cuentas de usuario.

use std::fmt;

use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{json, Map, Value};

use crate::models::auth_model::GatewayCtx;

#[derive(Debug)]
pub enum AuthError {
    Expired,
    Invalid(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Expired => write!(f, "Token expirado"),
            AuthError::Invalid(e) => write!(f, "Token inválido: {}", e),
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    secret: String,
    expire_minutes: i64,
    user_ttl_min: i64,
    default_host: Option<String>,
}

impl AuthService {
    pub fn new(
        secret: String,
        expire_minutes: i64,
        user_ttl_min: i64,
        default_host: Option<String>,
    ) -> Self {
        AuthService {
            secret,
            expire_minutes,
            user_ttl_min,
            default_host,
        }
    }

    fn sign(&self, claims: Value) -> Result<String> {
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Sesión atada a un instance token de la UAZAPI. El claim
    /// `instance_token` es el que consumen las rutas proxy.
    pub fn issue_instance_jwt(
        &self,
        instance_token: &str,
        label: Option<&str>,
        number_hint: Option<&str>,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.expire_minutes);
        let mut claims = Map::new();
        claims.insert("sub".into(), json!("luna-user"));
        claims.insert("iat".into(), json!(now.timestamp()));
        claims.insert("exp".into(), json!(exp.timestamp()));
        claims.insert("instance_token".into(), json!(instance_token));
        claims.insert("label".into(), opt_claim(label));
        claims.insert("number_hint".into(), opt_claim(number_hint));
        self.sign(Value::Object(claims))
    }

    /// Sesión de cuenta (email + contraseña). El sub "user:<id>" es el
    /// que habilita las rutas /api/users/*.
    pub fn issue_user_jwt(&self, user_id: i64, email: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.user_ttl_min);
        let claims = json!({
            "iss": "luna-backend",
            "sub": format!("user:{}", user_id),
            "iat": now.timestamp(),
            "exp": exp.timestamp(),
            "email": email,
            "role": "user",
        });
        self.sign(claims)
    }

    pub fn decode(&self, token: &str) -> Result<Value, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        match decode::<Value>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(AuthError::Expired),
                _ => Err(AuthError::Invalid(e.to_string())),
            },
        }
    }

    /// Resuelve token y host del gateway a partir de los claims. El host
    /// puede venir del JWT o del default de configuración (UAZAPI_HOST).
    pub fn gateway_ctx(&self, claims: &Value) -> Result<GatewayCtx, &'static str> {
        let token = ["token", "instance_token"]
            .iter()
            .filter_map(|k| claims.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or("");
        if token.is_empty() {
            return Err("JWT sem token de instância");
        }
        let host = claims
            .get("host")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .or_else(|| self.default_host.clone());
        match host {
            Some(h) if !h.trim().is_empty() => Ok(GatewayCtx {
                token: token.to_string(),
                host: h.trim().to_string(),
            }),
            _ => Err("JWT sem host e UAZAPI_HOST não definido"),
        }
    }
}

fn opt_claim(v: Option<&str>) -> Value {
    match v.map(str::trim) {
        Some(s) if !s.is_empty() => json!(s),
        _ => Value::Null,
    }
}
