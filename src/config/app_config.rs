//! config/app_config.rs
//! Toda la configuración viene del entorno (dotenv ya cargado en main).
//! La regla es fail-fast: un `PORT` inválido aborta el arranque; credenciales
//! de pasarelas ausentes NO abortan (esas rutas responden 500/503 al usarse).

use anyhow::{bail, Context, Result};

/// Lee una variable tratando cadena vacía como "no definida".
fn env_opt(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) => {
            let v = v.trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        }
        Err(_) => None,
    }
}

fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_i64(name: &str, default: i64) -> i64 {
    env_opt(name)
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

/// Lista separada por comas (entradas vacías descartadas).
fn env_list(name: &str) -> Vec<String> {
    env_opt(name)
        .map(|raw| {
            raw.split(',')
                .map(|x| x.trim().to_string())
                .filter(|x| !x.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Resuelve el puerto HTTP. Sin valor (o vacío) usa 8000; un valor
/// no numérico es un error de configuración.
pub fn resolve_port(raw: Option<String>) -> Result<u16> {
    match raw {
        Some(v) if !v.trim().is_empty() => {
            let v = v.trim();
            v.parse::<u16>()
                .with_context(|| format!("PORT inválido: {:?}", v))
        }
        _ => Ok(8000),
    }
}

#[derive(Clone, Debug)]
pub struct StripeConfig {
    pub secret_key: String,
    pub price_id: String,
    pub webhook_secret: String,
    /// Destinos de redirección tras el checkout (`?ref=` se agrega al final).
    pub return_base: String,
    pub cancel_base: String,
}

#[derive(Clone, Debug)]
pub struct GetnetConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub seller_id: String,
    /// Override absoluto para la creación del link de checkout.
    pub checkout_url: String,
    /// Endpoint relativo en la plataforma GetNet.
    pub checkout_endpoint: String,
    pub return_base: String,
    pub notify_url: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: String,
    pub frontend_origin: String,
    pub jwt_secret: String,
    pub jwt_expire_minutes: i64,
    pub user_jwt_ttl_min: i64,
    pub uazapi_host: Option<String>,
    pub trial_days: i64,
    pub billing_salt: String,
    pub price_cents: i64,
    pub admin_bypass_emails: Vec<String>,
    pub admin_bypass_hosts: Vec<String>,
    pub admin_bypass_tokens: Vec<String>,
    pub public_base_url: String,
    pub stripe: StripeConfig,
    pub getnet: GetnetConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<AppConfig> {
        let port = resolve_port(env_opt("PORT"))?;

        let public_base = env_or("PUBLIC_BASE_URL", "")
            .trim_end_matches('/')
            .to_string();

        let stripe = StripeConfig {
            secret_key: env_or("STRIPE_SECRET_KEY", ""),
            price_id: env_or("STRIPE_PRICE_ID", ""),
            webhook_secret: env_or("STRIPE_WEBHOOK_SECRET", ""),
            return_base: env_opt("STRIPE_RETURN_BASE")
                .unwrap_or_else(|| public_base.clone())
                .trim_end_matches('/')
                .to_string(),
            cancel_base: env_opt("STRIPE_CANCEL_BASE")
                .unwrap_or_else(|| public_base.clone())
                .trim_end_matches('/')
                .to_string(),
        };

        let getnet_env = env_or("GETNET_ENV", "sandbox").to_lowercase();
        let getnet_base = if getnet_env.starts_with("prod") {
            "https://api.getnet.com.br"
        } else {
            "https://api-homologacao.getnet.com.br"
        };
        let getnet = GetnetConfig {
            base_url: getnet_base.to_string(),
            client_id: env_or("GETNET_CLIENT_ID", ""),
            client_secret: env_or("GETNET_CLIENT_SECRET", ""),
            seller_id: env_or("GETNET_SELLER_ID", ""),
            checkout_url: env_or("GETNET_CHECKOUT_URL", ""),
            checkout_endpoint: env_or("GETNET_CHECKOUT_ENDPOINT", "/v1/payments/link"),
            return_base: env_opt("GETNET_RETURN_BASE")
                .unwrap_or_else(|| format!("{}/pagamentos/getnet/sucesso", public_base))
                .trim_end_matches('/')
                .to_string(),
            notify_url: env_opt("GETNET_NOTIFY_URL")
                .unwrap_or_else(|| format!("{}/api/pay/getnet/webhook", public_base))
                .trim_end_matches('/')
                .to_string(),
        };

        let cfg = AppConfig {
            port,
            db_path: env_or("LUNA_DB_PATH", "./data/luna.db"),
            frontend_origin: env_or("FRONTEND_ORIGIN", "*"),
            jwt_secret: env_or("JWT_SECRET", "change-me"),
            jwt_expire_minutes: env_i64("JWT_EXPIRE_MINUTES", 43200),
            user_jwt_ttl_min: env_i64("USER_JWT_TTL_MIN", 43200),
            uazapi_host: env_opt("UAZAPI_HOST"),
            trial_days: env_i64("TRIAL_DAYS", 7),
            billing_salt: env_or("BILLING_SALT", "luna"),
            price_cents: env_i64("LUNA_PRICE_CENTS", 34990),
            admin_bypass_emails: env_list("ADMIN_BYPASS_EMAILS")
                .into_iter()
                .map(|e| e.to_lowercase())
                .collect(),
            admin_bypass_hosts: env_list("ADMIN_BYPASS_HOSTS"),
            admin_bypass_tokens: env_list("ADMIN_BYPASS_TOKENS"),
            public_base_url: public_base,
            stripe,
            getnet,
        };

        if cfg.jwt_expire_minutes <= 0 {
            bail!("JWT_EXPIRE_MINUTES debe ser positivo");
        }

        Ok(cfg)
    }

    /// Orígenes CORS resueltos; `*` (o vacío) significa cualquier origen.
    pub fn origins(&self) -> Vec<String> {
        let raw = self.frontend_origin.trim();
        if raw.is_empty() || raw == "*" {
            return vec!["*".to_string()];
        }
        raw.split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect()
    }
}
