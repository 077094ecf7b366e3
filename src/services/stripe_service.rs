//! services/stripe_service.rs
//! Cliente de la API Stripe: sesiones de Checkout (modo suscripción),
//! lectura de suscripciones y verificación de firma de webhooks.

use std::time::Duration;

use anyhow::{bail, Result};
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::app_config::StripeConfig;
use crate::services::billing_service::hmac_sha256_hex;

const STRIPE_API: &str = "https://api.stripe.com";

/// Verifica el header Stripe-Signature (t=...,v1=...) contra el cuerpo
/// crudo. Tolerancia de 300 segundos sobre el timestamp firmado.
pub fn verify_signature(secret: &str, payload: &str, sig_header: &str) -> bool {
    verify_signature_at(secret, payload, sig_header, Utc::now().timestamp())
}

pub fn verify_signature_at(secret: &str, payload: &str, sig_header: &str, now: i64) -> bool {
    let mut ts: Option<i64> = None;
    let mut v1s: Vec<&str> = Vec::new();
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(v) = part.strip_prefix("t=") {
            ts = v.parse().ok();
        } else if let Some(v) = part.strip_prefix("v1=") {
            v1s.push(v);
        }
    }
    let ts = match ts {
        Some(t) => t,
        None => return false,
    };
    if (now - ts).abs() > 300 {
        return false;
    }
    let signed = format!("{}.{}", ts, payload);
    match hmac_sha256_hex(secret, &signed) {
        Ok(expected) => v1s.iter().any(|v| *v == expected),
        Err(_) => false,
    }
}

#[derive(Clone)]
pub struct StripeService {
    client: Client,
    config: StripeConfig,
}

impl StripeService {
    pub fn new(config: StripeConfig) -> Self {
        StripeService {
            client: Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.config.secret_key.is_empty() && !self.config.price_id.is_empty()
    }

    pub fn webhook_secret(&self) -> &str {
        &self.config.webhook_secret
    }

    /// Crea una sesión de Checkout en modo suscripción. La metadata va
    /// duplicada en la sesión y en la suscripción para que el webhook
    /// pueda correlacionar por cualquiera de las dos.
    pub async fn create_checkout_session(
        &self,
        reference: &str,
        email: &str,
        tenant_key: &str,
        plan: &str,
    ) -> Result<(String, String)> {
        let success_url = format!("{}?ref={}", self.config.return_base, reference);
        let cancel_url = format!("{}?ref={}", self.config.cancel_base, reference);
        let form: Vec<(&str, String)> = vec![
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", self.config.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
            ("client_reference_id", reference.to_string()),
            ("customer_email", email.to_string()),
            ("metadata[reference_id]", reference.to_string()),
            ("metadata[tenant_key]", tenant_key.to_string()),
            ("metadata[plan]", plan.to_string()),
            ("metadata[email]", email.to_string()),
            (
                "subscription_data[metadata][reference_id]",
                reference.to_string(),
            ),
            (
                "subscription_data[metadata][tenant_key]",
                tenant_key.to_string(),
            ),
            ("subscription_data[metadata][plan]", plan.to_string()),
            ("subscription_data[metadata][email]", email.to_string()),
        ];

        let resp = self
            .client
            .post(format!("{}/v1/checkout/sessions", STRIPE_API))
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!("{}", body);
        }
        let data: Value = serde_json::from_str(&body)?;
        let session_id = data
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let url = data
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if url.is_empty() {
            bail!("sessão sem URL");
        }
        Ok((session_id, url))
    }

    /// Metadata de una suscripción (para correlacionar invoices en el
    /// webhook). Devuelve {} si la suscripción no trae metadata.
    pub async fn subscription_metadata(&self, subscription_id: &str) -> Result<Value> {
        let resp = self
            .client
            .get(format!("{}/v1/subscriptions/{}", STRIPE_API, subscription_id))
            .bearer_auth(&self.config.secret_key)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!("{}", body);
        }
        let data: Value = serde_json::from_str(&body)?;
        Ok(data.get("metadata").cloned().unwrap_or_else(|| json!({})))
    }
}
