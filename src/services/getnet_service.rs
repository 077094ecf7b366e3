//! services/getnet_service.rs
//! Cliente GetNet: OAuth client-credentials, tokenización de tarjeta,
//! link de checkout y pago directo crédito/débito.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::config::app_config::GetnetConfig;
use crate::models::payment_model::{PayDirectRequest, WebhookInfo};

/// Fallas del flujo GetNet ya separadas por cómo responde la ruta:
/// configuración faltante (500), rechazo del gateway (400 con el texto
/// crudo) o error de red (502).
#[derive(Debug)]
pub enum GetnetError {
    NotConfigured(&'static str),
    Gateway(String),
    Network(String),
}

impl fmt::Display for GetnetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GetnetError::NotConfigured(msg) => write!(f, "{}", msg),
            GetnetError::Gateway(msg) => write!(f, "{}", msg),
            GetnetError::Network(msg) => write!(f, "{}", msg),
        }
    }
}

// ---------- normalizadores ----------

pub fn digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Mes con dos dígitos ("9" → "09", "12" → "12").
pub fn pad2(v: &str) -> String {
    let s = format!("0{}", v.trim());
    let chars: Vec<char> = s.chars().collect();
    let start = chars.len().saturating_sub(2);
    chars[start..].iter().collect()
}

/// Año a cuatro dígitos ("28" → "2028", "2028" → "2028").
pub fn to_yyyy(v: &str) -> String {
    let d = digits(v);
    match d.len() {
        n if n >= 4 => d[..4].to_string(),
        2 => format!("20{}", d),
        3 => format!("20{}", &d[1..]),
        _ => d,
    }
}

pub fn normalize_brand(b: &str) -> &'static str {
    let m = b.trim().to_lowercase();
    if m.contains("master") {
        "Mastercard"
    } else if m.contains("american") || m.contains("amex") {
        "American Express"
    } else if m.contains("elo") {
        "Elo"
    } else if m.contains("hiper") {
        "Hipercard"
    } else if m.contains("diners") {
        "Diners"
    } else {
        "Visa"
    }
}

/// (nombre, apellido); sin apellido repite el nombre.
pub fn split_name(full: &str) -> (String, String) {
    let parts: Vec<&str> = full.split_whitespace().collect();
    match parts.as_slice() {
        [] => (String::new(), String::new()),
        [first] => (first.to_string(), first.to_string()),
        [first, rest @ ..] => (first.to_string(), rest.join(" ")),
    }
}

/// Teléfono a E.164 asumiendo Brasil cuando falta el código de país.
pub fn e164_br(phone: &str) -> String {
    let p = phone.trim();
    if p.is_empty() {
        return String::new();
    }
    if p.starts_with('+') {
        return p
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect();
    }
    let d = digits(p);
    if d.is_empty() {
        String::new()
    } else if d.starts_with("55") {
        format!("+{}", d)
    } else {
        format!("+55{}", d)
    }
}

fn value_as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Referencia y estado normalizado (paid/failed) de un webhook GetNet.
pub fn extract_ref_and_status(payload: &Value) -> WebhookInfo {
    let reference = [
        "reference_id",
        "referenceId",
        "ref",
        "order_id",
        "orderId",
        "payment_reference",
    ]
    .iter()
    .filter_map(|k| payload.get(*k))
    .find_map(value_as_text);

    let status_raw = [
        "status",
        "payment_status",
        "current_status",
        "transaction_status",
    ]
    .iter()
    .filter_map(|k| payload.get(*k))
    .find_map(value_as_text)
    .map(|s| s.to_lowercase());

    let status = status_raw.as_deref().and_then(|s| {
        let paid = ["paid", "approved", "success", "authorized", "confirmed"];
        let failed = ["denied", "canceled", "cancelled", "refused", "failed", "error"];
        if paid.iter().any(|w| s.contains(w)) {
            Some("paid")
        } else if failed.iter().any(|w| s.contains(w)) {
            Some("failed")
        } else {
            None
        }
    });

    WebhookInfo { reference, status }
}

/// Estado de una respuesta de pago directo: "approved" cuando el texto
/// crudo indica aprobación, si no el texto tal cual.
pub fn normalized_pay_status(data: &Value) -> String {
    let raw = data
        .get("status")
        .or_else(|| data.get("transaction_status"))
        .or_else(|| data.pointer("/payment/status"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_lowercase();
    if ["approved", "authorized", "confirmed", "paid"]
        .iter()
        .any(|s| raw.contains(s))
    {
        "approved".to_string()
    } else {
        raw
    }
}

// ---------- pago directo: normalización previa ----------

/// Datos del pago directo ya validados y normalizados.
#[derive(Debug, Clone)]
pub struct PayNorm {
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub brand: &'static str,
    pub cvv: String,
    pub exp_month: String,
    pub exp_year: String,
    pub document_type: &'static str,
    pub document_number: String,
    pub phone_number: String,
    pub mobile: String,
}

/// Valida y normaliza el body de pay-direct. Err lleva el detalle que la
/// ruta devuelve con 400.
pub fn normalize_pay_request(body: &PayDirectRequest) -> Result<PayNorm, &'static str> {
    let full_name = body.customer.name.trim().to_string();
    let mut first = body.customer.first_name.trim().to_string();
    let mut last = body.customer.last_name.trim().to_string();
    if first.is_empty() || last.is_empty() {
        let (f, l) = split_name(&full_name);
        first = f;
        last = l;
    }

    let exp_year = to_yyyy(&body.card.expiration_year);
    let exp_month = pad2(&body.card.expiration_month);
    let brand = normalize_brand(&body.card.brand);
    let cvv = digits(&body.card.security_code);
    let amex = brand == "American Express";
    if (amex && cvv.len() != 4) || (!amex && cvv.len() != 3) {
        return Err("CVV inválido para a bandeira informada.");
    }

    let document_number = digits(&body.customer.document_number);
    let document_type = if document_number.len() > 11 { "CNPJ" } else { "CPF" };
    let phone_number = e164_br(&body.customer.phone_number);
    let mobile = body
        .cardholder_mobile
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_string();
    if body.pay_type == "debit" && mobile.is_empty() && phone_number.is_empty() {
        return Err("cardholder_mobile é obrigatório para pagamentos no débito.");
    }

    Ok(PayNorm {
        first_name: first,
        last_name: last,
        full_name,
        brand,
        cvv,
        exp_month,
        exp_year,
        document_type,
        document_number,
        phone_number,
        mobile,
    })
}

/// Arma el payload final de /v1/payments/{credit,debit}. La tarjeta va
/// en la raíz, no dentro del bloque credit/debit.
pub fn build_payment_payload(
    seller_id: &str,
    body: &PayDirectRequest,
    norm: &PayNorm,
    number_token: &str,
    amount_cents: i64,
    device_ip: &str,
    device_ua: &str,
) -> (String, Value) {
    let order_id = body
        .order_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("order_{}", Uuid::new_v4().simple()));

    let mut customer = Map::new();
    customer.insert("customer_id".into(), json!(body.customer.email));
    customer.insert("first_name".into(), json!(norm.first_name));
    customer.insert("last_name".into(), json!(norm.last_name));
    customer.insert("name".into(), json!(norm.full_name));
    customer.insert("email".into(), json!(body.customer.email));
    customer.insert("document_type".into(), json!(norm.document_type));
    customer.insert("document_number".into(), json!(norm.document_number));
    customer.insert("phone_number".into(), json!(norm.phone_number));
    if let Some(ba) = &body.customer.billing_address {
        customer.insert(
            "billing_address".into(),
            json!({
                "street": ba.street,
                "number": ba.number,
                "complement": ba.complement,
                "district": ba.district,
                "city": ba.city,
                "state": ba.state,
                "country": ba.country,
                "postal_code": digits(&ba.postal_code),
            }),
        );
    }

    let mut payload = Map::new();
    payload.insert("seller_id".into(), json!(seller_id));
    payload.insert("amount".into(), json!(amount_cents));
    payload.insert("currency".into(), json!(body.currency));
    payload.insert(
        "order".into(),
        json!({
            "order_id": order_id,
            "sales_tax": body.sales_tax,
            "product_type": body.product_type,
        }),
    );
    payload.insert("customer".into(), Value::Object(customer));
    payload.insert(
        "card".into(),
        json!({
            "number_token": number_token,
            "cardholder_name": body.card.cardholder_name.trim().to_uppercase(),
            "expiration_month": norm.exp_month,
            "expiration_year": norm.exp_year,
            "brand": norm.brand,
            "security_code": norm.cvv,
        }),
    );

    let endpoint = if body.pay_type == "debit" {
        let mobile = if norm.mobile.is_empty() {
            norm.phone_number.clone()
        } else {
            norm.mobile.clone()
        };
        payload.insert(
            "debit".into(),
            json!({
                "cardholder_mobile": mobile,
                "soft_descriptor": "LunaAI",
                "authenticated": false,
            }),
        );
        "/v1/payments/debit".to_string()
    } else {
        payload.insert(
            "credit".into(),
            json!({
                "delayed": false,
                "authenticated": false,
                "pre_authorization": false,
                "save_card_data": false,
                "transaction_type": "FULL",
                "number_installments": body.number_installments.max(1),
                "soft_descriptor": "LunaAI",
            }),
        );
        "/v1/payments/credit".to_string()
    };

    if !device_ip.is_empty() || !device_ua.is_empty() {
        let ip = if device_ip.is_empty() { "0.0.0.0" } else { device_ip };
        let ua: String = device_ua.chars().take(256).collect();
        payload.insert(
            "device".into(),
            json!({ "ip_address": ip, "user_agent": ua }),
        );
    }

    (endpoint, Value::Object(payload))
}

// ---------- cliente ----------

#[derive(Clone)]
pub struct GetnetService {
    client: Client,
    config: GetnetConfig,
}

impl GetnetService {
    pub fn new(config: GetnetConfig) -> Self {
        GetnetService {
            client: Client::new(),
            config,
        }
    }

    pub fn has_seller(&self) -> bool {
        !self.config.seller_id.is_empty()
    }

    pub fn seller_id(&self) -> &str {
        &self.config.seller_id
    }

    pub fn return_url(&self, reference: &str) -> String {
        format!("{}?ref={}", self.config.return_base, reference)
    }

    pub async fn oauth_token(&self) -> Result<String, GetnetError> {
        if self.config.client_id.is_empty() || self.config.client_secret.is_empty() {
            return Err(GetnetError::NotConfigured(
                "Credenciais GetNet não configuradas.",
            ));
        }
        let basic = base64::encode(format!(
            "{}:{}",
            self.config.client_id, self.config.client_secret
        ));
        let resp = self
            .client
            .post(format!("{}/auth/oauth/v2/token", self.config.base_url))
            .header("authorization", format!("Basic {}", basic))
            .form(&[("grant_type", "client_credentials"), ("scope", "oob")])
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| GetnetError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        if status != 200 {
            return Err(GetnetError::Gateway(format!("Erro OAuth: {}", body)));
        }
        let data: Value = serde_json::from_str(&body)
            .map_err(|e| GetnetError::Gateway(format!("Erro OAuth: {}", e)))?;
        let token = data
            .get("access_token")
            .or_else(|| data.get("accessToken"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        if token.is_empty() {
            return Err(GetnetError::Gateway(
                "Erro OAuth: resposta sem access_token".to_string(),
            ));
        }
        Ok(token)
    }

    pub async fn tokenize_card(
        &self,
        access_token: &str,
        card_number: &str,
        customer_id: &str,
    ) -> Result<String, GetnetError> {
        let resp = self
            .client
            .post(format!("{}/v1/tokens/card", self.config.base_url))
            .bearer_auth(access_token)
            .json(&json!({
                "card_number": digits(card_number),
                "customer_id": customer_id,
            }))
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| GetnetError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        if status != 200 {
            return Err(GetnetError::Gateway(format!(
                "Erro tokenizar cartão: {}",
                body
            )));
        }
        let data: Value = serde_json::from_str(&body)
            .map_err(|e| GetnetError::Gateway(format!("Erro tokenizar cartão: {}", e)))?;
        let token = data
            .get("number_token")
            .or_else(|| data.get("numberToken"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        if token.is_empty() {
            return Err(GetnetError::Gateway("Falha ao tokenizar o cartão.".to_string()));
        }
        Ok(token)
    }

    /// Crea el link de pago: contra GETNET_CHECKOUT_URL si está definido,
    /// si no contra el endpoint de la plataforma con OAuth.
    pub async fn create_checkout_link(
        &self,
        amount_cents: i64,
        customer_email: &str,
        reference: &str,
        description: &str,
        metadata: &Value,
    ) -> Result<(String, Value), GetnetError> {
        let return_url = self.return_url(reference);
        if !self.config.checkout_url.is_empty() {
            let payload = json!({
                "amount_cents": amount_cents,
                "customer_email": customer_email,
                "reference_id": reference,
                "return_url": return_url,
                "notify_url": self.config.notify_url,
                "description": description,
                "metadata": metadata,
            });
            let resp = self
                .client
                .post(&self.config.checkout_url)
                .json(&payload)
                .timeout(Duration::from_secs(30))
                .send()
                .await
                .map_err(|e| GetnetError::Network(e.to_string()))?;
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(GetnetError::Gateway(format!(
                    "Erro ao criar link de pagamento: {}",
                    body
                )));
            }
            let data: Value = serde_json::from_str(&body)
                .map_err(|e| GetnetError::Gateway(format!("Erro ao criar link de pagamento: {}", e)))?;
            let link = data
                .get("payment_url")
                .or_else(|| data.get("redirect_url"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            if link.is_empty() {
                return Err(GetnetError::Gateway(
                    "Resposta do checkout sem payment_url/redirect_url".to_string(),
                ));
            }
            return Ok((link, data));
        }

        let token = self.oauth_token().await?;
        let mut payload = Map::new();
        if self.has_seller() {
            payload.insert("seller_id".into(), json!(self.config.seller_id));
        }
        payload.insert("reference".into(), json!(reference));
        payload.insert(
            "amount".into(),
            json!({ "value": amount_cents, "currency": "BRL" }),
        );
        payload.insert(
            "items".into(),
            json!([{ "name": description, "amount": amount_cents, "quantity": 1 }]),
        );
        payload.insert("customer".into(), json!({ "email": customer_email }));
        payload.insert("url_redirect".into(), json!(return_url));
        payload.insert("url_notification".into(), json!(self.config.notify_url));
        payload.insert("metadata".into(), metadata.clone());

        let resp = self
            .client
            .post(format!(
                "{}{}",
                self.config.base_url, self.config.checkout_endpoint
            ))
            .bearer_auth(&token)
            .json(&Value::Object(payload))
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| GetnetError::Network(e.to_string()))?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(GetnetError::Gateway(format!(
                "Erro ao criar link de pagamento: {}",
                body
            )));
        }
        let data: Value = serde_json::from_str(&body)
            .map_err(|e| GetnetError::Gateway(format!("Erro ao criar link de pagamento: {}", e)))?;
        let link = data
            .get("payment_url")
            .or_else(|| data.get("url_payment"))
            .or_else(|| data.get("redirect_url"))
            .or_else(|| data.get("checkout_url"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        if link.is_empty() {
            return Err(GetnetError::Gateway(
                "Não foi possível obter a URL de pagamento da resposta da GetNet".to_string(),
            ));
        }
        Ok((link, data))
    }

    /// POST /v1/payments/{credit,debit}. Devuelve el JSON crudo; un
    /// status distinto de 200 viaja como Gateway con el texto completo.
    pub async fn submit_payment(
        &self,
        access_token: &str,
        endpoint: &str,
        payload: &Value,
    ) -> Result<Value, GetnetError> {
        let resp = self
            .client
            .post(format!("{}{}", self.config.base_url, endpoint))
            .bearer_auth(access_token)
            .json(payload)
            .timeout(Duration::from_secs(40))
            .send()
            .await
            .map_err(|e| GetnetError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        if status != 200 {
            return Err(GetnetError::Gateway(body));
        }
        serde_json::from_str(&body).map_err(|e| GetnetError::Gateway(e.to_string()))
    }
}
