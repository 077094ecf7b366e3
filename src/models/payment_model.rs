//! models/payment_model.rs
//! Checkout (Stripe / GetNet) y pago directo con tarjeta (GetNet).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body de POST /api/pay/{stripe,getnet}/checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub email: String,
    #[serde(default = "default_plan")]
    pub plan: String,
    /// Sin valor usa LUNA_PRICE_CENTS.
    pub amount_cents: Option<i64>,
    /// Identificador del tenant; si falta se usa el email.
    pub tenant_key: Option<String>,
}

pub fn default_plan() -> String {
    "luna_base".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    #[serde(rename = "ref")]
    pub reference: String,
    pub url: String,
}

/// Query de GET /api/pay/*/checkout-url (versión GET del checkout).
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutUrlQuery {
    pub email: Option<String>,
    pub plan: Option<String>,
    pub amount_cents: Option<i64>,
    pub tenant_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentStatusQuery {
    #[serde(rename = "ref")]
    pub reference: String,
}

/// Fila de la tabla `payments`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PaymentRecord {
    pub id: String,
    pub reference_id: String,
    pub tenant_key: String,
    pub email: String,
    pub plan: String,
    pub amount_cents: i64,
    pub status: String,
    #[serde(skip_serializing)]
    pub raw: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

// ---------- pago directo GetNet ----------

#[derive(Debug, Clone, Deserialize)]
pub struct CardBillingAddress {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub complement: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub postal_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardCustomer {
    pub email: String,
    pub name: String,
    pub document_number: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub billing_address: Option<CardBillingAddress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardData {
    pub card_number: String,
    pub cardholder_name: String,
    /// "MM"
    pub expiration_month: String,
    /// "YYYY" (acepta 2 dígitos; se normaliza)
    pub expiration_year: String,
    pub security_code: String,
    /// Visa | Mastercard | American Express | Elo | Hipercard | Diners
    pub brand: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayDirectRequest {
    /// "credit" (default) o "debit".
    #[serde(default = "default_pay_type", rename = "type")]
    pub pay_type: String,
    pub amount_cents: Option<i64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_installments")]
    pub number_installments: i64,
    /// Obligatorio para débito.
    pub cardholder_mobile: Option<String>,
    pub customer: CardCustomer,
    pub card: CardData,
    pub order_id: Option<String>,
    #[serde(default = "default_product_type")]
    pub product_type: String,
    #[serde(default)]
    pub sales_tax: i64,
}

fn default_pay_type() -> String {
    "credit".to_string()
}

fn default_currency() -> String {
    "BRL".to_string()
}

fn default_installments() -> i64 {
    1
}

fn default_product_type() -> String {
    "digital_content".to_string()
}

/// Info de webhook GetNet ya normalizada (ref + estado paid/failed).
#[derive(Debug, Clone)]
pub struct WebhookInfo {
    pub reference: Option<String>,
    pub status: Option<&'static str>,
}

/// Conveniencia para construir `raw` de pagos a partir de un evento.
pub fn event_raw(event_type: &str, object: &Value) -> Value {
    serde_json::json!({ "type": event_type, "object": object })
}
