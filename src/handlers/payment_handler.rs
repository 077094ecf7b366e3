//! handlers/payment_handler.rs
//! Rutas de pago: checkout Stripe (suscripción) y GetNet (link y pago
//! directo con tarjeta), más los webhooks que activan el tenant.

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use log::warn;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::app_config::AppConfig;
use crate::handlers::err_json;
use crate::models::payment_model::{
    default_plan, event_raw, CheckoutRequest, CheckoutResponse, CheckoutUrlQuery,
    PayDirectRequest, PaymentStatusQuery,
};
use crate::services::billing_service::BillingService;
use crate::services::getnet_service::{
    build_payment_payload, extract_ref_and_status, normalize_pay_request, normalized_pay_status,
    GetnetError, GetnetService,
};
use crate::services::stripe_service::{verify_signature, StripeService};

fn getnet_error(e: GetnetError) -> HttpResponse {
    match e {
        GetnetError::NotConfigured(msg) => err_json(StatusCode::INTERNAL_SERVER_ERROR, msg),
        GetnetError::Gateway(msg) => err_json(StatusCode::BAD_REQUEST, &msg),
        GetnetError::Network(msg) => err_json(
            StatusCode::BAD_GATEWAY,
            &format!("Erro de rede na GetNet: {}", msg),
        ),
    }
}

/// Primer texto no vacío entre varias claves; claves con `/` se buscan
/// como JSON pointer.
fn first_text(payload: &Value, keys: &[&str]) -> String {
    for key in keys {
        let v = if key.starts_with('/') {
            payload.pointer(key)
        } else {
            payload.get(*key)
        };
        if let Some(s) = v.and_then(Value::as_str) {
            let s = s.trim();
            if !s.is_empty() {
                return s.to_string();
            }
        }
    }
    String::new()
}

fn meta_str(meta: &Value, key: &str) -> String {
    meta.get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string()
}

/// GET /checkout-url reusa el flujo del POST; sin email se genera uno
/// anónimo para no bloquear el link.
fn checkout_from_query(q: CheckoutUrlQuery) -> CheckoutRequest {
    CheckoutRequest {
        email: q
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| format!("anon-{}@example.com", Uuid::new_v4().simple())),
        plan: q
            .plan
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(default_plan),
        amount_cents: q.amount_cents,
        tenant_key: q.tenant_key,
    }
}

fn resolve_tenant_key(body: &CheckoutRequest, email: &str) -> String {
    body.tenant_key
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| email.to_string())
}

// ---------- Stripe ----------

async fn run_stripe_checkout(
    config: &AppConfig,
    stripe: &StripeService,
    billing: &BillingService,
    body: CheckoutRequest,
) -> HttpResponse {
    if !stripe.is_configured() {
        return err_json(StatusCode::INTERNAL_SERVER_ERROR, "Stripe não configurado.");
    }
    let reference = format!("st_{}", Uuid::new_v4().simple());
    let email = body.email.trim().to_string();
    let tenant_key = resolve_tenant_key(&body, &email);
    let amount_cents = body.amount_cents.unwrap_or(config.price_cents);

    // El webhook recrea referencias desconocidas, así que el registro
    // previo no bloquea el checkout.
    if let Err(e) = billing
        .create_pending_payment(&reference, &tenant_key, &email, &body.plan, amount_cents, None)
        .await
    {
        warn!("Error registrando pago {}: {:?}", reference, e);
    }

    let (session_id, url) = match stripe
        .create_checkout_session(&reference, &email, &tenant_key, &body.plan)
        .await
    {
        Ok(v) => v,
        Err(e) => {
            return err_json(
                StatusCode::SERVICE_UNAVAILABLE,
                &format!("Falha ao criar sessão de pagamento: {}", e),
            )
        }
    };

    if let Err(e) = billing
        .update_payment_status(&reference, "pending", Some(&json!({ "session_id": session_id })))
        .await
    {
        warn!("Error actualizando pago {}: {:?}", reference, e);
    }

    HttpResponse::Ok().json(CheckoutResponse { reference, url })
}

/// POST /api/pay/stripe/checkout
pub async fn stripe_checkout_endpoint(
    config: web::Data<AppConfig>,
    stripe: web::Data<StripeService>,
    billing: web::Data<BillingService>,
    body: web::Json<CheckoutRequest>,
) -> HttpResponse {
    run_stripe_checkout(&config, &stripe, &billing, body.into_inner()).await
}

/// GET /api/pay/stripe/checkout-url
pub async fn stripe_checkout_url_endpoint(
    config: web::Data<AppConfig>,
    stripe: web::Data<StripeService>,
    billing: web::Data<BillingService>,
    query: web::Query<CheckoutUrlQuery>,
) -> HttpResponse {
    run_stripe_checkout(&config, &stripe, &billing, checkout_from_query(query.into_inner())).await
}

/// Correlaciona un evento de invoice con el pago local vía metadata de
/// la suscripción. Con "paid" además activa el tenant un mes.
async fn apply_invoice_event(
    stripe: &StripeService,
    billing: &BillingService,
    event_type: &str,
    data_object: &Value,
    status: &str,
) {
    let subscription_id = data_object
        .get("subscription")
        .and_then(Value::as_str)
        .unwrap_or("");
    if subscription_id.is_empty() {
        return;
    }
    let meta = match stripe.subscription_metadata(subscription_id).await {
        Ok(m) => m,
        Err(e) => {
            warn!("Error leyendo suscripción {}: {:?}", subscription_id, e);
            return;
        }
    };
    let reference = meta_str(&meta, "reference_id");
    if reference.is_empty() {
        return;
    }

    let raw = event_raw(event_type, data_object);
    if let Err(e) = billing
        .update_payment_status(&reference, status, Some(&raw))
        .await
    {
        warn!("Error actualizando pago {}: {:?}", reference, e);
    }

    if status == "paid" {
        let tenant_key = {
            let t = meta_str(&meta, "tenant_key");
            if t.is_empty() {
                reference.clone()
            } else {
                t
            }
        };
        let email = meta_str(&meta, "email");
        let plan = {
            let p = meta_str(&meta, "plan");
            if p.is_empty() {
                default_plan()
            } else {
                p
            }
        };
        let email_opt = if email.is_empty() {
            None
        } else {
            Some(email.as_str())
        };
        if let Err(e) = billing
            .ensure_tenant_active(&tenant_key, email_opt, &plan, 1)
            .await
        {
            warn!("Error activando tenant {}: {:?}", tenant_key, e);
        }
    }
}

/// POST /api/pay/stripe/webhook
/// Con STRIPE_WEBHOOK_SECRET configurado exige firma válida; sin él
/// acepta el JSON plano (modo desarrollo).
pub async fn stripe_webhook_endpoint(
    req: HttpRequest,
    stripe: web::Data<StripeService>,
    billing: web::Data<BillingService>,
    body: web::Bytes,
) -> HttpResponse {
    let payload = String::from_utf8_lossy(&body).to_string();
    if !stripe.webhook_secret().is_empty() {
        let sig = req
            .headers()
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_signature(stripe.webhook_secret(), &payload, sig) {
            return err_json(
                StatusCode::BAD_REQUEST,
                "Webhook signature verification failed",
            );
        }
    }
    let event: Value = match serde_json::from_str(&payload) {
        Ok(v) => v,
        Err(e) => {
            return err_json(StatusCode::BAD_REQUEST, &format!("Invalid payload: {}", e))
        }
    };

    let event_type = event
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let data_object = event
        .pointer("/data/object")
        .cloned()
        .unwrap_or_else(|| json!({}));

    match event_type.as_str() {
        "invoice.paid" => {
            apply_invoice_event(&stripe, &billing, &event_type, &data_object, "paid").await;
        }
        "invoice.payment_failed" => {
            apply_invoice_event(&stripe, &billing, &event_type, &data_object, "failed").await;
        }
        "customer.subscription.deleted" => {
            let meta = data_object
                .get("metadata")
                .cloned()
                .unwrap_or_else(|| json!({}));
            let reference = meta_str(&meta, "reference_id");
            let tenant_key = meta_str(&meta, "tenant_key");
            let raw = event_raw(&event_type, &data_object);
            if !reference.is_empty() {
                if let Err(e) = billing
                    .update_payment_status(&reference, "failed", Some(&raw))
                    .await
                {
                    warn!("Error actualizando pago {}: {:?}", reference, e);
                }
            }
            if !tenant_key.is_empty() {
                if let Err(e) = billing.set_inactive(&tenant_key).await {
                    warn!("Error desactivando tenant {}: {:?}", tenant_key, e);
                }
            }
        }
        _ => {}
    }

    HttpResponse::Ok().json(json!({ "ok": true }))
}

// ---------- GetNet ----------

async fn run_getnet_checkout(
    config: &AppConfig,
    billing: &BillingService,
    getnet: &GetnetService,
    body: CheckoutRequest,
) -> HttpResponse {
    let reference = format!("gt_{}", Uuid::new_v4().simple());
    let email = body.email.trim().to_string();
    let tenant_key = resolve_tenant_key(&body, &email);
    let amount_cents = body.amount_cents.unwrap_or(config.price_cents);

    if let Err(e) = billing
        .create_pending_payment(&reference, &tenant_key, &email, &body.plan, amount_cents, None)
        .await
    {
        warn!("Error registrando pago {}: {:?}", reference, e);
    }

    let description = format!("Assinatura {}", body.plan);
    let metadata = json!({ "tenant_key": tenant_key, "plan": body.plan });
    let (url, raw) = match getnet
        .create_checkout_link(amount_cents, &email, &reference, &description, &metadata)
        .await
    {
        Ok(v) => v,
        Err(e) => return getnet_error(e),
    };

    if let Err(e) = billing
        .update_payment_status(&reference, "pending", Some(&raw))
        .await
    {
        warn!("Error actualizando pago {}: {:?}", reference, e);
    }

    HttpResponse::Ok().json(CheckoutResponse { reference, url })
}

/// POST /api/pay/getnet/checkout
pub async fn getnet_checkout_endpoint(
    config: web::Data<AppConfig>,
    billing: web::Data<BillingService>,
    getnet: web::Data<GetnetService>,
    body: web::Json<CheckoutRequest>,
) -> HttpResponse {
    run_getnet_checkout(&config, &billing, &getnet, body.into_inner()).await
}

/// GET /api/pay/getnet/checkout-url
pub async fn getnet_checkout_url_endpoint(
    config: web::Data<AppConfig>,
    billing: web::Data<BillingService>,
    getnet: web::Data<GetnetService>,
    query: web::Query<CheckoutUrlQuery>,
) -> HttpResponse {
    run_getnet_checkout(&config, &billing, &getnet, checkout_from_query(query.into_inner())).await
}

fn client_ip(req: &HttpRequest) -> String {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let first = forwarded.split(',').next().unwrap_or("").trim();
    if !first.is_empty() {
        return first.to_string();
    }
    req.peer_addr()
        .map(|a| a.ip().to_string())
        .unwrap_or_default()
}

/// POST /api/pay/getnet/pay-direct
/// Tokeniza la tarjeta y paga en el servidor (crédito o débito).
pub async fn getnet_pay_direct_endpoint(
    req: HttpRequest,
    config: web::Data<AppConfig>,
    getnet: web::Data<GetnetService>,
    body: web::Json<PayDirectRequest>,
) -> HttpResponse {
    if !getnet.has_seller() {
        return err_json(StatusCode::INTERNAL_SERVER_ERROR, "SELLER_ID não configurado.");
    }
    let body = body.into_inner();
    let norm = match normalize_pay_request(&body) {
        Ok(n) => n,
        Err(msg) => return err_json(StatusCode::BAD_REQUEST, msg),
    };

    let access_token = match getnet.oauth_token().await {
        Ok(t) => t,
        Err(e) => return getnet_error(e),
    };
    let number_token = match getnet
        .tokenize_card(&access_token, &body.card.card_number, &body.customer.email)
        .await
    {
        Ok(t) => t,
        Err(e) => return getnet_error(e),
    };

    let amount_cents = body.amount_cents.unwrap_or(config.price_cents);
    let ip = client_ip(&req);
    let ua = req
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let (endpoint, payload) = build_payment_payload(
        getnet.seller_id(),
        &body,
        &norm,
        &number_token,
        amount_cents,
        &ip,
        &ua,
    );

    let data = match getnet.submit_payment(&access_token, &endpoint, &payload).await {
        Ok(d) => d,
        Err(e) => return getnet_error(e),
    };
    HttpResponse::Ok().json(json!({
        "ok": true,
        "status": normalized_pay_status(&data),
        "raw": data,
    }))
}

/// POST /api/pay/getnet/webhook
/// Idempotente: referencia desconocida se registra como pendiente antes
/// de aplicar el estado.
pub async fn getnet_webhook_endpoint(
    billing: web::Data<BillingService>,
    body: web::Json<Value>,
) -> HttpResponse {
    let payload = body.into_inner();
    let info = extract_ref_and_status(&payload);
    let reference = match info.reference {
        Some(r) => r,
        None => {
            return err_json(
                StatusCode::BAD_REQUEST,
                "Webhook sem referência (reference_id).",
            )
        }
    };

    let mut row = match billing.get_payment(&reference).await {
        Ok(r) => r,
        Err(e) => {
            return err_json(
                StatusCode::SERVICE_UNAVAILABLE,
                &format!("Billing indisponível: {}", e),
            )
        }
    };
    if row.is_none() {
        let tenant_key = first_text(&payload, &["tenant_key", "/metadata/tenant_key"]);
        let email = first_text(&payload, &["email", "payer_email"]);
        let plan = {
            let p = first_text(&payload, &["plan", "/metadata/plan"]);
            if p.is_empty() {
                default_plan()
            } else {
                p
            }
        };
        let amount_cents = payload
            .get("amount_cents")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if let Err(e) = billing
            .create_pending_payment(&reference, &tenant_key, &email, &plan, amount_cents, Some(&payload))
            .await
        {
            warn!("Error registrando pago {}: {:?}", reference, e);
        }
        row = billing.get_payment(&reference).await.ok().flatten();
    }

    match info.status {
        Some("paid") => {
            if let Err(e) = billing
                .update_payment_status(&reference, "paid", Some(&payload))
                .await
            {
                warn!("Error actualizando pago {}: {:?}", reference, e);
            }
            if let Some(row) = &row {
                let email = if row.email.is_empty() {
                    None
                } else {
                    Some(row.email.as_str())
                };
                if let Err(e) = billing
                    .ensure_tenant_active(&row.tenant_key, email, &row.plan, 1)
                    .await
                {
                    warn!("Error activando tenant {}: {:?}", row.tenant_key, e);
                }
            }
        }
        Some("failed") => {
            if let Err(e) = billing
                .update_payment_status(&reference, "failed", Some(&payload))
                .await
            {
                warn!("Error actualizando pago {}: {:?}", reference, e);
            }
        }
        _ => {
            // sin estado reconocible solo registra el raw
            let current = row
                .as_ref()
                .map(|r| r.status.clone())
                .unwrap_or_else(|| "pending".to_string());
            if let Err(e) = billing
                .update_payment_status(&reference, &current, Some(&payload))
                .await
            {
                warn!("Error actualizando pago {}: {:?}", reference, e);
            }
        }
    }

    HttpResponse::Ok().json(json!({ "ok": true }))
}

/// GET /api/pay/getnet/status?ref=...
pub async fn getnet_status_endpoint(
    billing: web::Data<BillingService>,
    query: web::Query<PaymentStatusQuery>,
) -> HttpResponse {
    let row = match billing.get_payment(&query.reference).await {
        Ok(r) => r,
        Err(e) => {
            return err_json(
                StatusCode::SERVICE_UNAVAILABLE,
                &format!("Billing indisponível: {}", e),
            )
        }
    };
    match row {
        Some(row) => HttpResponse::Ok().json(json!({
            "reference_id": row.reference_id,
            "email": row.email,
            "tenant_key": row.tenant_key,
            "plan": row.plan,
            "amount_cents": row.amount_cents,
            "status": row.status,
            "created_at": row.created_at,
            "updated_at": row.updated_at,
        })),
        None => err_json(StatusCode::NOT_FOUND, "Pagamento não encontrado"),
    }
}
