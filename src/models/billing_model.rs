//! models/billing_model.rs

use serde::Serialize;

/// Estado de billing de un tenant (trial o suscripción paga).
#[derive(Debug, Clone, Serialize)]
pub struct BillingStatus {
    pub exists: bool,
    pub active: bool,
    pub trial_started_at: Option<String>,
    pub trial_ends_at: Option<String>,
    pub paid_until: Option<String>,
    pub days_left: i64,
    pub plan: Option<String>,
    pub last_payment_status: Option<String>,
    pub require_payment: bool,
}

impl BillingStatus {
    /// Estado para un tenant sin registro.
    pub fn missing() -> BillingStatus {
        BillingStatus {
            exists: false,
            active: false,
            trial_started_at: None,
            trial_ends_at: None,
            paid_until: None,
            days_left: 0,
            plan: None,
            last_payment_status: None,
            require_payment: false,
        }
    }
}
