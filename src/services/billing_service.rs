//! services/billing_service.rs
//! Estado de trial/suscripción por billing_key y registro de pagos.
//! Una sola tabla de cuentas cubre trial y pagos; los webhooks de los
//! proveedores extienden paid_until vía mark_paid.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::sign::Signer;
use serde_json::Value;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::models::billing_model::BillingStatus;
use crate::models::payment_model::PaymentRecord;

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn hmac_sha256_hex(salt: &str, data: &str) -> Result<String> {
    let key = PKey::hmac(salt.as_bytes())?;
    let mut signer = Signer::new(MessageDigest::sha256(), &key)?;
    signer.update(data.as_bytes())?;
    Ok(to_hex(&signer.sign_to_vec()?))
}

/// Clave canónica por instancia.
pub fn canonical_instance_key(v: &str) -> String {
    format!("iid:{}", v)
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    trial_started_at: Option<String>,
    trial_ends_at: Option<String>,
    paid_until: Option<String>,
    plan: Option<String>,
    last_payment_status: Option<String>,
}

fn parse_ts(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref()
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn row_is_active(trial_ends_at: &Option<String>, paid_until: &Option<String>) -> bool {
    let now = Utc::now();
    if let Some(paid) = parse_ts(paid_until) {
        if paid > now {
            return true;
        }
    }
    matches!(parse_ts(trial_ends_at), Some(ends) if ends > now)
}

#[derive(Clone)]
pub struct BillingService {
    pool: Pool<Sqlite>,
    salt: String,
    trial_days: i64,
    bypass_emails: Vec<String>,
    bypass_hosts: Vec<String>,
    bypass_tokens: Vec<String>,
}

impl BillingService {
    pub fn new(
        pool: Pool<Sqlite>,
        salt: String,
        trial_days: i64,
        bypass_emails: Vec<String>,
        bypass_hosts: Vec<String>,
        bypass_tokens: Vec<String>,
    ) -> Self {
        BillingService {
            pool,
            salt,
            trial_days,
            bypass_emails,
            bypass_hosts,
            bypass_tokens,
        }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS billing_accounts (
                billing_key         TEXT PRIMARY KEY,
                email               TEXT,
                plan                TEXT,
                trial_started_at    TEXT,
                trial_ends_at       TEXT,
                paid_until          TEXT,
                last_payment_status TEXT,
                created_at          TEXT NOT NULL,
                updated_at          TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS payments (
                id           TEXT PRIMARY KEY,
                reference_id TEXT NOT NULL UNIQUE,
                tenant_key   TEXT NOT NULL,
                email        TEXT NOT NULL DEFAULT '',
                plan         TEXT NOT NULL,
                amount_cents INTEGER NOT NULL,
                status       TEXT NOT NULL,
                raw          TEXT,
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_payments_tenant_key ON payments (tenant_key)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_billing_email ON billing_accounts (email)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---------- claves ----------

    /// Hash estable de host+token para callers sin instance_id.
    pub fn make_billing_key(&self, token: &str, host: &str) -> Result<String> {
        let digest = hmac_sha256_hex(&self.salt, &format!("{}|{}", host, token))?;
        Ok(format!("ht:{}", digest))
    }

    /// Deriva el billing_key desde los claims. Prioridad: instancia
    /// (iid:), sub "user:<id>" (uid:), email con HMAC (ue:). None si no
    /// hay con qué identificar al tenant.
    pub fn billing_key_from_claims(&self, claims: &Value) -> Result<Option<String>> {
        let token = str_claim(claims, &["token", "instance_token"]);
        let iid = str_claim(claims, &["instance_id"]);

        if !iid.is_empty() || !token.is_empty() {
            let v = if iid.is_empty() { &token } else { &iid };
            return Ok(Some(canonical_instance_key(v)));
        }

        let sub = str_claim(claims, &["sub"]);
        if let Some(uid) = sub.strip_prefix("user:") {
            if !uid.is_empty() {
                return Ok(Some(format!("uid:{}", uid)));
            }
        }

        let email = str_claim(claims, &["email", "user_email"]).to_lowercase();
        if !email.is_empty() {
            let digest = hmac_sha256_hex(&self.salt, &email)?;
            return Ok(Some(format!("ue:{}", digest)));
        }
        Ok(None)
    }

    /// Cuentas admin por listas de entorno (emails, hosts o tokens).
    pub fn is_admin_bypass(&self, claims: &Value) -> bool {
        let email = str_claim(claims, &["email", "user_email"]).to_lowercase();
        if !email.is_empty() && self.bypass_emails.iter().any(|e| e == &email) {
            return true;
        }
        let host = str_claim(claims, &["host"]);
        if !host.is_empty() && self.bypass_hosts.iter().any(|h| h == &host) {
            return true;
        }
        let token = str_claim(claims, &["token", "instance_token"]);
        !token.is_empty() && self.bypass_tokens.iter().any(|t| t == &token)
    }

    // ---------- cuentas ----------

    /// Arranca el trial si la cuenta no existe. Idempotente.
    pub async fn ensure_trial(&self, billing_key: &str) -> Result<()> {
        let now = Utc::now();
        let ends = now + Duration::days(self.trial_days);
        sqlx::query(
            "INSERT OR IGNORE INTO billing_accounts
                 (billing_key, created_at, trial_started_at, trial_ends_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(billing_key)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(ends.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn account(&self, billing_key: &str) -> Result<Option<AccountRow>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT trial_started_at, trial_ends_at, paid_until, plan, last_payment_status
             FROM billing_accounts WHERE billing_key = ?",
        )
        .bind(billing_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_status(&self, billing_key: &str) -> Result<BillingStatus> {
        let row = match self.account(billing_key).await? {
            Some(r) => r,
            None => return Ok(BillingStatus::missing()),
        };

        let now = Utc::now();
        let mut active = false;
        let mut days_left = 0i64;
        if let Some(paid) = parse_ts(&row.paid_until) {
            if paid > now {
                active = true;
                days_left = (paid - now).num_days().max(0);
            }
        }
        if !active {
            if let Some(ends) = parse_ts(&row.trial_ends_at) {
                if ends > now {
                    active = true;
                    days_left = (ends - now).num_days().max(0);
                }
            }
        }

        Ok(BillingStatus {
            exists: true,
            active,
            require_payment: !active && row.trial_started_at.is_some(),
            trial_started_at: row.trial_started_at,
            trial_ends_at: row.trial_ends_at,
            paid_until: row.paid_until,
            days_left,
            plan: row.plan,
            last_payment_status: row.last_payment_status,
        })
    }

    /// Extiende paid_until N días desde el mayor entre ahora y el valor
    /// guardado. Crea la cuenta si no existía (pago sin trial previo).
    pub async fn mark_paid(
        &self,
        billing_key: &str,
        days: i64,
        plan: Option<&str>,
        status: &str,
    ) -> Result<()> {
        let now = Utc::now();
        sqlx::query("INSERT OR IGNORE INTO billing_accounts (billing_key, created_at) VALUES (?, ?)")
            .bind(billing_key)
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;

        let row = self.account(billing_key).await?;
        let base = row
            .and_then(|r| parse_ts(&r.paid_until))
            .filter(|paid| *paid > now)
            .unwrap_or(now);
        let new_paid = base + Duration::days(days.max(1));

        sqlx::query(
            "UPDATE billing_accounts
                SET paid_until = ?, plan = COALESCE(?, plan),
                    last_payment_status = ?, updated_at = ?
              WHERE billing_key = ?",
        )
        .bind(new_paid.to_rfc3339())
        .bind(plan)
        .bind(status)
        .bind(now.to_rfc3339())
        .bind(billing_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Activación por pago confirmado: extiende 30 días por mes y guarda
    /// email y plan en la cuenta.
    pub async fn ensure_tenant_active(
        &self,
        tenant_key: &str,
        email: Option<&str>,
        plan: &str,
        months: i64,
    ) -> Result<()> {
        self.mark_paid(tenant_key, 30 * months.max(1), Some(plan), "paid")
            .await?;
        sqlx::query(
            "UPDATE billing_accounts SET email = COALESCE(?, email) WHERE billing_key = ?",
        )
        .bind(email.map(|e| e.trim().to_lowercase()))
        .bind(tenant_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_inactive(&self, tenant_key: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE billing_accounts
                SET last_payment_status = 'canceled', paid_until = ?, updated_at = ?
              WHERE billing_key = ?",
        )
        .bind(&now)
        .bind(&now)
        .bind(tenant_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn is_active_by_key(&self, billing_key: &str) -> Result<bool> {
        match self.account(billing_key).await? {
            Some(row) => Ok(row_is_active(&row.trial_ends_at, &row.paid_until)),
            None => Ok(false),
        }
    }

    pub async fn is_active_by_email(&self, email: &str) -> Result<bool> {
        let rows = sqlx::query_as::<_, AccountRow>(
            "SELECT trial_started_at, trial_ends_at, paid_until, plan, last_payment_status
             FROM billing_accounts WHERE email = ?",
        )
        .bind(email.trim().to_lowercase())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .any(|r| row_is_active(&r.trial_ends_at, &r.paid_until)))
    }

    /// Gate de envío: bypass admin, email activo o cualquiera de los
    /// identificadores de instancia activo (directo o con prefijo iid:).
    pub async fn is_active_for_claims(&self, claims: &Value) -> Result<bool> {
        if self.is_admin_bypass(claims) {
            return Ok(true);
        }
        let email = str_claim(claims, &["email", "user_email"]);
        if !email.is_empty() && self.is_active_by_email(&email).await? {
            return Ok(true);
        }
        for key in [
            "instance_id",
            "phone_number_id",
            "pnid",
            "instance_token",
            "token",
            "sub",
        ] {
            let v = str_claim(claims, &[key]);
            if v.is_empty() {
                continue;
            }
            if self.is_active_by_key(&v).await?
                || self.is_active_by_key(&canonical_instance_key(&v)).await?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ---------- pagos ----------

    pub async fn create_pending_payment(
        &self,
        reference_id: &str,
        tenant_key: &str,
        email: &str,
        plan: &str,
        amount_cents: i64,
        raw: Option<&Value>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let raw_text = match raw {
            Some(v) => serde_json::to_string(v)?,
            None => "{}".to_string(),
        };
        sqlx::query(
            "INSERT OR IGNORE INTO payments
                 (id, reference_id, tenant_key, email, plan, amount_cents, status, raw, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(reference_id)
        .bind(tenant_key)
        .bind(email)
        .bind(plan)
        .bind(amount_cents)
        .bind(&raw_text)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_payment_status(
        &self,
        reference_id: &str,
        status: &str,
        raw: Option<&Value>,
    ) -> Result<()> {
        let raw_text = match raw {
            Some(v) => Some(serde_json::to_string(v)?),
            None => None,
        };
        sqlx::query(
            "UPDATE payments SET status = ?, raw = COALESCE(?, raw), updated_at = ?
             WHERE reference_id = ?",
        )
        .bind(status)
        .bind(raw_text)
        .bind(Utc::now().to_rfc3339())
        .bind(reference_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_payment(&self, reference_id: &str) -> Result<Option<PaymentRecord>> {
        let row = sqlx::query_as::<_, PaymentRecord>(
            "SELECT id, reference_id, tenant_key, email, plan, amount_cents, status, raw,
                    created_at, updated_at
             FROM payments WHERE reference_id = ?",
        )
        .bind(reference_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

fn str_claim(claims: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| claims.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("")
        .to_string()
}
