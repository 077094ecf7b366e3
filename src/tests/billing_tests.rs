//! tests/billing_tests.rs
//! Trial, activación por pago, gate de envío y registro de pagos.

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};

    use crate::services::billing_service::{
        canonical_instance_key, hmac_sha256_hex, BillingService,
    };

    async fn memory_pool() -> Pool<Sqlite> {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("No se pudo abrir sqlite::memory:")
    }

    async fn billing() -> BillingService {
        billing_with_bypass(Vec::new(), Vec::new(), Vec::new()).await
    }

    async fn billing_with_bypass(
        emails: Vec<String>,
        hosts: Vec<String>,
        tokens: Vec<String>,
    ) -> BillingService {
        let svc = BillingService::new(
            memory_pool().await,
            "salt-test".to_string(),
            7,
            emails,
            hosts,
            tokens,
        );
        svc.ensure_schema().await.expect("schema billing");
        svc
    }

    fn parse(ts: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_hmac_is_deterministic() {
        let a = hmac_sha256_hex("salt", "dado").unwrap();
        let b = hmac_sha256_hex("salt", "dado").unwrap();
        let c = hmac_sha256_hex("otro", "dado").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[actix_rt::test]
    async fn test_billing_key_precedence() {
        let svc = billing().await;
        // Instancia gana a todo.
        let key = svc
            .billing_key_from_claims(&json!({
                "instance_id": "i9", "sub": "user:3", "email": "a@b.c"
            }))
            .unwrap();
        assert_eq!(key.as_deref(), Some("iid:i9"));

        // Token de instancia cuando no hay id explícito.
        let key = svc
            .billing_key_from_claims(&json!({ "instance_token": "tok1" }))
            .unwrap();
        assert_eq!(key.as_deref(), Some("iid:tok1"));

        // Después el sub user:<id>.
        let key = svc
            .billing_key_from_claims(&json!({ "sub": "user:42", "email": "a@b.c" }))
            .unwrap();
        assert_eq!(key.as_deref(), Some("uid:42"));

        // Email con HMAC como último recurso.
        let key = svc
            .billing_key_from_claims(&json!({ "email": "A@B.C" }))
            .unwrap()
            .unwrap();
        assert!(key.starts_with("ue:"));
        // Case-insensitive por el lowercase previo.
        let key2 = svc
            .billing_key_from_claims(&json!({ "email": "a@b.c" }))
            .unwrap()
            .unwrap();
        assert_eq!(key, key2);

        assert!(svc.billing_key_from_claims(&json!({})).unwrap().is_none());
    }

    #[actix_rt::test]
    async fn test_ensure_trial_is_idempotent() {
        let svc = billing().await;
        svc.ensure_trial("iid:a").await.unwrap();
        let first = svc.get_status("iid:a").await.unwrap();
        assert!(first.exists);
        assert!(first.active);
        assert!(first.days_left <= 7);
        assert!(!first.require_payment);

        svc.ensure_trial("iid:a").await.unwrap();
        let second = svc.get_status("iid:a").await.unwrap();
        assert_eq!(first.trial_ends_at, second.trial_ends_at);
    }

    #[actix_rt::test]
    async fn test_mark_paid_extends_from_current_window() {
        let svc = billing().await;
        svc.mark_paid("iid:a", 30, Some("luna_base"), "paid").await.unwrap();
        let st = svc.get_status("iid:a").await.unwrap();
        let first_until = parse(st.paid_until.as_deref().unwrap());
        assert!(st.active);
        assert_eq!(st.plan.as_deref(), Some("luna_base"));

        // Segundo pago: suma sobre la ventana vigente, no sobre "ahora".
        svc.mark_paid("iid:a", 30, None, "paid").await.unwrap();
        let st = svc.get_status("iid:a").await.unwrap();
        let second_until = parse(st.paid_until.as_deref().unwrap());
        let gained = second_until - first_until;
        assert!(gained >= Duration::days(29) && gained <= Duration::days(31));
        // plan COALESCE: no se pisa con null.
        assert_eq!(st.plan.as_deref(), Some("luna_base"));
    }

    #[actix_rt::test]
    async fn test_expired_trial_requires_payment() {
        let pool = memory_pool().await;
        let svc = BillingService::new(
            pool.clone(),
            "salt-test".to_string(),
            7,
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        svc.ensure_schema().await.unwrap();
        svc.ensure_trial("iid:a").await.unwrap();
        // Vence el trial a mano.
        let past = (Utc::now() - Duration::days(1)).to_rfc3339();
        sqlx::query("UPDATE billing_accounts SET trial_ends_at = ? WHERE billing_key = 'iid:a'")
            .bind(&past)
            .execute(&pool)
            .await
            .unwrap();

        let st = svc.get_status("iid:a").await.unwrap();
        assert!(!st.active);
        assert!(st.require_payment);
        assert_eq!(st.days_left, 0);
    }

    #[actix_rt::test]
    async fn test_set_inactive_cancels_paid_window() {
        let svc = billing().await;
        svc.mark_paid("iid:a", 30, Some("luna_base"), "paid").await.unwrap();
        assert!(svc.is_active_by_key("iid:a").await.unwrap());

        svc.set_inactive("iid:a").await.unwrap();
        assert!(!svc.is_active_by_key("iid:a").await.unwrap());
        let st = svc.get_status("iid:a").await.unwrap();
        assert_eq!(st.last_payment_status.as_deref(), Some("canceled"));
    }

    #[actix_rt::test]
    async fn test_active_gate_for_claims() {
        let svc = billing().await;
        let claims = json!({ "instance_token": "tok1" });
        assert!(!svc.is_active_for_claims(&claims).await.unwrap());

        svc.ensure_trial(&canonical_instance_key("tok1")).await.unwrap();
        assert!(svc.is_active_for_claims(&claims).await.unwrap());

        // Por email también cuenta.
        let svc = billing().await;
        svc.ensure_tenant_active("iid:x", Some("cliente@luna.app"), "luna_base", 1)
            .await
            .unwrap();
        assert!(svc
            .is_active_for_claims(&json!({ "email": "cliente@luna.app" }))
            .await
            .unwrap());
    }

    #[actix_rt::test]
    async fn test_admin_bypass_lists() {
        let svc = billing_with_bypass(
            vec!["admin@luna.app".to_string()],
            vec!["bypass.uazapi.com".to_string()],
            vec!["tok-master".to_string()],
        )
        .await;
        assert!(svc.is_admin_bypass(&json!({ "email": "admin@luna.app" })));
        assert!(svc.is_admin_bypass(&json!({ "host": "bypass.uazapi.com" })));
        assert!(svc.is_admin_bypass(&json!({ "instance_token": "tok-master" })));
        assert!(!svc.is_admin_bypass(&json!({ "email": "otro@luna.app" })));
        // Bypass implica activo sin cuenta en el banco.
        assert!(svc
            .is_active_for_claims(&json!({ "email": "admin@luna.app" }))
            .await
            .unwrap());
    }

    #[actix_rt::test]
    async fn test_payment_lifecycle() {
        let svc = billing().await;
        svc.create_pending_payment("st_ref1", "iid:a", "a@b.c", "luna_base", 34990, None)
            .await
            .unwrap();
        // Alta duplicada no pisa.
        svc.create_pending_payment("st_ref1", "otro", "x@y.z", "otro_plan", 1, None)
            .await
            .unwrap();

        let row = svc.get_payment("st_ref1").await.unwrap().unwrap();
        assert_eq!(row.status, "pending");
        assert_eq!(row.tenant_key, "iid:a");
        assert_eq!(row.amount_cents, 34990);

        svc.update_payment_status("st_ref1", "paid", Some(&json!({ "evento": 1 })))
            .await
            .unwrap();
        let row = svc.get_payment("st_ref1").await.unwrap().unwrap();
        assert_eq!(row.status, "paid");
        assert!(row.raw.unwrap().contains("evento"));

        assert!(svc.get_payment("no-existe").await.unwrap().is_none());
    }
}
