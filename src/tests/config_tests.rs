//! tests/config_tests.rs
//! Resolución del puerto HTTP y de los orígenes CORS.

#[cfg(test)]
mod tests {
    use crate::config::app_config::{resolve_port, AppConfig, GetnetConfig, StripeConfig};

    fn config_with_origin(origin: &str) -> AppConfig {
        AppConfig {
            port: 8000,
            db_path: "./data/luna.db".to_string(),
            frontend_origin: origin.to_string(),
            jwt_secret: "s".to_string(),
            jwt_expire_minutes: 60,
            user_jwt_ttl_min: 60,
            uazapi_host: None,
            trial_days: 7,
            billing_salt: "luna".to_string(),
            price_cents: 34990,
            admin_bypass_emails: Vec::new(),
            admin_bypass_hosts: Vec::new(),
            admin_bypass_tokens: Vec::new(),
            public_base_url: String::new(),
            stripe: StripeConfig {
                secret_key: String::new(),
                price_id: String::new(),
                webhook_secret: String::new(),
                return_base: String::new(),
                cancel_base: String::new(),
            },
            getnet: GetnetConfig {
                base_url: String::new(),
                client_id: String::new(),
                client_secret: String::new(),
                seller_id: String::new(),
                checkout_url: String::new(),
                checkout_endpoint: String::new(),
                return_base: String::new(),
                notify_url: String::new(),
            },
        }
    }

    #[test]
    fn test_resolve_port_defaults_to_8000() {
        assert_eq!(resolve_port(None).unwrap(), 8000);
        assert_eq!(resolve_port(Some(String::new())).unwrap(), 8000);
        assert_eq!(resolve_port(Some("   ".to_string())).unwrap(), 8000);
    }

    #[test]
    fn test_resolve_port_honors_override() {
        assert_eq!(resolve_port(Some("9090".to_string())).unwrap(), 9090);
        assert_eq!(resolve_port(Some(" 9090 ".to_string())).unwrap(), 9090);
    }

    #[test]
    fn test_resolve_port_rejects_garbage() {
        assert!(resolve_port(Some("abc".to_string())).is_err());
        assert!(resolve_port(Some("80a0".to_string())).is_err());
        // Fuera del rango de u16 también es error, no fallback.
        assert!(resolve_port(Some("70000".to_string())).is_err());
        assert!(resolve_port(Some("-1".to_string())).is_err());
    }

    #[test]
    fn test_cors_origins() {
        assert_eq!(config_with_origin("*").origins(), vec!["*"]);
        assert_eq!(config_with_origin("").origins(), vec!["*"]);
        assert_eq!(
            config_with_origin("https://app.luna.com").origins(),
            vec!["https://app.luna.com"]
        );
        assert_eq!(
            config_with_origin(" https://a.com , https://b.com ,").origins(),
            vec!["https://a.com", "https://b.com"]
        );
    }
}
