//! tests/http_tests.rs
//! Tests de integración sobre la tabla de rutas completa, con la misma
//! inyección de servicios que usa main (base sqlite::memory:).

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{test, web, App};
    use serde_json::{json, Value};
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};

    use crate::config::app_config::{AppConfig, GetnetConfig, StripeConfig};
    use crate::services::auth_service::AuthService;
    use crate::services::billing_service::BillingService;
    use crate::services::classify_service::ClassifyService;
    use crate::services::crm_service::CrmService;
    use crate::services::getnet_service::GetnetService;
    use crate::services::instance_service::InstanceService;
    use crate::services::lead_status_service::LeadStatusService;
    use crate::services::message_store_service::MessageStoreService;
    use crate::services::stripe_service::StripeService;
    use crate::services::uazapi_service::UazapiService;
    use crate::services::user_service::UserService;

    struct TestCtx {
        config: web::Data<AppConfig>,
        auth: web::Data<AuthService>,
        uazapi: web::Data<UazapiService>,
        users: web::Data<UserService>,
        leads: web::Data<LeadStatusService>,
        crm: web::Data<CrmService>,
        store: web::Data<MessageStoreService>,
        billing: web::Data<BillingService>,
        instances: web::Data<InstanceService>,
        classify: web::Data<ClassifyService>,
        stripe: web::Data<StripeService>,
        getnet: web::Data<GetnetService>,
    }

    async fn memory_pool() -> Pool<Sqlite> {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("No se pudo abrir sqlite::memory:")
    }

    fn test_config() -> AppConfig {
        AppConfig {
            port: 8000,
            db_path: ":memory:".to_string(),
            frontend_origin: "*".to_string(),
            jwt_secret: "secreto-test".to_string(),
            jwt_expire_minutes: 60,
            user_jwt_ttl_min: 60,
            uazapi_host: Some("gw.test".to_string()),
            trial_days: 7,
            billing_salt: "salt-test".to_string(),
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

    async fn ctx() -> TestCtx {
        let config = test_config();
        let pool = memory_pool().await;

        let auth = AuthService::new(
            config.jwt_secret.clone(),
            config.jwt_expire_minutes,
            config.user_jwt_ttl_min,
            config.uazapi_host.clone(),
        );
        let uazapi = UazapiService::new();

        let users = UserService::new(pool.clone());
        users.ensure_schema().await.expect("schema users");
        let leads = LeadStatusService::new(pool.clone());
        leads.ensure_schema().await.expect("schema lead_status");
        let crm = CrmService::new(pool.clone());
        crm.ensure_schema().await.expect("schema crm_status");
        let store = MessageStoreService::new(pool.clone());
        store.ensure_schema().await.expect("schema messages");
        let billing = BillingService::new(
            pool.clone(),
            config.billing_salt.clone(),
            config.trial_days,
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        billing.ensure_schema().await.expect("schema billing");
        let instances = InstanceService::new(pool.clone());
        instances.ensure_schema().await.expect("schema uaz_instances");

        let classify = ClassifyService::new(uazapi.clone(), leads.clone());
        let stripe = StripeService::new(config.stripe.clone());
        let getnet = GetnetService::new(config.getnet.clone());

        TestCtx {
            config: web::Data::new(config),
            auth: web::Data::new(auth),
            uazapi: web::Data::new(uazapi),
            users: web::Data::new(users),
            leads: web::Data::new(leads),
            crm: web::Data::new(crm),
            store: web::Data::new(store),
            billing: web::Data::new(billing),
            instances: web::Data::new(instances),
            classify: web::Data::new(classify),
            stripe: web::Data::new(stripe),
            getnet: web::Data::new(getnet),
        }
    }

    macro_rules! init_app {
        ($ctx:expr) => {
            test::init_service(
                App::new()
                    .app_data($ctx.config.clone())
                    .app_data($ctx.auth.clone())
                    .app_data($ctx.uazapi.clone())
                    .app_data($ctx.users.clone())
                    .app_data($ctx.leads.clone())
                    .app_data($ctx.crm.clone())
                    .app_data($ctx.store.clone())
                    .app_data($ctx.billing.clone())
                    .app_data($ctx.instances.clone())
                    .app_data($ctx.classify.clone())
                    .app_data($ctx.stripe.clone())
                    .app_data($ctx.getnet.clone())
                    .configure(crate::app::init_app),
            )
            .await
        };
    }

    #[actix_rt::test]
    async fn test_health_endpoints() {
        let ctx = ctx().await;
        let app = init_app!(ctx);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["service"], "luna-backend");

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request())
                .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["origins"], json!(["*"]));
    }

    #[actix_rt::test]
    async fn test_login_and_me() {
        let ctx = ctx().await;
        let app = init_app!(ctx);

        // Sin token: 400 con el cuerpo de error uniforme.
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "token": "  " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);

        // Login válido: el JWT emitido se decodifica con el mismo secreto.
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "token": "tok-abc", "label": "Loja" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        let jwt = body["jwt"].as_str().unwrap().to_string();
        let claims = ctx.auth.decode(&jwt).unwrap();
        assert_eq!(claims["instance_token"], "tok-abc");
        assert_eq!(claims["label"], "Loja");

        // /me sin bearer: 401. Con el JWT devuelve los claims.
        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/api/auth/me").to_request())
                .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/auth/me")
            .insert_header(("Authorization", format!("Bearer {}", jwt)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["instance_token"], "tok-abc");
    }

    #[actix_rt::test]
    async fn test_bulk_lead_status_with_header_scope() {
        let ctx = ctx().await;
        let app = init_app!(ctx);

        // Sin JWT ni header: 401.
        let req = test::TestRequest::post()
            .uri("/api/lead-status/bulk")
            .set_json(json!({ "ids": ["a@s.whatsapp.net"] }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        // ids que no es lista: 400.
        let req = test::TestRequest::post()
            .uri("/api/lead-status/bulk")
            .insert_header(("x-instance-id", "inst1"))
            .set_json(json!({ "ids": "a@s.whatsapp.net" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        ctx.leads
            .upsert("inst1", "a@s.whatsapp.net", "lead", 1000, true)
            .await
            .unwrap();

        let req = test::TestRequest::post()
            .uri("/api/lead-status/bulk")
            .insert_header(("x-instance-id", "inst1"))
            .set_json(json!({ "ids": ["a@s.whatsapp.net", "b@s.whatsapp.net"] }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["items"]["a@s.whatsapp.net"]["stage"], "lead");
        // Los chats sin registro simplemente no aparecen.
        assert!(body["items"].get("b@s.whatsapp.net").is_none());
    }

    #[actix_rt::test]
    async fn test_stage_classify_persists_and_caches() {
        let ctx = ctx().await;
        let app = init_app!(ctx);

        let messages = json!([
            { "fromMe": true, "text": "Vou transferir você para o time", "messageTimestamp": 1700000000 }
        ]);
        let req = test::TestRequest::post()
            .uri("/api/stage/classify")
            .insert_header(("x-instance-id", "inst1"))
            .set_json(json!({ "chatid": "a@s.whatsapp.net", "messages": messages }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["stage"], "lead_quente");
        assert_eq!(body["cached"], false);

        // Segunda pasada con la misma transcripción: sale del banco.
        let messages = json!([
            { "fromMe": true, "text": "Vou transferir você para o time", "messageTimestamp": 1700000000 }
        ]);
        let req = test::TestRequest::post()
            .uri("/api/stage/classify")
            .insert_header(("x-instance-id", "inst1"))
            .set_json(json!({ "chatid": "a@s.whatsapp.net", "messages": messages }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["stage"], "lead_quente");
        assert_eq!(body["cached"], true);
    }

    #[actix_rt::test]
    async fn test_stage_classify_empty_transcript_defaults_to_lead() {
        let ctx = ctx().await;
        let app = init_app!(ctx);

        // Sin mensajes rigen igual las reglas del tablero: etapa "lead".
        let req = test::TestRequest::post()
            .uri("/api/stage/classify")
            .insert_header(("x-instance-id", "inst1"))
            .set_json(json!({ "chatid": "b@s.whatsapp.net", "messages": [] }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["stage"], "lead");
        assert_eq!(body["cached"], false);
        assert_eq!(body["last_msg_ts"], 0);

        // Y queda persistido así en el banco.
        let row = ctx.leads.get("inst1", "b@s.whatsapp.net").await.unwrap().unwrap();
        assert_eq!(row.stage, "lead");
    }

    #[actix_rt::test]
    async fn test_stream_chats_endpoint() {
        let ctx = ctx().await;
        let app = init_app!(ctx);

        // Sin JWT: 401 antes de abrir el stream.
        let req = test::TestRequest::post()
            .uri("/api/chats/stream")
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        // Con JWT el stream arranca como NDJSON; el gateway inalcanzable
        // corta con una única línea {"error": ...}.
        let jwt = ctx.auth.issue_instance_jwt("tok-stream", None, None).unwrap();
        let req = test::TestRequest::post()
            .uri("/api/chats/stream")
            .insert_header(("Authorization", format!("Bearer {}", jwt)))
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "application/x-ndjson"
        );
        let body = test::read_body(resp).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.ends_with('\n'));
        let line: Value = serde_json::from_str(text.trim()).unwrap();
        assert!(line["error"].as_str().unwrap().contains("/chat/find"));
    }

    #[actix_rt::test]
    async fn test_crm_endpoints() {
        let ctx = ctx().await;
        let app = init_app!(ctx);
        let jwt = ctx.auth.issue_instance_jwt("tok-crm", None, None).unwrap();
        let bearer = format!("Bearer {}", jwt);

        // Etapa fuera del vocabulario: 400.
        let req = test::TestRequest::post()
            .uri("/api/crm/status")
            .insert_header(("Authorization", bearer.clone()))
            .set_json(json!({ "chatid": "5531999998888", "stage": "contatos" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        // Alta válida: el number pelado se normaliza a chatid.
        let req = test::TestRequest::post()
            .uri("/api/crm/status")
            .insert_header(("Authorization", bearer.clone()))
            .set_json(json!({ "number": "5531999998888", "stage": "lead_quente", "notes": "vip" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["item"]["chatid"], "5531999998888@s.whatsapp.net");

        let req = test::TestRequest::get()
            .uri("/api/crm/item?chatid=5531999998888%40s.whatsapp.net")
            .insert_header(("Authorization", bearer.clone()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["stage"], "lead_quente");
        assert_eq!(body["notes"], "vip");

        let req = test::TestRequest::get()
            .uri("/api/crm/views")
            .insert_header(("Authorization", bearer))
            .to_request();
        let resp = test::call_service(&app, req).await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["counts"]["lead_quente"], 1);
        assert_eq!(body["counts"]["lead"], 0);
    }

    #[actix_rt::test]
    async fn test_messages_requires_chatid() {
        let ctx = ctx().await;
        let app = init_app!(ctx);
        let jwt = ctx.auth.issue_instance_jwt("tok-msg", None, None).unwrap();

        let req = test::TestRequest::post()
            .uri("/api/messages")
            .insert_header(("Authorization", format!("Bearer {}", jwt)))
            .set_json(json!({ "limit": 50 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "chatid é obrigatório");
    }

    #[actix_rt::test]
    async fn test_send_text_behind_paywall() {
        let ctx = ctx().await;
        let app = init_app!(ctx);
        let jwt = ctx.auth.issue_instance_jwt("tok-send", None, None).unwrap();

        // Sin cuenta de billing (ni trial): 402 antes de tocar el gateway.
        let req = test::TestRequest::post()
            .uri("/api/send-text")
            .insert_header(("Authorization", format!("Bearer {}", jwt)))
            .set_json(json!({ "number": "5531999998888", "text": "oi" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_rt::test]
    async fn test_billing_register_trial_roundtrip() {
        let ctx = ctx().await;
        let app = init_app!(ctx);
        let jwt = ctx.auth.issue_instance_jwt("tok-bill", None, None).unwrap();
        let bearer = format!("Bearer {}", jwt);

        let req = test::TestRequest::post()
            .uri("/api/billing/register-trial")
            .insert_header(("Authorization", bearer.clone()))
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/api/billing/status")
            .insert_header(("Authorization", bearer.clone()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"]["active"], true);
        assert_eq!(body["status"]["require_payment"], false);

        // Con el trial vigente el gate de envío deja pasar hasta el
        // gateway (host inexistente: 502, ya no 402).
        let req = test::TestRequest::post()
            .uri("/api/send-text")
            .insert_header(("Authorization", bearer))
            .set_json(json!({ "number": "5531999998888", "text": "oi" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
