use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use sqlx::{Pool, Sqlite};

use crate::config::app_config::AppConfig;
use crate::logger::init_logger;
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

mod app;
mod config;
mod handlers;
mod logger;
mod models;
mod services;
#[cfg(test)]
mod tests;

async fn setup_database(db_path: &str) -> Pool<Sqlite> {
    // 1) Crear la carpeta de la base si la ruta la trae
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).expect("No se pudo crear el directorio de la base");
        }
    }

    // 2) mode=rwc crea el archivo en el primer arranque
    let db_url = format!("sqlite://{}?mode=rwc", db_path);
    log::info!("Conectando a SQLite en {}", db_url);

    // 3) Conectarnos con SQLx
    Pool::<Sqlite>::connect(&db_url)
        .await
        .expect("No se pudo conectar a la base de datos SQLite.")
}

/// CORS según FRONTEND_ORIGIN: con `*` se abre a cualquier origen (sin
/// credenciales, actix no permite combinarlas); con lista explícita se
/// habilitan credenciales.
fn build_cors(origins: &[String]) -> Cors {
    if origins.iter().any(|o| o == "*") {
        Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
    } else {
        let mut cors = Cors::default()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();
        for origin in origins {
            cors = cors.allowed_origin(origin);
        }
        cors
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let config = AppConfig::from_env().expect("Configuración inválida");

    // Conectarnos a la DB
    let db_pool = setup_database(&config.db_path).await;

    // Verificar la conexión
    let conn = db_pool.acquire().await.expect("Falló la conexión");
    drop(conn);

    let auth_service = AuthService::new(
        config.jwt_secret.clone(),
        config.jwt_expire_minutes,
        config.user_jwt_ttl_min,
        config.uazapi_host.clone(),
    );
    let uazapi_service = UazapiService::new();

    // UserService
    let user_service = UserService::new(db_pool.clone());
    if let Err(e) = user_service.ensure_schema().await {
        panic!("Fallo en el esquema de 'users': {:?}", e);
    }

    // LeadStatusService
    let lead_status_service = LeadStatusService::new(db_pool.clone());
    if let Err(e) = lead_status_service.ensure_schema().await {
        panic!("Fallo en el esquema de 'lead_status': {:?}", e);
    }

    // CrmService
    let crm_service = CrmService::new(db_pool.clone());
    if let Err(e) = crm_service.ensure_schema().await {
        panic!("Fallo en el esquema del CRM: {:?}", e);
    }

    // MessageStoreService
    let message_store_service = MessageStoreService::new(db_pool.clone());
    if let Err(e) = message_store_service.ensure_schema().await {
        panic!("Fallo en el esquema de 'messages': {:?}", e);
    }

    // BillingService
    let billing_service = BillingService::new(
        db_pool.clone(),
        config.billing_salt.clone(),
        config.trial_days,
        config.admin_bypass_emails.clone(),
        config.admin_bypass_hosts.clone(),
        config.admin_bypass_tokens.clone(),
    );
    if let Err(e) = billing_service.ensure_schema().await {
        panic!("Fallo en el esquema de billing: {:?}", e);
    }

    // InstanceService
    let instance_service = InstanceService::new(db_pool.clone());
    if let Err(e) = instance_service.ensure_schema().await {
        panic!("Fallo en el esquema de 'uaz_instances': {:?}", e);
    }

    let classify_service =
        ClassifyService::new(uazapi_service.clone(), lead_status_service.clone());
    let stripe_service = StripeService::new(config.stripe.clone());
    let getnet_service = GetnetService::new(config.getnet.clone());

    log::info!("[Luna] CORS allow_origins = {:?}", config.origins());
    log::info!("[Luna] UAZAPI_HOST = {:?}", config.uazapi_host);

    // Levantar servidor
    let port = config.port;
    log::info!("Levantando servidor en 0.0.0.0:{}", port);
    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&config.origins()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(uazapi_service.clone()))
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(lead_status_service.clone()))
            .app_data(web::Data::new(crm_service.clone()))
            .app_data(web::Data::new(message_store_service.clone()))
            .app_data(web::Data::new(billing_service.clone()))
            .app_data(web::Data::new(instance_service.clone()))
            .app_data(web::Data::new(classify_service.clone()))
            .app_data(web::Data::new(stripe_service.clone()))
            .app_data(web::Data::new(getnet_service.clone()))
            .configure(app::init_app)
    })
    .workers(1)
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
