//! services/mod.rs
//! Módulo que agrupa distintos "servicios" o "capas de negocio" de la app.

pub mod auth_service;
pub mod billing_service;
pub mod classify_service;
pub mod crm_service;
pub mod getnet_service;
pub mod instance_service;
pub mod lead_status_service;
pub mod message_store_service;
pub mod stage_service;
pub mod stripe_service;
pub mod uazapi_service;
pub mod user_service;
