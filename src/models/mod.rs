//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod auth_model;
pub mod billing_model;
pub mod chat_model;
pub mod crm_model;
pub mod instance_model;
pub mod lead_status_model;
pub mod message_model;
pub mod meta_model;
pub mod payment_model;
pub mod send_model;
pub mod user_model;
