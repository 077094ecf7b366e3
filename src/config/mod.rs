//! config/mod.rs
//! Configuración de la aplicación leída del entorno.

pub mod app_config;
