//! tests/mod.rs
//! Pruebas unitarias e HTTP. Las de persistencia corren contra
//! sqlite::memory: (una conexión por pool para compartir el esquema).

pub mod auth_tests;
pub mod billing_tests;
pub mod config_tests;
pub mod crm_tests;
pub mod http_tests;
pub mod payment_tests;
pub mod stage_tests;
