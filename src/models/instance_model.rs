//! models/instance_model.rs
//! Aprovisionamiento de instancias UAZAPI.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInstanceRequest {
    /// Ej.: https://hia-clientes.uazapi.com
    pub host: String,
    pub display_name: Option<String>,
    /// Dónde la UAZAPI postea eventos (opcional).
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceCreated {
    pub instance: String,
    pub status: String,
}

/// Query de GET /api/uaz/instance/{qr,status}.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceQuery {
    pub instance: String,
    pub host: String,
}
