//! models/lead_status_model.rs
//! Estado de lead por (instancia, chat): etapa, último mensaje y dirección.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fila de la tabla `lead_status`. `updatedAt` mantiene el nombre
/// camelCase que el front ya consume.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LeadStatusRow {
    pub instance_id: String,
    pub chatid: String,
    pub stage: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,
    pub last_msg_ts: i64,
    pub last_from_me: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeadStatusQuery {
    pub chatid: String,
}

/// Body de POST /api/lead-status/bulk: { ids: [...] } o { chatids: [...] }.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkStatusRequest {
    pub ids: Option<Value>,
    pub chatids: Option<Value>,
}

/// Body de POST /api/stage/classify.
#[derive(Debug, Clone, Deserialize)]
pub struct StageClassifyRequest {
    pub chatid: Option<String>,
    #[serde(default)]
    pub messages: Vec<Value>,
}
