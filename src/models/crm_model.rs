//! models/crm_model.rs
//! Tablero CRM: registros por (instancia, chatid) con etapa, notas y meta.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Etapas oficiales del tablero (mismo orden que el front).
pub const STAGES: [&str; 5] = [
    "lead",
    "lead_qualificado",
    "lead_quente",
    "prospectivo_cliente",
    "cliente",
];

#[derive(Debug, Clone, Serialize)]
pub struct CrmRecord {
    pub chatid: String,
    pub stage: String,
    pub notes: String,
    pub meta: Value,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrmListQuery {
    pub stage: String,
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrmItemQuery {
    pub chatid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrmDeleteQuery {
    pub chatid: String,
}

/// Body de POST /api/crm/sync (todos los campos opcionales).
#[derive(Debug, Clone, Deserialize)]
pub struct CrmSyncRequest {
    #[serde(default = "default_limit_per_page")]
    pub limit_per_page: i64,
    #[serde(default = "default_max_total")]
    pub max_total: i64,
    #[serde(default = "default_sort")]
    pub sort: String,
}

impl Default for CrmSyncRequest {
    fn default() -> Self {
        CrmSyncRequest {
            limit_per_page: default_limit_per_page(),
            max_total: default_max_total(),
            sort: default_sort(),
        }
    }
}

fn default_limit_per_page() -> i64 {
    500
}

fn default_max_total() -> i64 {
    5000
}

fn default_sort() -> String {
    "-wa_lastMsgTimestamp".to_string()
}
