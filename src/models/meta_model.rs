//! models/meta_model.rs
//! Querys/bodies de los proxies de metadatos, media y SSE.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SseQuery {
    /// Lista de eventos UAZAPI separados por coma.
    pub events: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NameImageQuery {
    pub chatid: String,
}

/// Body de POST /api/chat/name-image.
#[derive(Debug, Clone, Deserialize)]
pub struct NameImageBody {
    /// Ej.: 553199999999@s.whatsapp.net
    pub number: String,
    #[serde(default = "default_preview")]
    pub preview: bool,
}

fn default_preview() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaProxyQuery {
    pub u: String,
}
