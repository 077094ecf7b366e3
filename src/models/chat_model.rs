//! models/chat_model.rs

use serde::Deserialize;

/// Query de POST /api/chats y /api/chats/stream.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatsQuery {
    /// Si true (default) usa banco cuando haya registro y clasifica sólo
    /// cuando falte o necesite reclasificar.
    pub classify: Option<bool>,
    /// Tamaño de página contra /chat/find (1..=500, default 100).
    pub page_size: Option<i64>,
    /// Máximo acumulado (1..=20000, default 5000).
    pub max_total: Option<i64>,
}

pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE_SIZE: i64 = 500;
pub const DEFAULT_MAX_TOTAL: i64 = 5000;
pub const MAX_MAX_TOTAL: i64 = 20000;
