//! services/message_store_service.rs
//! Archivo local de mensajes. El upsert es best-effort: las rutas lo
//! disparan en background y nunca bloquean la respuesta.

use anyhow::Result;
use serde_json::Value;
use sqlx::{Pool, Sqlite};

use crate::models::message_model::StoredMessage;
use crate::services::stage_service::{extract_ts, is_from_me};

/// Id de mensaje en cualquiera de los formatos que entrega el gateway.
pub fn extract_msgid(m: &Value) -> Option<String> {
    for k in ["id", "msgid", "messageId", "wa_msgid", "wa_message_id"] {
        if let Some(s) = m.get(k).and_then(Value::as_str) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    for p in ["/key/id", "/message/key/id"] {
        if let Some(s) = m.pointer(p).and_then(Value::as_str) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

/// Texto crudo del mensaje (sin normalizar, para el archivo).
pub fn extract_raw_text(m: &Value) -> Option<String> {
    let candidates = [
        m.get("text"),
        m.get("caption"),
        m.get("body"),
        m.pointer("/message/text"),
        m.pointer("/message/conversation"),
        m.pointer("/message/extendedTextMessage/text"),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|s| !s.trim().is_empty())
        .map(String::from)
}

pub fn extract_media(m: &Value) -> (Option<String>, Option<String>) {
    let url = ["mediaUrl", "url", "media_url"]
        .iter()
        .filter_map(|k| m.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(String::from);
    let mime = ["mimetype", "mime", "media_mime"]
        .iter()
        .filter_map(|k| m.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(String::from);
    (url, mime)
}

/// Fila lista para insertar; None cuando el mensaje no trae id usable.
pub fn message_row(instance_id: &str, chatid: &str, m: &Value) -> Option<StoredMessage> {
    let msgid = extract_msgid(m)?;
    let (media_url, media_mime) = extract_media(m);
    Some(StoredMessage {
        instance_id: instance_id.to_string(),
        chatid: chatid.to_string(),
        msgid,
        from_me: is_from_me(m),
        ts: extract_ts(m),
        text: extract_raw_text(m),
        media_url,
        media_mime,
    })
}

#[derive(Clone)]
pub struct MessageStoreService {
    pool: Pool<Sqlite>,
}

impl MessageStoreService {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        MessageStoreService { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                instance_id TEXT NOT NULL,
                chatid      TEXT NOT NULL,
                msgid       TEXT NOT NULL,
                from_me     INTEGER NOT NULL DEFAULT 0,
                ts          INTEGER NOT NULL DEFAULT 0,
                text        TEXT,
                media_url   TEXT,
                media_mime  TEXT,
                PRIMARY KEY (instance_id, chatid, msgid)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert por mensaje: el timestamp nunca retrocede y texto o medios
    /// ya guardados no se pisan con null.
    pub async fn bulk_upsert(
        &self,
        instance_id: &str,
        chatid: &str,
        items: &[Value],
    ) -> Result<i64> {
        let mut stored = 0i64;
        for m in items {
            let row = match message_row(instance_id, chatid, m) {
                Some(r) => r,
                None => continue,
            };
            sqlx::query(
                r#"
                INSERT INTO messages
                    (instance_id, chatid, msgid, from_me, ts, text, media_url, media_mime)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (instance_id, chatid, msgid) DO UPDATE SET
                    from_me    = excluded.from_me,
                    ts         = MAX(messages.ts, excluded.ts),
                    text       = COALESCE(excluded.text, messages.text),
                    media_url  = COALESCE(excluded.media_url, messages.media_url),
                    media_mime = COALESCE(excluded.media_mime, messages.media_mime)
                "#,
            )
            .bind(&row.instance_id)
            .bind(&row.chatid)
            .bind(&row.msgid)
            .bind(row.from_me)
            .bind(row.ts)
            .bind(&row.text)
            .bind(&row.media_url)
            .bind(&row.media_mime)
            .execute(&self.pool)
            .await?;
            stored += 1;
        }
        Ok(stored)
    }
}
