//! services/crm_service.rs
//! Tablero CRM: una fila por (instancia, chat) con etapa, notas y meta.

use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::{Pool, Sqlite};

use crate::models::crm_model::{CrmRecord, STAGES};

/// Acepta wa_chatid completo, número pelado (10 a 15 dígitos) o
/// cualquier otro id con "@". Devuelve cadena vacía si no es usable.
pub fn normalize_chatid(raw: &str) -> String {
    let s = raw.trim();
    if s.contains("@s.whatsapp.net") {
        return s.to_string();
    }
    if s.len() >= 10 && s.len() <= 15 && s.chars().all(|c| c.is_ascii_digit()) {
        return format!("{}@s.whatsapp.net", s);
    }
    if s.contains('@') {
        return s.to_string();
    }
    String::new()
}

pub fn is_valid_stage(stage: &str) -> bool {
    STAGES.contains(&stage)
}

#[derive(sqlx::FromRow)]
struct CrmDbRow {
    chatid: String,
    stage: String,
    notes: String,
    meta: String,
    updated_at: i64,
}

impl CrmDbRow {
    fn into_record(self) -> CrmRecord {
        let meta = serde_json::from_str(&self.meta).unwrap_or_else(|_| json!({}));
        CrmRecord {
            chatid: self.chatid,
            stage: self.stage,
            notes: self.notes,
            meta,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct CrmService {
    pool: Pool<Sqlite>,
}

impl CrmService {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        CrmService { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS crm_status (
                instance_id TEXT NOT NULL,
                chatid      TEXT NOT NULL,
                stage       TEXT NOT NULL,
                notes       TEXT NOT NULL DEFAULT '',
                meta        TEXT NOT NULL DEFAULT '{}',
                updated_at  INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (instance_id, chatid)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Conteo por etapa, con las cinco etapas siempre presentes.
    pub async fn views_counts(&self, instance_id: &str) -> Result<Value> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT stage, COUNT(*) FROM crm_status WHERE instance_id = ? GROUP BY stage",
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = serde_json::Map::new();
        for stage in STAGES {
            counts.insert(stage.to_string(), json!(0));
        }
        for (stage, count) in rows {
            counts.insert(stage, json!(count));
        }
        Ok(Value::Object(counts))
    }

    /// Lista una columna del tablero. `q` filtra por chatid o notas y el
    /// total devuelto es el de la búsqueda, antes de paginar.
    pub async fn list(
        &self,
        instance_id: &str,
        stage: &str,
        q: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CrmRecord>, i64)> {
        let rows = sqlx::query_as::<_, CrmDbRow>(
            "SELECT chatid, stage, notes, meta, updated_at
             FROM crm_status WHERE instance_id = ? AND stage = ?
             ORDER BY updated_at DESC",
        )
        .bind(instance_id)
        .bind(stage)
        .fetch_all(&self.pool)
        .await?;

        let mut items: Vec<CrmRecord> = rows.into_iter().map(CrmDbRow::into_record).collect();
        if let Some(q) = q {
            let needle = q.trim().to_lowercase();
            if !needle.is_empty() {
                items.retain(|r| {
                    r.chatid.to_lowercase().contains(&needle)
                        || r.notes.to_lowercase().contains(&needle)
                });
            }
        }
        let total = items.len() as i64;
        let start = offset.max(0).min(total) as usize;
        let end = (start + limit.max(0) as usize).min(total as usize);
        Ok((items[start..end].to_vec(), total))
    }

    pub async fn get_item(&self, instance_id: &str, chatid: &str) -> Result<Option<CrmRecord>> {
        let row = sqlx::query_as::<_, CrmDbRow>(
            "SELECT chatid, stage, notes, meta, updated_at
             FROM crm_status WHERE instance_id = ? AND chatid = ?",
        )
        .bind(instance_id)
        .bind(chatid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CrmDbRow::into_record))
    }

    pub async fn set_status(
        &self,
        instance_id: &str,
        chatid: &str,
        stage: &str,
        notes: &str,
        meta: &Value,
    ) -> Result<CrmRecord> {
        let now = Utc::now().timestamp();
        let meta_text = serde_json::to_string(meta)?;
        sqlx::query(
            r#"
            INSERT INTO crm_status (instance_id, chatid, stage, notes, meta, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (instance_id, chatid) DO UPDATE SET
                stage      = excluded.stage,
                notes      = excluded.notes,
                meta       = excluded.meta,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(instance_id)
        .bind(chatid)
        .bind(stage)
        .bind(notes)
        .bind(&meta_text)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(CrmRecord {
            chatid: chatid.to_string(),
            stage: stage.to_string(),
            notes: notes.to_string(),
            meta: meta.clone(),
            updated_at: now,
        })
    }

    pub async fn delete(&self, instance_id: &str, chatid: &str) -> Result<()> {
        sqlx::query("DELETE FROM crm_status WHERE instance_id = ? AND chatid = ?")
            .bind(instance_id)
            .bind(chatid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mueve la etapa de un chat sin pisar notas ni meta. Etapas fuera
    /// del vocabulario caen en "lead". Chatid inválido se ignora.
    pub async fn set_stage_internal(
        &self,
        instance_id: &str,
        chatid_raw: &str,
        stage: &str,
    ) -> Result<()> {
        let chatid = normalize_chatid(chatid_raw);
        if chatid.is_empty() {
            return Ok(());
        }
        let stage = if is_valid_stage(stage) { stage } else { "lead" };
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO crm_status (instance_id, chatid, stage, notes, meta, updated_at)
            VALUES (?, ?, ?, '', '{}', ?)
            ON CONFLICT (instance_id, chatid) DO UPDATE SET
                stage      = excluded.stage,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(instance_id)
        .bind(&chatid)
        .bind(stage)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Alta masiva para el sync del tablero: crea los chats que faltan
    /// como "lead" y nunca toca los existentes. Devuelve cuántos creó.
    pub async fn create_missing(&self, instance_id: &str, chatids: &[String]) -> Result<i64> {
        let now = Utc::now().timestamp();
        let mut created = 0i64;
        for chatid in chatids {
            let res = sqlx::query(
                "INSERT OR IGNORE INTO crm_status (instance_id, chatid, stage, notes, meta, updated_at)
                 VALUES (?, ?, 'lead', '', '{}', ?)",
            )
            .bind(instance_id)
            .bind(chatid)
            .bind(now)
            .execute(&self.pool)
            .await?;
            created += res.rows_affected() as i64;
        }
        Ok(created)
    }

    pub async fn board_size(&self, instance_id: &str) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM crm_status WHERE instance_id = ?")
                .bind(instance_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
