//! services/lead_status_service.rs
//! Persistencia del estado de lead por (instancia, chat) en SQLite.

use anyhow::Result;
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::models::lead_status_model::LeadStatusRow;
use crate::services::stage_service::normalize_stage;

#[derive(Clone)]
pub struct LeadStatusService {
    pool: Pool<Sqlite>,
}

impl LeadStatusService {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        LeadStatusService { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS lead_status (
                instance_id  TEXT NOT NULL,
                chatid       TEXT NOT NULL,
                stage        TEXT NOT NULL,
                updated_at   TEXT,
                last_msg_ts  INTEGER NOT NULL DEFAULT 0,
                last_from_me INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (instance_id, chatid)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_lead_status_stage
             ON lead_status (instance_id, stage)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_lead_status_updated_at
             ON lead_status (instance_id, updated_at DESC)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_lead_status_last_msg_ts
             ON lead_status (instance_id, last_msg_ts DESC)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, instance_id: &str, chatid: &str) -> Result<Option<LeadStatusRow>> {
        let row = sqlx::query_as::<_, LeadStatusRow>(
            "SELECT instance_id, chatid, stage, updated_at, last_msg_ts, last_from_me
             FROM lead_status WHERE instance_id = ? AND chatid = ?",
        )
        .bind(instance_id)
        .bind(chatid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_many(
        &self,
        instance_id: &str,
        chatids: &[String],
    ) -> Result<Vec<LeadStatusRow>> {
        if chatids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; chatids.len()].join(",");
        let sql = format!(
            "SELECT instance_id, chatid, stage, updated_at, last_msg_ts, last_from_me
             FROM lead_status WHERE instance_id = ? AND chatid IN ({})",
            placeholders
        );
        let mut query = sqlx::query_as::<_, LeadStatusRow>(&sql).bind(instance_id);
        for chatid in chatids {
            query = query.bind(chatid);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Upsert de etapa. El timestamp nunca retrocede (MAX con el valor
    /// guardado) y la etapa entrante ya normalizada pisa la anterior.
    pub async fn upsert(
        &self,
        instance_id: &str,
        chatid: &str,
        stage: &str,
        last_msg_ts: i64,
        last_from_me: bool,
    ) -> Result<LeadStatusRow> {
        let stage = normalize_stage(stage);
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO lead_status (instance_id, chatid, stage, updated_at, last_msg_ts, last_from_me)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (instance_id, chatid) DO UPDATE SET
                stage        = excluded.stage,
                updated_at   = excluded.updated_at,
                last_msg_ts  = MAX(lead_status.last_msg_ts, excluded.last_msg_ts),
                last_from_me = excluded.last_from_me
            "#,
        )
        .bind(instance_id)
        .bind(chatid)
        .bind(stage)
        .bind(&now)
        .bind(last_msg_ts)
        .bind(last_from_me)
        .execute(&self.pool)
        .await?;

        match self.get(instance_id, chatid).await? {
            Some(row) => Ok(row),
            None => Ok(LeadStatusRow {
                instance_id: instance_id.to_string(),
                chatid: chatid.to_string(),
                stage: stage.to_string(),
                updated_at: Some(now),
                last_msg_ts,
                last_from_me,
            }),
        }
    }

    /// Registra un envío saliente sin tocar la etapa. Si el chat no
    /// existe todavía, lo crea en "contatos".
    pub async fn touch_outgoing(&self, instance_id: &str, chatid: &str, ts_ms: i64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO lead_status (instance_id, chatid, stage, updated_at, last_msg_ts, last_from_me)
            VALUES (?, ?, 'contatos', ?, ?, 1)
            ON CONFLICT (instance_id, chatid) DO UPDATE SET
                updated_at   = excluded.updated_at,
                last_msg_ts  = MAX(lead_status.last_msg_ts, excluded.last_msg_ts),
                last_from_me = 1
            "#,
        )
        .bind(instance_id)
        .bind(chatid)
        .bind(&now)
        .bind(ts_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// ¿Hace falta reclasificar? Sí cuando no hay fila guardada, cuando
    /// llegó actividad más nueva o cuando cambió la dirección del último
    /// mensaje.
    pub async fn should_reclassify(
        &self,
        instance_id: &str,
        chatid: &str,
        last_msg_ts: i64,
        last_from_me: Option<bool>,
    ) -> Result<bool> {
        let row = match self.get(instance_id, chatid).await? {
            Some(r) => r,
            None => return Ok(true),
        };
        if last_msg_ts > row.last_msg_ts {
            return Ok(true);
        }
        if let Some(fm) = last_from_me {
            if fm != row.last_from_me {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
