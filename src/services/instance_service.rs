//! services/instance_service.rs
//! Registro local de instancias aprovisionadas en la UAZAPI. Nunca se
//! guarda el token en claro, sólo su sha256.

use anyhow::Result;
use chrono::Utc;
use openssl::sha::sha256;
use sqlx::{Pool, Sqlite};

pub fn sha256_hex(data: &str) -> String {
    sha256(data.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[derive(Clone)]
pub struct InstanceService {
    pool: Pool<Sqlite>,
}

impl InstanceService {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        InstanceService { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS uaz_instances (
                tenant     TEXT NOT NULL,
                host       TEXT NOT NULL,
                instance   TEXT NOT NULL,
                token_hash TEXT NOT NULL,
                status     TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (tenant, instance)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save(
        &self,
        tenant: &str,
        host: &str,
        instance: &str,
        token_hash: &str,
        status: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO uaz_instances (tenant, host, instance, token_hash, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (tenant, instance) DO UPDATE SET
                host       = excluded.host,
                token_hash = excluded.token_hash,
                status     = excluded.status
            "#,
        )
        .bind(tenant)
        .bind(host)
        .bind(instance)
        .bind(token_hash)
        .bind(status)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Actualiza el estado reportado por el webhook de la UAZAPI. El
    /// evento identifica la instancia por nombre, sin tenant.
    pub async fn update_status(&self, instance: &str, status: &str) -> Result<u64> {
        let res = sqlx::query("UPDATE uaz_instances SET status = ? WHERE instance = ?")
            .bind(status)
            .bind(instance)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    pub async fn status_of(&self, tenant: &str, instance: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT status FROM uaz_instances WHERE tenant = ? AND instance = ?",
        )
        .bind(tenant)
        .bind(instance)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(s,)| s))
    }
}
