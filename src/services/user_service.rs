//! services/user_service.rs
//! Cuentas de usuario (bcrypt) y vínculos usuario→instancia en SQLite.

use anyhow::Result;
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::models::user_model::{InstanceBinding, UserRecord};

#[derive(Clone)]
pub struct UserService {
    pool: Pool<Sqlite>,
}

impl UserService {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        UserService { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                email         TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at    TEXT NOT NULL,
                last_login_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_instances (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id    INTEGER NOT NULL,
                token      TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (user_id, token)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Alta de cuenta. Devuelve None si el email ya existe.
    pub async fn create_user(&self, email: &str, password: &str) -> Result<Option<UserRecord>> {
        let email = email.trim().to_lowercase();
        let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
        let now = Utc::now().to_rfc3339();
        let res = sqlx::query(
            "INSERT OR IGNORE INTO users (email, password_hash, created_at) VALUES (?, ?, ?)",
        )
        .bind(&email)
        .bind(&hash)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_user_by_email(&email).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, password_hash, created_at, last_login_at
             FROM users WHERE email = ?",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Falso tanto para contraseña incorrecta como para hash malformado.
    pub fn verify_password(&self, plain: &str, hashed: &str) -> bool {
        bcrypt::verify(plain, hashed).unwrap_or(false)
    }

    pub async fn touch_last_login(&self, user_id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Vincula (user_id, token). Idempotente: si el vínculo ya existía
    /// devuelve la fila guardada con existing = true.
    pub async fn attach_instance(
        &self,
        user_id: i64,
        token: &str,
    ) -> Result<(InstanceBinding, bool)> {
        let token = token.trim();
        let now = Utc::now().to_rfc3339();
        let res = sqlx::query(
            "INSERT OR IGNORE INTO user_instances (user_id, token, created_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(token)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        let existing = res.rows_affected() == 0;
        let row = sqlx::query_as::<_, InstanceBinding>(
            "SELECT id, user_id, token, created_at FROM user_instances
             WHERE user_id = ? AND token = ?",
        )
        .bind(user_id)
        .bind(token)
        .fetch_one(&self.pool)
        .await?;
        Ok((row, existing))
    }

    pub async fn list_instances(&self, user_id: i64) -> Result<Vec<InstanceBinding>> {
        let rows = sqlx::query_as::<_, InstanceBinding>(
            "SELECT id, user_id, token, created_at FROM user_instances
             WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn detach_instance(&self, user_id: i64, token: &str) -> Result<bool> {
        let res = sqlx::query("DELETE FROM user_instances WHERE user_id = ? AND token = ?")
            .bind(user_id)
            .bind(token.trim())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn count_instances(&self, user_id: i64) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM user_instances WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
