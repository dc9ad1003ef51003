use chrono::{DateTime, NaiveDateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    domain::UserRole,
    error::{AppError, Result},
};

/// Identity established for one request. Threaded through handlers as
/// a typed extension; nothing downstream reads identity headers.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub club_id: Uuid,
    pub role: UserRole,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    user_id: String,
    club_id: String,
    role: String,
    expires_at: Option<NaiveDateTime>,
}

/// Validates bearer tokens issued by the external auth service. Only
/// the sha-256 hash of a token is ever stored or compared.
pub struct AuthService {
    pool: SqlitePool,
}

impl AuthService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn validate_token(&self, token: &str) -> Result<Option<AuthContext>> {
        let token_hash = hash_token(token);

        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT t.user_id, u.club_id, u.role, t.expires_at
            FROM api_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.token_hash = ?
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        if let Some(expires_at) = row.expires_at {
            let expires_at = DateTime::<Utc>::from_naive_utc_and_offset(expires_at, Utc);
            if expires_at < Utc::now() {
                return Ok(None);
            }
        }

        Ok(Some(AuthContext {
            user_id: Uuid::parse_str(&row.user_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            club_id: Uuid::parse_str(&row.club_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            role: parse_role(&row.role)?,
        }))
    }

    /// Registers a token hash for a user. Exists for the seed binary
    /// and tests; production tokens arrive pre-provisioned.
    pub async fn register_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO api_tokens (token_hash, user_id, expires_at, created_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            "#,
        )
        .bind(hash_token(token))
        .bind(user_id.to_string())
        .bind(expires_at.map(|dt| dt.naive_utc()))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}

fn parse_role(s: &str) -> Result<UserRole> {
    match s {
        "Admin" => Ok(UserRole::Admin),
        "Coach" => Ok(UserRole::Coach),
        "Parent" => Ok(UserRole::Parent),
        _ => Err(AppError::Database(format!("Invalid user role: {}", s))),
    }
}

pub fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
