use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        BootstrapClubRequest, Club, CreateClubRequest, CreateUserRequest, LevelFee, User,
        UserRole,
    },
    error::{AppError, Result},
    repository::ClubRepository,
};

#[derive(FromRow)]
struct ClubRow {
    id: String,
    name: String,
    currency: String,
    contact_email: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct UserRow {
    id: String,
    club_id: String,
    email: String,
    full_name: String,
    role: String,
    phone: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct LevelFeeRow {
    id: String,
    club_id: String,
    level: String,
    monthly_fee_cents: i64,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteClubRepository {
    pool: SqlitePool,
}

impl SqliteClubRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_club(row: ClubRow) -> Result<Club> {
        Ok(Club {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            name: row.name,
            currency: row.currency,
            contact_email: row.contact_email,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn row_to_user(row: UserRow) -> Result<User> {
        Ok(User {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            club_id: Uuid::parse_str(&row.club_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            email: row.email,
            full_name: row.full_name,
            role: Self::parse_user_role(&row.role)?,
            phone: row.phone,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn row_to_level_fee(row: LevelFeeRow) -> Result<LevelFee> {
        Ok(LevelFee {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            club_id: Uuid::parse_str(&row.club_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            level: row.level,
            monthly_fee_cents: row.monthly_fee_cents,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_user_role(s: &str) -> Result<UserRole> {
        match s {
            "Admin" => Ok(UserRole::Admin),
            "Coach" => Ok(UserRole::Coach),
            "Parent" => Ok(UserRole::Parent),
            _ => Err(AppError::Database(format!("Invalid user role: {}", s))),
        }
    }

    fn user_role_to_str(role: &UserRole) -> &'static str {
        match role {
            UserRole::Admin => "Admin",
            UserRole::Coach => "Coach",
            UserRole::Parent => "Parent",
        }
    }
}

#[async_trait]
impl ClubRepository for SqliteClubRepository {
    async fn create(&self, request: CreateClubRequest) -> Result<Club> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let currency = request.currency.unwrap_or_else(|| "ZAR".to_string());
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO clubs (id, name, currency, contact_email, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id_str)
        .bind(&request.name)
        .bind(&currency)
        .bind(&request.contact_email)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created club".to_string()))
    }

    async fn bootstrap(&self, request: BootstrapClubRequest) -> Result<(Club, User)> {
        let club_id = Uuid::new_v4();
        let admin_id = Uuid::new_v4();
        let currency = request.currency.unwrap_or_else(|| "ZAR".to_string());
        let now = Utc::now().naive_utc();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO clubs (id, name, currency, contact_email, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(club_id.to_string())
        .bind(&request.name)
        .bind(&currency)
        .bind(&request.contact_email)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO users (id, club_id, email, full_name, role, phone, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'Admin', NULL, ?, ?)
            "#,
        )
        .bind(admin_id.to_string())
        .bind(club_id.to_string())
        .bind(&request.admin_email)
        .bind(&request.admin_name)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        for fee in &request.level_fees {
            sqlx::query(
                r#"
                INSERT INTO level_fees (id, club_id, level, monthly_fee_cents, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(club_id.to_string())
            .bind(&fee.level)
            .bind(fee.monthly_fee_cents)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let club = self
            .find_by_id(club_id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created club".to_string()))?;
        let admin = self
            .find_user(club_id, admin_id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created admin".to_string()))?;

        Ok((club, admin))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Club>> {
        let row = sqlx::query_as::<_, ClubRow>(
            r#"
            SELECT id, name, currency, contact_email, created_at, updated_at
            FROM clubs
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_club(r)?)),
            None => Ok(None),
        }
    }

    async fn create_user(&self, request: CreateUserRequest) -> Result<User> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let role_str = Self::user_role_to_str(&request.role);

        sqlx::query(
            r#"
            INSERT INTO users (id, club_id, email, full_name, role, phone, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(request.club_id.to_string())
        .bind(&request.email)
        .bind(&request.full_name)
        .bind(role_str)
        .bind(&request.phone)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if crate::error::is_unique_violation(&e) {
                AppError::Conflict("Email already exists for this club".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })?;

        self.find_user(request.club_id, id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created user".to_string()))
    }

    async fn find_user(&self, club_id: Uuid, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, club_id, email, full_name, role, phone, created_at, updated_at
            FROM users
            WHERE id = ? AND club_id = ?
            "#,
        )
        .bind(id.to_string())
        .bind(club_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_user(r)?)),
            None => Ok(None),
        }
    }

    async fn set_level_fee(
        &self,
        club_id: Uuid,
        level: &str,
        monthly_fee_cents: i64,
    ) -> Result<LevelFee> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO level_fees (id, club_id, level, monthly_fee_cents, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(club_id, level) DO UPDATE SET
                monthly_fee_cents = excluded.monthly_fee_cents,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id.to_string())
        .bind(club_id.to_string())
        .bind(level)
        .bind(monthly_fee_cents)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_level_fee(club_id, level)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve level fee".to_string()))
    }

    async fn find_level_fee(&self, club_id: Uuid, level: &str) -> Result<Option<LevelFee>> {
        let row = sqlx::query_as::<_, LevelFeeRow>(
            r#"
            SELECT id, club_id, level, monthly_fee_cents, created_at, updated_at
            FROM level_fees
            WHERE club_id = ? AND level = ?
            "#,
        )
        .bind(club_id.to_string())
        .bind(level)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_level_fee(r)?)),
            None => Ok(None),
        }
    }

    async fn list_level_fees(&self, club_id: Uuid) -> Result<Vec<LevelFee>> {
        let rows = sqlx::query_as::<_, LevelFeeRow>(
            r#"
            SELECT id, club_id, level, monthly_fee_cents, created_at, updated_at
            FROM level_fees
            WHERE club_id = ?
            ORDER BY level
            "#,
        )
        .bind(club_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_level_fee).collect()
    }
}
