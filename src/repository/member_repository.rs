use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{CreateMemberRequest, Member, MemberStatus, UpdateMemberRequest},
    error::{AppError, Result},
    repository::MemberRepository,
};

// Database row struct that matches the SQLite schema
#[derive(FromRow)]
struct MemberRow {
    id: String,
    club_id: String,
    guardian_id: String,
    first_name: String,
    last_name: String,
    level: String,
    monthly_fee_cents: Option<i64>,
    status: String,
    notes: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteMemberRepository {
    pool: SqlitePool,
}

impl SqliteMemberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_member(row: MemberRow) -> Result<Member> {
        Ok(Member {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            club_id: Uuid::parse_str(&row.club_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            guardian_id: Uuid::parse_str(&row.guardian_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            first_name: row.first_name,
            last_name: row.last_name,
            level: row.level,
            monthly_fee_cents: row.monthly_fee_cents,
            status: Self::parse_member_status(&row.status)?,
            notes: row.notes,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_member_status(s: &str) -> Result<MemberStatus> {
        match s {
            "Active" => Ok(MemberStatus::Active),
            "Trial" => Ok(MemberStatus::Trial),
            "Withdrawn" => Ok(MemberStatus::Withdrawn),
            _ => Err(AppError::Database(format!("Invalid member status: {}", s))),
        }
    }

    fn member_status_to_str(status: &MemberStatus) -> &'static str {
        match status {
            MemberStatus::Active => "Active",
            MemberStatus::Trial => "Trial",
            MemberStatus::Withdrawn => "Withdrawn",
        }
    }
}

#[async_trait]
impl MemberRepository for SqliteMemberRepository {
    async fn create(&self, club_id: Uuid, request: CreateMemberRequest) -> Result<Member> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let status_str = Self::member_status_to_str(&MemberStatus::Active);

        sqlx::query(
            r#"
            INSERT INTO members (
                id, club_id, guardian_id, first_name, last_name,
                level, monthly_fee_cents, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(club_id.to_string())
        .bind(request.guardian_id.to_string())
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.level)
        .bind(request.monthly_fee_cents)
        .bind(status_str)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(club_id, id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created member".to_string()))
    }

    async fn find_by_id(&self, club_id: Uuid, id: Uuid) -> Result<Option<Member>> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT id, club_id, guardian_id, first_name, last_name,
                   level, monthly_fee_cents, status, notes, created_at, updated_at
            FROM members
            WHERE id = ? AND club_id = ?
            "#,
        )
        .bind(id.to_string())
        .bind(club_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_member(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, club_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Member>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT id, club_id, guardian_id, first_name, last_name,
                   level, monthly_fee_cents, status, notes, created_at, updated_at
            FROM members
            WHERE club_id = ?
            ORDER BY last_name, first_name
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(club_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_member).collect()
    }

    async fn list_active_by_guardian(
        &self,
        club_id: Uuid,
        guardian_id: Uuid,
    ) -> Result<Vec<Member>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT id, club_id, guardian_id, first_name, last_name,
                   level, monthly_fee_cents, status, notes, created_at, updated_at
            FROM members
            WHERE club_id = ? AND guardian_id = ? AND status = 'Active'
            ORDER BY last_name, first_name
            "#,
        )
        .bind(club_id.to_string())
        .bind(guardian_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_member).collect()
    }

    async fn list_billable_guardians(&self, club_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT guardian_id
            FROM members
            WHERE club_id = ? AND status = 'Active'
            ORDER BY guardian_id
            "#,
        )
        .bind(club_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        ids.into_iter()
            .map(|s| Uuid::parse_str(&s).map_err(|e| AppError::Database(e.to_string())))
            .collect()
    }

    async fn update(
        &self,
        club_id: Uuid,
        id: Uuid,
        update: UpdateMemberRequest,
    ) -> Result<Member> {
        let existing = self
            .find_by_id(club_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

        let first_name = update.first_name.unwrap_or(existing.first_name);
        let last_name = update.last_name.unwrap_or(existing.last_name);
        let level = update.level.unwrap_or(existing.level);
        let monthly_fee_cents = match update.monthly_fee_cents {
            Some(v) => v,
            None => existing.monthly_fee_cents,
        };
        let status = update.status.unwrap_or(existing.status);
        let notes = update.notes.or(existing.notes);
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE members
            SET first_name = ?,
                last_name = ?,
                level = ?,
                monthly_fee_cents = ?,
                status = ?,
                notes = ?,
                updated_at = ?
            WHERE id = ? AND club_id = ?
            "#,
        )
        .bind(&first_name)
        .bind(&last_name)
        .bind(&level)
        .bind(monthly_fee_cents)
        .bind(Self::member_status_to_str(&status))
        .bind(&notes)
        .bind(now)
        .bind(id.to_string())
        .bind(club_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(club_id, id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated member".to_string()))
    }

    async fn count_by_status(&self, club_id: Uuid) -> Result<Vec<(MemberStatus, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT status, COUNT(*) FROM members
            WHERE club_id = ?
            GROUP BY status
            "#,
        )
        .bind(club_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|(s, n)| Ok((Self::parse_member_status(&s)?, n)))
            .collect()
    }
}
