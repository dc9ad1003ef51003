use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{AdjustmentKind, CreateFeeAdjustmentRequest, FeeAdjustment},
    error::{AppError, Result},
    repository::FeeAdjustmentRepository,
};

#[derive(FromRow)]
struct FeeAdjustmentRow {
    id: String,
    club_id: String,
    member_id: String,
    kind: String,
    adjusted_fee_cents: i64,
    effective_month: i64,
    effective_year: i64,
    expiry_month: Option<i64>,
    expiry_year: Option<i64>,
    reason: String,
    is_active: i64,
    created_at: NaiveDateTime,
}

pub struct SqliteFeeAdjustmentRepository {
    pool: SqlitePool,
}

impl SqliteFeeAdjustmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_adjustment(row: FeeAdjustmentRow) -> Result<FeeAdjustment> {
        Ok(FeeAdjustment {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            club_id: Uuid::parse_str(&row.club_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            member_id: Uuid::parse_str(&row.member_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            kind: Self::parse_kind(&row.kind)?,
            adjusted_fee_cents: row.adjusted_fee_cents,
            effective_month: row.effective_month as u32,
            effective_year: row.effective_year as i32,
            expiry_month: row.expiry_month.map(|m| m as u32),
            expiry_year: row.expiry_year.map(|y| y as i32),
            reason: row.reason,
            is_active: row.is_active != 0,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }

    fn parse_kind(s: &str) -> Result<AdjustmentKind> {
        match s {
            "Permanent" => Ok(AdjustmentKind::Permanent),
            "Temporary" => Ok(AdjustmentKind::Temporary),
            _ => Err(AppError::Database(format!("Invalid adjustment kind: {}", s))),
        }
    }

    fn kind_to_str(kind: &AdjustmentKind) -> &'static str {
        match kind {
            AdjustmentKind::Permanent => "Permanent",
            AdjustmentKind::Temporary => "Temporary",
        }
    }
}

#[async_trait]
impl FeeAdjustmentRepository for SqliteFeeAdjustmentRepository {
    async fn create(
        &self,
        club_id: Uuid,
        request: CreateFeeAdjustmentRequest,
    ) -> Result<FeeAdjustment> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO fee_adjustments (
                id, club_id, member_id, kind, adjusted_fee_cents,
                effective_month, effective_year, expiry_month, expiry_year,
                reason, is_active, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(club_id.to_string())
        .bind(request.member_id.to_string())
        .bind(Self::kind_to_str(&request.kind))
        .bind(request.adjusted_fee_cents)
        .bind(request.effective_month as i64)
        .bind(request.effective_year as i64)
        .bind(request.expiry_month.map(|m| m as i64))
        .bind(request.expiry_year.map(|y| y as i64))
        .bind(&request.reason)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(club_id, id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created adjustment".to_string())
        })
    }

    async fn find_by_id(&self, club_id: Uuid, id: Uuid) -> Result<Option<FeeAdjustment>> {
        let row = sqlx::query_as::<_, FeeAdjustmentRow>(
            r#"
            SELECT id, club_id, member_id, kind, adjusted_fee_cents,
                   effective_month, effective_year, expiry_month, expiry_year,
                   reason, is_active, created_at
            FROM fee_adjustments
            WHERE id = ? AND club_id = ?
            "#,
        )
        .bind(id.to_string())
        .bind(club_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_adjustment(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_member(&self, member_id: Uuid) -> Result<Vec<FeeAdjustment>> {
        // Ordered so the resolver's "latest permanent wins" scan can
        // simply take the first match.
        let rows = sqlx::query_as::<_, FeeAdjustmentRow>(
            r#"
            SELECT id, club_id, member_id, kind, adjusted_fee_cents,
                   effective_month, effective_year, expiry_month, expiry_year,
                   reason, is_active, created_at
            FROM fee_adjustments
            WHERE member_id = ?
            ORDER BY effective_year DESC, effective_month DESC, created_at DESC
            "#,
        )
        .bind(member_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_adjustment).collect()
    }

    async fn deactivate(&self, club_id: Uuid, id: Uuid) -> Result<FeeAdjustment> {
        let result = sqlx::query(
            "UPDATE fee_adjustments SET is_active = 0 WHERE id = ? AND club_id = ?",
        )
        .bind(id.to_string())
        .bind(club_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Adjustment not found".to_string()));
        }

        self.find_by_id(club_id, id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve adjustment".to_string()))
    }
}
