use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Club {
    pub id: Uuid,
    pub name: String,
    pub currency: String,
    pub contact_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Default monthly fee for one training level within a club. The fee
/// resolver falls back to this when a member has no adjustment and no
/// personal override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelFee {
    pub id: Uuid,
    pub club_id: Uuid,
    pub level: String,
    pub monthly_fee_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClubRequest {
    pub name: String,
    pub currency: Option<String>,
    pub contact_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub club_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserRole {
    Admin,
    Coach,
    Parent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelFeeSpec {
    pub level: String,
    pub monthly_fee_cents: i64,
}

/// Everything a new tenant needs in one shot: the club row, its first
/// admin and the level fee table. Written in a single transaction so a
/// half-created club can never be observed.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapClubRequest {
    pub name: String,
    pub currency: Option<String>,
    pub contact_email: Option<String>,
    pub admin_email: String,
    pub admin_name: String,
    pub level_fees: Vec<LevelFeeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub club_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub phone: Option<String>,
}
