use clap::Parser;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::Fake;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;

use salto::{
    auth::{generate_token, AuthService},
    domain::{
        AdjustmentKind, BootstrapClubRequest, CreateFeeAdjustmentRequest, CreateMemberRequest,
        CreateUserRequest, LevelFeeSpec, UserRole,
    },
    repository::{
        ClubRepository, FeeAdjustmentRepository, MemberRepository, SqliteClubRepository,
        SqliteFeeAdjustmentRepository, SqliteMemberRepository,
    },
};

#[derive(Parser)]
#[command(about = "Seed a demo club with guardians, members and fees")]
struct Args {
    /// Database URL (defaults to DATABASE_URL or sqlite:salto.db)
    #[arg(long)]
    database_url: Option<String>,

    /// Number of guardian families to create
    #[arg(long, default_value_t = 5)]
    families: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let database_url = args
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite:salto.db".to_string());

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    let club_repo = SqliteClubRepository::new(db_pool.clone());
    let member_repo = SqliteMemberRepository::new(db_pool.clone());
    let adjustment_repo = SqliteFeeAdjustmentRepository::new(db_pool.clone());
    let auth_service = Arc::new(AuthService::new(db_pool.clone()));

    println!("🏟️  Creating club...");
    let (club, admin) = club_repo
        .bootstrap(BootstrapClubRequest {
            name: "Summerset Gymnastics Club".to_string(),
            currency: Some("ZAR".to_string()),
            contact_email: Some("admin@summersetgym.co.za".to_string()),
            admin_email: "admin@summersetgym.co.za".to_string(),
            admin_name: "Club Admin".to_string(),
            level_fees: vec![
                LevelFeeSpec { level: "Level 1".to_string(), monthly_fee_cents: 65000 },
                LevelFeeSpec { level: "Level 2".to_string(), monthly_fee_cents: 72000 },
                LevelFeeSpec { level: "Level 3".to_string(), monthly_fee_cents: 80000 },
                LevelFeeSpec { level: "Competitive".to_string(), monthly_fee_cents: 95000 },
            ],
        })
        .await?;
    println!("  ✅ Created club {} ({})", club.name, club.id);

    let admin_token = generate_token();
    auth_service.register_token(admin.id, &admin_token, None).await?;
    println!("  🔑 Admin API token: {}", admin_token);

    let levels = ["Level 1", "Level 2", "Level 3", "Competitive"];

    println!("👨‍👩‍👧 Creating {} families...", args.families);
    let mut first_member = None;

    for family in 0..args.families {
        let guardian = club_repo
            .create_user(CreateUserRequest {
                club_id: club.id,
                email: SafeEmail().fake(),
                full_name: Name().fake(),
                role: UserRole::Parent,
                phone: None,
            })
            .await?;

        // One or two children per family
        for child in 0..(1 + family % 2) {
            let member = member_repo
                .create(
                    club.id,
                    CreateMemberRequest {
                        guardian_id: guardian.id,
                        first_name: FirstName().fake(),
                        last_name: LastName().fake(),
                        level: levels[(family + child) % levels.len()].to_string(),
                        monthly_fee_cents: None,
                    },
                )
                .await?;

            if first_member.is_none() {
                first_member = Some(member);
            }
        }
    }

    // A sample sibling discount on the first member
    if let Some(member) = first_member {
        adjustment_repo
            .create(
                club.id,
                CreateFeeAdjustmentRequest {
                    member_id: member.id,
                    kind: AdjustmentKind::Permanent,
                    adjusted_fee_cents: 55000,
                    effective_month: 1,
                    effective_year: 2024,
                    expiry_month: None,
                    expiry_year: None,
                    reason: "Sibling discount".to_string(),
                },
            )
            .await?;
        println!("  💸 Added a permanent adjustment for {}", member.full_name());
    }

    println!("✅ Seeding complete");

    Ok(())
}
