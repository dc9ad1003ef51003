use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use salto::{
    api, auth, config::Settings, payments, repository, service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "salto=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!(
        "Starting Salto server on {}:{}",
        settings.server.host,
        settings.server.port
    );

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    // Initialize auth service
    let auth_service = Arc::new(auth::AuthService::new(db_pool.clone()));

    // Initialize repositories
    let club_repo = Arc::new(repository::SqliteClubRepository::new(db_pool.clone()));
    let member_repo = Arc::new(repository::SqliteMemberRepository::new(db_pool.clone()));
    let adjustment_repo = Arc::new(repository::SqliteFeeAdjustmentRepository::new(db_pool.clone()));
    let invoice_repo = Arc::new(repository::SqliteInvoiceRepository::new(db_pool.clone()));
    let payment_repo = Arc::new(repository::SqlitePaymentRepository::new(db_pool.clone()));

    // Create service context
    let service_context = Arc::new(ServiceContext::new(
        club_repo,
        member_repo,
        adjustment_repo,
        invoice_repo,
        payment_repo,
        auth_service,
        db_pool.clone(),
    ));

    // Initialize gateway clients if configured
    let payfast_client = payments::PayFastClient::from_config(&settings.payfast).map(Arc::new);
    if payfast_client.is_some() {
        tracing::info!("PayFast payment processing enabled");
    } else {
        tracing::info!("PayFast payment processing disabled");
    }

    let yoco_client = payments::YocoClient::from_config(&settings.yoco).map(Arc::new);
    if yoco_client.is_some() {
        tracing::info!("Yoco payment processing enabled");
    } else {
        tracing::info!("Yoco payment processing disabled");
    }

    let app = api::create_app(
        service_context,
        payfast_client,
        yoco_client,
        Arc::new(settings.clone()),
    );

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        settings.server.host, settings.server.port
    ))
    .await?;

    tracing::info!(
        "Server listening on http://{}:{}",
        settings.server.host,
        settings.server.port
    );

    axum::serve(listener, app).await?;

    Ok(())
}
