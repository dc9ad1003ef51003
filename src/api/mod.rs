pub mod handlers;
pub mod middleware;
pub mod state;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::Settings,
    payments::{PayFastClient, YocoClient},
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(
    service_context: Arc<ServiceContext>,
    payfast_client: Option<Arc<PayFastClient>>,
    yoco_client: Option<Arc<YocoClient>>,
    settings: Arc<Settings>,
) -> Router {
    let app_state = AppState::new(service_context, payfast_client, yoco_client, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        // API routes
        .nest("/api", api_routes(app_state.clone()))
        // Admin routes
        .nest("/admin", admin_routes(app_state.clone()))
        // Rate limiting applies to everything, webhooks included
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            middleware::rate_limit::rate_limit,
        ))
        // Add state to the router
        .with_state(app_state)
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/members", member_routes(state.clone()))
        .nest("/adjustments", adjustment_routes(state.clone()))
        .nest("/invoices", invoice_routes(state.clone()))
        .nest("/payments", payment_routes(state))
}

fn member_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::members::list))
        .route("/", post(handlers::members::create))
        .route("/:id", get(handlers::members::get))
        .route("/:id", put(handlers::members::update))
        .route("/:id/withdraw", post(handlers::members::withdraw))
        .route("/:id/adjustments", get(handlers::adjustments::list_for_member))
        .route("/:id/effective-fee", get(handlers::adjustments::effective_fee))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn adjustment_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::adjustments::create))
        .route("/:id/deactivate", post(handlers::adjustments::deactivate))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_admin,
        ))
}

fn invoice_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Reads for any authenticated user
        .route("/", get(handlers::invoices::list))
        .route("/:id", get(handlers::invoices::get))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ))
        // Generation and edits are admin-only
        .merge(
            Router::new()
                .route("/generate", post(handlers::invoices::generate_for_payer))
                .route("/generate-club", post(handlers::invoices::generate_for_club))
                .route("/:id/items", post(handlers::invoices::add_item))
                .route("/:id/items/:item_id", delete(handlers::invoices::remove_item))
                .route("/:id/discount", put(handlers::invoices::set_discount))
                .route("/:id/cancel", post(handlers::invoices::cancel))
                .route_layer(axum::middleware::from_fn_with_state(
                    state,
                    middleware::auth::require_admin,
                )),
        )
}

fn payment_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Gateway webhook endpoints (no bearer auth; gateway-signed)
        .route("/webhook/payfast", post(handlers::payments::payfast_webhook))
        .route("/webhook/yoco", post(handlers::payments::yoco_webhook))
        // Authenticated payment endpoints
        .merge(
            Router::new()
                .route("/", post(handlers::payments::initiate))
                .route("/invoice/:invoice_id", get(handlers::payments::list_for_invoice))
                .route("/:id/activities", get(handlers::payments::activities))
                .route_layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    middleware::auth::require_auth,
                )),
        )
        .merge(
            Router::new()
                .route("/manual", post(handlers::payments::record_manual))
                .route_layer(axum::middleware::from_fn_with_state(
                    state,
                    middleware::auth::require_admin,
                )),
        )
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/stats", get(handlers::admin::stats))
        .route("/overdue-check", post(handlers::admin::mark_overdue))
        .route("/level-fees", get(handlers::admin::list_level_fees))
        .route("/level-fees", put(handlers::admin::set_level_fee))
        .route("/users", post(handlers::admin::create_user))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin,
        ))
        .with_state(state)
}
