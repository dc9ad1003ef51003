use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{api::state::AppState, auth::AuthContext, error::AppError};

/// Resolves the bearer token to a typed `AuthContext` and threads it
/// through as a request extension. Handlers take the context as an
/// `Extension` parameter; identity never travels in loose headers past
/// this point.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request).ok_or(AppError::Unauthorized)?;

    let context = state
        .service_context
        .auth_service
        .validate_token(token)
        .await?
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request).ok_or(AppError::Unauthorized)?;

    let context = state
        .service_context
        .auth_service
        .validate_token(token)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !context.is_admin() {
        return Err(AppError::Forbidden);
    }

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}
