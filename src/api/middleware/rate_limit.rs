use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use moka::sync::Cache;

use crate::{api::state::AppState, config::RateLimitConfig, error::AppError};

/// Endpoint classes with independent thresholds. Unauthenticated
/// surfaces (the gateway webhooks) get the strict auth budget; reads
/// and writes each get their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Auth,
    Read,
    Write,
}

/// In-process sliding-window limiter. Each caller key maps to the
/// timestamps of its recent requests; the cache bounds memory and
/// evicts idle callers by TTL. Process-local only, which is fine for
/// single-instance or sticky-session deployments.
pub struct RateLimiter {
    windows: Cache<(String, &'static str), Arc<Mutex<Vec<Instant>>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let windows = Cache::builder()
            .max_capacity(config.max_tracked_callers)
            .time_to_idle(Duration::from_secs(config.window_secs * 2))
            .build();

        Self { windows, config }
    }

    pub fn check(&self, caller: &str, class: RouteClass) -> Result<(), AppError> {
        let (limit, class_name) = match class {
            RouteClass::Auth => (self.config.auth_limit, "auth"),
            RouteClass::Read => (self.config.read_limit, "read"),
            RouteClass::Write => (self.config.write_limit, "write"),
        };

        let window = Duration::from_secs(self.config.window_secs);
        let now = Instant::now();

        let entry = self
            .windows
            .get_with((caller.to_string(), class_name), || {
                Arc::new(Mutex::new(Vec::new()))
            });

        let mut hits = entry.lock().expect("rate limiter mutex poisoned");
        hits.retain(|t| now.duration_since(*t) < window);

        if hits.len() >= limit as usize {
            let oldest = hits.first().copied().unwrap_or(now);
            let retry_after = window.saturating_sub(now.duration_since(oldest));
            return Err(AppError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        hits.push(now);
        Ok(())
    }
}

pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let class = classify(&request);
    let caller = caller_key(&request);

    state.rate_limiter.check(&caller, class)?;

    Ok(next.run(request).await)
}

fn classify(request: &Request) -> RouteClass {
    if request.uri().path().contains("/payments/webhook") {
        RouteClass::Auth
    } else if request.method() == axum::http::Method::GET {
        RouteClass::Read
    } else {
        RouteClass::Write
    }
}

/// Authenticated callers are counted per token, everything else per
/// forwarded peer address.
fn caller_key(request: &Request) -> String {
    if let Some(token) = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return format!("token:{}", crate::auth::hash_token(token));
    }

    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| format!("ip:{}", ip.trim()))
        .unwrap_or_else(|| "ip:unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            window_secs: 60,
            auth_limit: limit,
            read_limit: limit,
            write_limit: limit,
            max_tracked_callers: 100,
        })
    }

    #[test]
    fn allows_up_to_the_limit_then_rejects() {
        let limiter = limiter(3);

        for _ in 0..3 {
            assert!(limiter.check("ip:1.2.3.4", RouteClass::Read).is_ok());
        }
        assert!(limiter.check("ip:1.2.3.4", RouteClass::Read).is_err());
    }

    #[test]
    fn callers_are_counted_independently() {
        let limiter = limiter(1);

        assert!(limiter.check("ip:1.2.3.4", RouteClass::Write).is_ok());
        assert!(limiter.check("ip:5.6.7.8", RouteClass::Write).is_ok());
        assert!(limiter.check("ip:1.2.3.4", RouteClass::Write).is_err());
    }

    #[test]
    fn classes_have_separate_budgets() {
        let limiter = limiter(1);

        assert!(limiter.check("ip:1.2.3.4", RouteClass::Read).is_ok());
        assert!(limiter.check("ip:1.2.3.4", RouteClass::Write).is_ok());
        assert!(limiter.check("ip:1.2.3.4", RouteClass::Read).is_err());
    }
}
