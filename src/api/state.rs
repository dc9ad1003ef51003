use std::sync::Arc;

use crate::{
    api::middleware::rate_limit::RateLimiter,
    config::Settings,
    payments::{PayFastClient, YocoClient},
    service::ServiceContext,
};

#[derive(Clone)]
pub struct AppState {
    pub service_context: Arc<ServiceContext>,
    pub payfast_client: Option<Arc<PayFastClient>>,
    pub yoco_client: Option<Arc<YocoClient>>,
    pub rate_limiter: Arc<RateLimiter>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        service_context: Arc<ServiceContext>,
        payfast_client: Option<Arc<PayFastClient>>,
        yoco_client: Option<Arc<YocoClient>>,
        settings: Arc<Settings>,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(settings.rate_limit.clone()));
        Self {
            service_context,
            payfast_client,
            yoco_client,
            rate_limiter,
            settings,
        }
    }
}
