use std::sync::Arc;

use crate::{config::Config, db::Store, middleware::JwtVerifier, services::feed::FeedLimits};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub jwt: JwtVerifier,
    pub feed_limits: FeedLimits,
    pub suggestion_limit: usize,
    /// Explicit CORS origin; any origin is allowed when unset
    pub cors_allowed_origin: Option<String>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        Self {
            store,
            jwt: JwtVerifier::new(&config.jwt_secret),
            feed_limits: FeedLimits::from(config),
            suggestion_limit: config.suggestion_limit,
            cors_allowed_origin: config.cors_allowed_origin.clone(),
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }
}
