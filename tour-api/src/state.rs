use std::sync::Arc;
use tour_booking::BookingEngine;
use tour_store::app_config::RateLimitConfig;
use tour_store::RedisClient;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: BookingEngine,
    /// Rate limiting is skipped when no Redis is configured.
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
    pub webhook_secret: String,
    pub rate_limit: RateLimitConfig,
}
