pub mod auth;
pub mod rate_limit;

pub use auth::{client_auth_middleware, organizer_auth_middleware, Claims};
pub use rate_limit::rate_limit_middleware;
