use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tour_core::{Actor, Role};
use uuid::Uuid;

use crate::state::{AppState, AuthConfig};

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    pub fn new(sub: Uuid, role: Role, ttl_seconds: u64) -> Self {
        let exp = chrono::Utc::now().timestamp() as u64 + ttl_seconds;
        Self {
            sub,
            role,
            exp: exp as usize,
        }
    }

    pub fn encode(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }
}

impl AuthConfig {
    /// Sign a token for `sub` that lives for the configured expiration.
    pub fn issue_token(&self, sub: Uuid, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
        Claims::new(sub, role, self.expiration).encode(&self.secret)
    }
}

fn authenticate(state: &AppState, req: &Request, allowed: &[Role]) -> Result<Actor, StatusCode> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let claims = token_data.claims;
    if !allowed.contains(&claims.role) {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(Actor {
        id: claims.sub,
        role: claims.role,
    })
}

// ============================================================================
// Role Middleware
// ============================================================================

pub async fn client_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let actor = authenticate(&state, &req, &[Role::Client])?;
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

/// Admins may act on their own excursions like any organizer.
pub async fn organizer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let actor = authenticate(&state, &req, &[Role::Organizer, Role::Admin])?;
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}
