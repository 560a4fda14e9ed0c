//! JWT auth for the task board.
//!
//! - Clients sign up / log in with email + password and receive an HS256
//!   token carrying `{sub, role}`.
//! - `require_auth` verifies the bearer token on every protected route and
//!   inserts an [`AuthUser`] extension; core operations trust it.
//! - Passwords are stored as salted pbkdf2-sha256 hashes.
//!
//! In `DEV_MODE` all checks are bypassed with a fixed admin identity.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

use super::routes::AppState;
use crate::config::Config;
use crate::models::{AuthUser, Role, User, UserView};

const PBKDF2_ROUNDS: u32 = 100_000;
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// User id.
    sub: Uuid,
    role: Role,
    /// Issued-at unix seconds.
    iat: i64,
    /// Expiration unix seconds.
    exp: i64,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub exp: i64,
    pub user: UserView,
}

// ─────────────────────────────────────────────────────────────────────────────
// Password hashing
// ─────────────────────────────────────────────────────────────────────────────

/// Hash a password as `hex(salt)$hex(pbkdf2-sha256(password, salt))`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ROUNDS, &mut key);

    format!("{}${}", hex::encode(salt), hex::encode(key))
}

/// Verify a password against a stored hash in constant time.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, key_hex)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(key_hex)) else {
        return false;
    };

    let mut key = vec![0u8; expected.len().max(1)];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ROUNDS, &mut key);

    constant_time_eq(&key, &expected)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// ─────────────────────────────────────────────────────────────────────────────
// Tokens
// ─────────────────────────────────────────────────────────────────────────────

fn issue_jwt(secret: &str, ttl_days: i64, user: &AuthUser) -> anyhow::Result<(String, i64)> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: user.id,
        role: user.role,
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, claims.exp))
}

fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Resolve a token to an identity under the given config, if possible.
/// Used by the WebSocket handshake, which cannot set an Authorization
/// header from a browser.
pub fn user_for_token(token: &str, config: &Config) -> Option<AuthUser> {
    let secret = config.jwt_secret.as_deref()?;
    let claims = verify_jwt(token, secret).ok()?;
    Some(AuthUser {
        id: claims.sub,
        role: claims.role,
    })
}

fn dev_user() -> AuthUser {
    AuthUser {
        id: Uuid::nil(),
        role: Role::Admin,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)> {
    let name = req.name.trim();
    let email = req.email.trim().to_lowercase();

    if name.is_empty() || email.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Name and email are required".into()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }

    let taken = state
        .store
        .users
        .count(|u| u.email.eq_ignore_ascii_case(&email))
        .await;
    if taken > 0 {
        return Err((
            StatusCode::CONFLICT,
            "User with this email already exists".into(),
        ));
    }

    let user = state
        .store
        .users
        .insert(User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email,
            password_hash: hash_password(&req.password),
            role: req.role.unwrap_or_default(),
            avatar: req.avatar.filter(|a| !a.is_empty()),
            bio: None,
            created_at: Utc::now(),
        })
        .await;

    let identity = AuthUser {
        id: user.id,
        role: user.role,
    };
    let (token, exp) = issue_token_for(&state, &identity)?;

    tracing::info!("User signed up: {} ({})", user.name, user.id);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            exp,
            user: UserView::from(&user),
        }),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "All fields are required".into()));
    }

    // One generic message for unknown email and wrong password, to avoid
    // account enumeration.
    let account = state
        .store
        .users
        .find(|u| u.email.eq_ignore_ascii_case(&email))
        .await
        .into_iter()
        .next();

    let valid = match &account {
        Some(user) => verify_password(&req.password, &user.password_hash),
        None => {
            // Dummy comparison to keep timing uniform.
            let _ = verify_password(&req.password, "00$00");
            false
        }
    };

    let Some(user) = account.filter(|_| valid) else {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Incorrect email or password".into(),
        ));
    };

    let identity = AuthUser {
        id: user.id,
        role: user.role,
    };
    let (token, exp) = issue_token_for(&state, &identity)?;

    Ok(Json(AuthResponse {
        token,
        exp,
        user: UserView::from(&user),
    }))
}

/// Stateless acknowledgement; clients discard their token.
pub async fn logout() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "User logged out successfully" }))
}

fn issue_token_for(
    state: &AppState,
    user: &AuthUser,
) -> Result<(String, i64), (StatusCode, String)> {
    let secret = state.config.jwt_secret.as_deref().ok_or((
        StatusCode::INTERNAL_SERVER_ERROR,
        "JWT_SECRET not configured".to_string(),
    ))?;

    issue_jwt(secret, state.config.jwt_ttl_days, user)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Middleware
// ─────────────────────────────────────────────────────────────────────────────

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Dev mode: no auth checks.
    if state.config.dev_mode {
        req.extensions_mut().insert(dev_user());
        return next.run(req).await;
    }

    // Fail closed if auth is required but unconfigured.
    let secret = match state.config.jwt_secret.as_deref() {
        Some(s) => s,
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "JWT_SECRET not configured",
            )
                .into_response();
        }
    };

    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("");

    if token.is_empty() {
        return (StatusCode::UNAUTHORIZED, "Missing Authorization header").into_response();
    }

    match verify_jwt(token, secret) {
        Ok(claims) => {
            req.extensions_mut().insert(AuthUser {
                id: claims.sub,
                role: claims.role,
            });
            next.run(req).await
        }
        Err(_) => (StatusCode::UNAUTHORIZED, "Invalid or expired token").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trips() {
        let hash = hash_password("correct horse");
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        // Salted: two hashes of the same password differ.
        assert_ne!(hash, hash_password("correct horse"));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("anything", "no-dollar-sign"));
        assert!(!verify_password("anything", "zz$zz"));
    }

    #[test]
    fn jwt_round_trips_identity() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            role: Role::Admin,
        };
        let (token, exp) = issue_jwt("secret", 3, &user).unwrap();
        assert!(exp > Utc::now().timestamp());

        let claims = verify_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Admin);

        assert!(verify_jwt(&token, "other-secret").is_err());
    }
}
