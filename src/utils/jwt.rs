// src/utils/jwt.rs

use std::{
    convert::Infallible,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    body::Body,
    extract::{FromRef, FromRequestParts, State},
    http::{Request, header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError};

/// Roles allowed through `admin_middleware`.
const ADMIN_ROLES: [&str; 2] = ["administrator", "admin"];

/// Claims of a viewer token issued by the host site.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Host user id, as a string.
    pub sub: String,
    /// Host role slug, e.g. `subscriber` or `administrator`.
    pub role: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse::<i64>().ok().filter(|id| *id > 0)
    }

    pub fn is_admin(&self) -> bool {
        ADMIN_ROLES.contains(&self.role.as_str())
    }
}

/// Signs a viewer token for a host user.
pub fn sign_jwt(
    user_id: i64,
    role: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_owned(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a token string.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// The logged-in user behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: i64,
}

/// Optional viewer: `None` for anonymous requests and for tokens that do not
/// verify. Never rejects, so shortcode-style handlers can render their
/// "log in" placeholders.
#[derive(Debug, Clone)]
pub struct MaybeViewer(pub Option<Viewer>);

impl<S> FromRequestParts<S> for MaybeViewer
where
    Config: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(MaybeViewer(None));
        };

        let config = Config::from_ref(state);
        let viewer = match verify_jwt(token, &config.jwt_secret) {
            Ok(claims) => claims.user_id().map(|user_id| Viewer { user_id }),
            Err(_) => {
                tracing::debug!("ignoring viewer token that failed verification");
                None
            }
        };
        Ok(MaybeViewer(viewer))
    }
}

/// Axum Middleware: Authentication.
///
/// Requires a valid `Authorization: Bearer <token>` header and injects its
/// `Claims` into the request extensions.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| AppError::AuthError("Missing bearer token".to_string()))?;

    let claims = verify_jwt(token, &config.jwt_secret)?;
    if claims.user_id().is_none() {
        return Err(AppError::AuthError("Token does not name a user".to_string()));
    }
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Axum Middleware: Admin Authorization.
///
/// Must run after `auth_middleware`.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::AuthError("Not authenticated".to_string()))?;

    if !claims.is_admin() {
        return Err(AppError::Forbidden("Administrator role required".to_string()));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_tokens_verify() {
        let token = sign_jwt(7, "administrator", "secret", 60).unwrap();
        let claims = verify_jwt(&token, "secret").unwrap();
        assert_eq!(claims.user_id(), Some(7));
        assert!(claims.is_admin());
        assert!(verify_jwt(&token, "other").is_err());
    }

    fn config() -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: "secret".into(),
            rust_log: "error".into(),
            bind_addr: "127.0.0.1:0".into(),
            table_prefix: "wp_".into(),
            base_prefix: "wp_".into(),
            guest_cookie: "aotter_sid".into(),
            guest_latest_ttl: std::time::Duration::from_secs(60),
            guest_cookie_max_age: std::time::Duration::from_secs(60),
            features: Default::default(),
        }
    }

    async fn viewer_for(authorization: Option<&str>) -> Option<Viewer> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        let MaybeViewer(viewer) = MaybeViewer::from_request_parts(&mut parts, &config())
            .await
            .unwrap();
        viewer
    }

    #[tokio::test]
    async fn viewer_is_identified_by_user_id_only() {
        let token = sign_jwt(12, "administrator", "secret", 60).unwrap();
        assert_eq!(
            viewer_for(Some(&format!("Bearer {token}"))).await,
            Some(Viewer { user_id: 12 })
        );

        let forged = sign_jwt(12, "subscriber", "other", 60).unwrap();
        assert_eq!(viewer_for(Some(&format!("Bearer {forged}"))).await, None);
        assert_eq!(viewer_for(None).await, None);
    }
}
