//! Identity supplied by the upstream authentication gateway.
//!
//! The gateway authenticates the caller and forwards `X-User-Id` and
//! `X-User-Role`. Requests reaching this service without them are rejected.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use uuid::Uuid;

use crate::utils::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const ADMIN_ROLE: &str = "admin";

/// Authenticated gate operator (or any authenticated user allowed to scan).
#[derive(Debug, Clone)]
pub struct ScannerIdentity {
    pub user_id: Uuid,
    pub role: Option<String>,
    pub ip_address: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for ScannerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::AuthError("Authentication required".to_string()))?;

        let user_id = Uuid::parse_str(raw_id.trim())
            .map_err(|_| AppError::AuthError("Malformed user identity".to_string()))?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|r| r.trim().to_lowercase())
            .filter(|r| !r.is_empty());

        Ok(Self {
            user_id,
            role,
            ip_address: client_ip(&parts.headers),
        })
    }
}

/// Caller holding the elevated role required for re-signing tickets.
#[derive(Debug, Clone)]
pub struct AdminIdentity {
    pub user_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = ScannerIdentity::from_request_parts(parts, state).await?;

        if identity.role.as_deref() != Some(ADMIN_ROLE) {
            tracing::warn!(user_id = %identity.user_id, "Admin route refused");
            return Err(AppError::Forbidden("Admin role required".to_string()));
        }

        Ok(Self {
            user_id: identity.user_id,
        })
    }
}

/// First `X-Forwarded-For` hop, else `X-Real-IP`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        })
        .and_then(|ip| ip.parse::<std::net::IpAddr>().ok())
        .map(|ip| ip.to_string())
}
