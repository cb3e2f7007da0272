use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use axum::http::{Extensions, HeaderMap, header, request::Parts};

use crate::auth::guard::{CurrentUser, SessionGuard};
use crate::error::AppError;
use crate::handlers::run_blocking;

const BEARER: &str = "Bearer ";
/// Width of the `sessions.ip_address` column.
const MAX_IP_LEN: usize = 64;

/// Raw `Authorization: Bearer <JWT>` token, not yet verified.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_str = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::InvalidTokenFormat)?
            .to_str()
            .map_err(|_| AppError::InvalidTokenFormat)?;

        let token = auth_str
            .strip_prefix(BEARER)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::InvalidTokenFormat)?;

        Ok(Self(token.to_string()))
    }
}

async fn authenticate<S>(parts: &mut Parts, state: &S, touch: bool) -> Result<CurrentUser, AppError>
where
    Arc<SessionGuard>: FromRef<S>,
    S: Send + Sync,
{
    let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
    let guard = Arc::<SessionGuard>::from_ref(state);

    run_blocking(move || guard.authenticate(&token, touch)).await
}

/// Extracteur pour les routes protégées: JWT valide + session courante.
/// Records activity on the session.
impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<SessionGuard>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate(parts, state, true).await
    }
}

/// Same checks as [`CurrentUser`] without recording activity.
#[derive(Debug, Clone)]
pub struct PassiveSession(pub CurrentUser);

impl<S> FromRequestParts<S> for PassiveSession
where
    Arc<SessionGuard>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate(parts, state, false).await.map(Self)
    }
}

/// An authenticated administrator.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

impl<S> FromRequestParts<S> for AdminUser
where
    Arc<SessionGuard>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state, true).await?;
        if !user.is_admin {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Admin route refused");
            return Err(AppError::forbidden("Administrator access required"));
        }
        Ok(Self(user))
    }
}

/// Where the client address of a request is read from.
///
/// Installed as a request extension by the router; requests without one
/// use [`ClientIpSource::Socket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientIpSource {
    /// TCP peer address only. Proxy headers are client-controlled and ignored.
    #[default]
    Socket,
    /// Behind a reverse proxy or API gateway that appends the peer it saw:
    /// the last `X-Forwarded-For` hop, then `X-Real-IP`, then the socket.
    TrustedProxy,
}

/// Client address and user agent of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    pub ip: String,
    pub user_agent: String,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn proxied_ip(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, "x-forwarded-for")
        .and_then(|v| v.rsplit(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
}

impl ClientContext {
    pub fn from_parts(parts: &Parts) -> Self {
        Self::from_request_head(&parts.headers, &parts.extensions)
    }

    pub fn from_request_head(headers: &HeaderMap, extensions: &Extensions) -> Self {
        let source = extensions
            .get::<ClientIpSource>()
            .copied()
            .unwrap_or_default();

        let forwarded = match source {
            ClientIpSource::Socket => None,
            ClientIpSource::TrustedProxy => proxied_ip(headers),
        };

        let ip = forwarded
            .map(str::to_string)
            .or_else(|| {
                extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .map_or_else(
                || "unknown".to_string(),
                |ip| ip.chars().take(MAX_IP_LEN).collect(),
            );

        let user_agent = header_str(headers, header::USER_AGENT.as_str())
            .unwrap_or("unknown")
            .to_string();

        Self { ip, user_agent }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}
