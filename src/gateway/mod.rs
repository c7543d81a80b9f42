//! Glue between the HTTP/WebSocket layer and the core services.
//!
//! Route registration lives with the application server. This module holds
//! what those routes call into:
//! - [`AppState`]: shared authenticator + report store + the auth switch
//! - Identity resolution under the auth-gate policy
//! - [`ApiError`]: status code, headers and `{"detail": ...}` body for every
//!   failure the core can produce
//!
//! Auth-gate policy: when auth is disabled every caller is the fixed
//! anonymous identity and tokens are never consulted for access control.

pub mod extract;

pub use extract::{
    clear_session_cookie, client_origin, session_cookie, token_from_connection,
    token_from_request, ConnectionAuthQuery, AUTH_COOKIE,
};

use crate::auth::{AuthError, Session, TokenAuthenticator};
use crate::config::Config;
use crate::reports::{ReportStore, SqliteReportStore, StoreError};
use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Identity reported for every caller while auth is disabled.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Who is calling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    User(String),
}

impl Identity {
    pub fn username(&self) -> &str {
        match self {
            Self::Anonymous => ANONYMOUS_USER,
            Self::User(name) => name,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

/// Failures surfaced to transport callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Too many failed login attempts. Try again in {retry_after_secs} seconds.")]
    RateLimited { retry_after_secs: u64 },

    #[error("Report not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Storage(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::RateLimited { retry_after_secs } => Self::RateLimited { retry_after_secs },
            AuthError::InvalidOrExpiredToken => Self::Unauthorized("Invalid or expired token"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let Self::Storage(ref e) = self {
            tracing::error!("Report store failure: {e}");
        }
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        match self {
            Self::Unauthorized(_) | Self::InvalidCredentials => {
                (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
            }
            Self::RateLimited { retry_after_secs } => (
                status,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

/// Login request body.
#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Successful login. Responds with the token in the body and as a cookie.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub username: String,
    /// Epoch seconds.
    pub expires_at: i64,
    #[serde(skip)]
    pub max_age_secs: u64,
}

impl LoginResponse {
    fn from_session(session: Session, now: i64) -> Self {
        let max_age_secs = session.max_age_secs(now);
        Self {
            token: session.token,
            token_type: "bearer",
            username: session.subject,
            expires_at: session.expires_at,
            max_age_secs,
        }
    }
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        let cookie = session_cookie(&self.token, self.max_age_secs);
        (StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(self)).into_response()
    }
}

/// Logout clears the cookie; tokens themselves stay valid until expiry.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogoutResponse;

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(header::SET_COOKIE, clear_session_cookie())],
            Json(serde_json::json!({ "status": "logged_out" })),
        )
            .into_response()
    }
}

/// `GET /auth/status` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthStatus {
    pub auth_enabled: bool,
}

/// `GET /auth/me` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhoAmI {
    pub username: String,
    pub auth_enabled: bool,
}

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<TokenAuthenticator>,
    pub reports: Arc<dyn ReportStore>,
    pub auth_enabled: bool,
}

impl AppState {
    pub fn new(
        auth: Arc<TokenAuthenticator>,
        reports: Arc<dyn ReportStore>,
        auth_enabled: bool,
    ) -> Self {
        Self {
            auth,
            reports,
            auth_enabled,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(TokenAuthenticator::from_config(&config.auth)),
            Arc::new(SqliteReportStore::from_config(&config.storage)),
            config.auth.enabled,
        )
    }

    pub fn auth_status(&self) -> AuthStatus {
        AuthStatus {
            auth_enabled: self.auth_enabled,
        }
    }

    /// Exchange credentials for a session. `origin` comes from
    /// [`client_origin`].
    pub fn login(&self, request: &LoginRequest, origin: &str) -> Result<LoginResponse, ApiError> {
        let session = self
            .auth
            .authenticate(&request.username, &request.password, origin)?;
        Ok(LoginResponse::from_session(session, crate::util::epoch_secs()))
    }

    pub fn logout(&self) -> LogoutResponse {
        LogoutResponse
    }

    /// Identity for a protected request; 401 when auth is enabled and the
    /// request carries no valid token.
    pub fn resolve_identity(&self, headers: &HeaderMap) -> Result<Identity, ApiError> {
        if !self.auth_enabled {
            return Ok(Identity::Anonymous);
        }
        let token = token_from_request(headers)
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::Unauthorized("Not authenticated"))?;
        let username = self.auth.require(token)?;
        Ok(Identity::User(username))
    }

    /// Non-failing variant for long-lived connections, which carry the token
    /// in `?token=` or the cookie.
    pub fn resolve_identity_optional(
        &self,
        query: &ConnectionAuthQuery,
        headers: &HeaderMap,
    ) -> Option<Identity> {
        if !self.auth_enabled {
            return Some(Identity::Anonymous);
        }
        let token = token_from_connection(query.token.as_deref(), headers)?;
        self.auth.verify(token).map(Identity::User)
    }

    pub fn whoami(&self, headers: &HeaderMap) -> Result<WhoAmI, ApiError> {
        let identity = self.resolve_identity(headers)?;
        Ok(WhoAmI {
            username: identity.username().to_string(),
            auth_enabled: self.auth_enabled,
        })
    }

    pub async fn list_reports(&self, ids: Option<&[String]>) -> Result<Vec<Value>, ApiError> {
        Ok(self.reports.list(ids).await?)
    }

    pub async fn get_report(&self, id: &str) -> Result<Value, ApiError> {
        self.reports.get(id).await?.ok_or(ApiError::NotFound)
    }

    pub async fn save_report(&self, id: &str, document: &Value) -> Result<(), ApiError> {
        if id.is_empty() {
            return Err(ApiError::BadRequest("Report id must not be empty".into()));
        }
        self.reports.upsert(id, document).await?;
        Ok(())
    }

    pub async fn delete_report(&self, id: &str) -> Result<(), ApiError> {
        if self.reports.delete(id).await? {
            Ok(())
        } else {
            Err(ApiError::NotFound)
        }
    }
}
