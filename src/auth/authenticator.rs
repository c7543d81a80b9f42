use super::credentials::CredentialSet;
use super::ledger::{FailedAttemptLedger, LockoutStatus};
use super::token::{TokenClaims, TokenSigner};
use crate::config::AuthConfig;
use thiserror::Error;

/// Origin used when the transport cannot identify the caller.
pub const UNKNOWN_ORIGIN: &str = "unknown";

/// Authentication failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Too many failed login attempts, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,
}

/// A freshly minted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub subject: String,
    /// Epoch seconds.
    pub expires_at: i64,
}

impl Session {
    /// Remaining lifetime relative to `now`, for cookie `Max-Age`.
    pub fn max_age_secs(&self, now: i64) -> u64 {
        u64::try_from(self.expires_at.saturating_sub(now)).unwrap_or(0)
    }
}

/// Validates preset credentials, mints signed session tokens and throttles
/// origins that keep failing.
///
/// Each instance owns its own ledger, so independent authenticators never
/// share throttling state.
#[derive(Debug)]
pub struct TokenAuthenticator {
    credentials: CredentialSet,
    signer: TokenSigner,
    ledger: FailedAttemptLedger,
    token_ttl_secs: i64,
}

impl TokenAuthenticator {
    pub fn new(
        credentials: CredentialSet,
        secret: &str,
        token_ttl_secs: u64,
        max_attempts: u32,
        lockout_secs: u64,
    ) -> Self {
        Self {
            credentials,
            signer: TokenSigner::new(secret),
            ledger: FailedAttemptLedger::new(max_attempts, lockout_secs),
            token_ttl_secs: i64::try_from(token_ttl_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            CredentialSet::parse(&config.users),
            &config.secret_key,
            config.token_expire_hours.saturating_mul(3600),
            config.max_attempts,
            config.lockout_seconds,
        )
    }

    pub fn credentials(&self) -> &CredentialSet {
        &self.credentials
    }

    pub fn ledger(&self) -> &FailedAttemptLedger {
        &self.ledger
    }

    pub fn token_ttl_secs(&self) -> i64 {
        self.token_ttl_secs
    }

    /// Check credentials for `origin` and mint a session on success.
    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
        origin: &str,
    ) -> Result<Session, AuthError> {
        self.authenticate_at(username, password, origin, crate::util::epoch_secs())
    }

    pub fn authenticate_at(
        &self,
        username: &str,
        password: &str,
        origin: &str,
        now: i64,
    ) -> Result<Session, AuthError> {
        if let LockoutStatus::Locked { retry_after_secs } = self.ledger.check_at(origin, now) {
            tracing::warn!(origin, retry_after_secs, "Login rejected: origin is locked out");
            return Err(AuthError::RateLimited { retry_after_secs });
        }

        if !self.credentials.matches(username, password) {
            self.ledger.record_failure_at(origin, now);
            tracing::warn!(origin, username, "Login failed: invalid credentials");
            return Err(AuthError::InvalidCredentials);
        }

        self.ledger.clear(origin);
        let session = self.issue_at(username, now);
        tracing::info!(origin, username, "Login succeeded");
        Ok(session)
    }

    /// Mint a session for `username` without a password check. Used by
    /// operator tooling that already holds the signing secret.
    pub fn issue(&self, username: &str) -> Session {
        self.issue_at(username, crate::util::epoch_secs())
    }

    fn issue_at(&self, username: &str, now: i64) -> Session {
        let expires_at = now.saturating_add(self.token_ttl_secs);
        Session {
            token: self.signer.mint(username, expires_at),
            subject: username.to_string(),
            expires_at,
        }
    }

    /// Return the token's subject, or `None` for any invalid or expired token.
    pub fn verify(&self, token: &str) -> Option<String> {
        self.signer.verify(token).map(|claims| claims.sub)
    }

    pub fn verify_at(&self, token: &str, now: i64) -> Option<String> {
        self.signer.verify_at(token, now).map(|claims| claims.sub)
    }

    /// Full claims of a valid token.
    pub fn claims(&self, token: &str) -> Option<TokenClaims> {
        self.signer.verify(token)
    }

    /// `verify` as a `Result`, for callers that propagate with `?`.
    pub fn require(&self, token: &str) -> Result<String, AuthError> {
        self.verify(token).ok_or(AuthError::InvalidOrExpiredToken)
    }
}
