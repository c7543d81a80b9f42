//! Token authentication for preset accounts.
//!
//! Provides:
//! - A fixed credential set loaded at startup (no registration)
//! - Stateless HMAC-SHA256 signed session tokens with an embedded expiry
//! - Per-origin brute-force throttling of failed logins
//!
//! ## Design Decisions
//! - No JWT library: the token is a two-part `payload.signature` string, a
//!   minimal JSON Web Signature without a header segment.
//! - No server-side session table. A token stays valid until it expires or
//!   the signing secret changes.
//! - Password comparison is plain equality. The preset accounts are low-value
//!   development credentials; token signatures, by contrast, are compared in
//!   constant time.

pub mod authenticator;
pub mod credentials;
pub mod ledger;
pub mod token;

pub use authenticator::{AuthError, Session, TokenAuthenticator, UNKNOWN_ORIGIN};
pub use credentials::CredentialSet;
pub use ledger::{FailedAttemptLedger, LockoutStatus};
pub use token::{TokenClaims, TokenSigner};
