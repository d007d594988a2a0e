//! `crm-auth`: identity, session and route-level authorization.
//!
//! This crate is decoupled from HTTP and storage: the auth provider and the
//! profile store are reached through the [`AuthProvider`] and
//! [`ProfileSource`] ports.

pub mod claims;
pub mod guard;
pub mod identity;
pub mod provider;
pub mod roles;
pub mod session;

pub use claims::{
    Hs256SessionValidator, Hs256TokenIssuer, SessionClaims, SessionValidator, TokenValidationError,
    validate_claims,
};
pub use guard::{GuardDecision, LOGIN_PATH, RouteGuard};
pub use identity::{AccessToken, Identity, Profile, ProfilePatch};
pub use provider::{AuthError, AuthEvent, AuthProvider, AuthSession, SignUpRequest};
pub use roles::{Role, UnknownRole};
pub use session::{ProfileSource, Session, SessionSnapshot};
