//! Token introspection subsystem.
//!
//! Three stages, deliberately kept in separate modules:
//!
//! 1. [`claims`] — unverified peek at the token payload, used only to pick
//!    which authority to ask. Shares no types with the stages below.
//! 2. [`client`] — the blocking-per-request outbound call to the resolved
//!    introspection authority.
//! 3. [`validator`] — the fail-closed authorization decision against the
//!    client directory.

pub mod claims;
pub mod client;
pub mod validator;

pub use claims::RoutingClaims;
pub use client::{IntrospectionResult, TokenIntrospector};
pub use validator::{AccessDecision, DenyReason, ValidationPolicy, validate};
