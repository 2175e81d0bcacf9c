//! HTTP gateway — filter, identity context, router, server.
//!
//! Per-request control flow:
//!
//! ```text
//! Request arrives
//!   -> path under protected prefix?      (no: pass through)
//!   -> extract bearer token              (missing: 401)
//!   -> peek routing claims               (best-effort)
//!   -> resolve authority via directory   (fallback: default endpoint)
//!   -> introspect with authority         (invalid: 401)
//!   -> validate issuer/audience/registration (denied: 401)
//!   -> identity scope { downstream handler }
//!   -> scope torn down on every exit path
//! ```

pub mod auth;
pub mod context;
pub mod router;
pub mod server;

pub use context::RequestIdentity;
pub use router::{AppState, create_router, create_router_with_tools};
pub use server::Gateway;
