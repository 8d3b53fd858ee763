//! Authentication module for the RPC surface.
//!
//! Every request is signed with the caller's Ed25519 key. The principal in the
//! header is the public key itself, so no key registry is involved.
//!
//! ## Components
//! - `signature`: header format, request signing and Ed25519 verification
//! - `error`: Authentication error types (4001-4007)
//! - `ts_store`: Timestamp nonce store for replay protection
//! - `middleware`: Axum authentication middleware

pub mod error;
pub mod middleware;
pub mod signature;
pub mod ts_store;

// Re-export for convenience
pub use error::{AuthError, AuthErrorCode};
pub use middleware::{AuthState, Caller, auth_middleware, extract_auth_header, validate_ts_nonce};
pub use signature::{AuthHeader, parse_authorization, sign_request, verify_signature};
pub use ts_store::TsStore;
