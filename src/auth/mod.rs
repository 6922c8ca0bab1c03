//! Credential handling shared by the session-cookie and bearer-token paths.

pub mod password;
pub mod session;
pub mod token;

pub use password::{hash_password, verify_password};
pub use session::{SESSION_COOKIE, SESSION_TTL_DAYS};
pub use token::{IssuedToken, TokenError, TokenIssuer};
