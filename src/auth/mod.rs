//! Authentication module for the back-office API
//!
//! Password login against the API issues a short-lived access token plus a
//! long-lived refresh credential. The session manager keeps the access token
//! current and refreshes it when the API rejects it.

pub mod claims;
pub mod login;
pub mod session;
pub mod tokens;

pub use login::{login, logout, register, status};
pub use session::{RefreshFuture, RefreshedTokens, SessionEvent, SessionManager};
pub use tokens::{MemoryTokenStore, TokenStore};
