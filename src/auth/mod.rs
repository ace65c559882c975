pub mod auth;
pub mod native;
pub mod password;
pub mod session_context;

// Re-export from auth.rs so we can do "use crate::auth::*;"
pub use auth::{Auth, ExchangeOutcome};
pub use session_context::{SessionContext, SessionObserver};
