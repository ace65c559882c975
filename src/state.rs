//! Shared application state.
//!
//! Contains the state that is shared across all request handlers:
//! the login services, the session issuer, the mailbox and the store.

use crate::auth::Auth;
use crate::mailbox::Mailbox;
use crate::metrics::Metrics;
use crate::models::session::SessionIssuer;
use crate::providers::ProviderRegistry;
use crate::store::Store;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Provider code exchange and native registration/login.
    pub auth: Arc<Auth>,
    pub providers: Arc<ProviderRegistry>,
    /// Mints and verifies session credentials.
    pub sessions: Arc<SessionIssuer>,
    /// Users, native accounts and messages.
    pub store: Arc<dyn Store>,
    pub mailbox: Arc<Mailbox>,
    pub metrics: Metrics,
}
