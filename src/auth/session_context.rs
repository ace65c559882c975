use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::models::session::{SessionCredential, SessionIssuer};
use crate::models::user::UserIdentity;
use crate::store::Store;

const OBSERVER_CHANNEL_CAPACITY: usize = 16;

#[derive(Default)]
struct SessionState {
    user: Option<UserIdentity>,
    credential: Option<SessionCredential>,
}

/// Auth state of one client session.
///
/// Created by whoever owns the client (a request handler, a test, a UI shell)
/// and passed explicitly to the code that needs the identity.
pub struct SessionContext {
    sessions: Arc<SessionIssuer>,
    store: Arc<dyn Store>,
    state: Arc<Mutex<SessionState>>,
    tx: broadcast::Sender<Option<UserIdentity>>,
}

/// Keeps an observer attached; dropping it detaches the observer.
pub struct SessionObserver {
    task: JoinHandle<()>,
}

impl Drop for SessionObserver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// State is replaced whole, so a poisoned guard still holds a consistent value.
fn lock_state(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl SessionContext {
    pub fn new(sessions: Arc<SessionIssuer>, store: Arc<dyn Store>) -> Self {
        let (tx, _) = broadcast::channel(OBSERVER_CHANNEL_CAPACITY);
        SessionContext {
            sessions,
            store,
            state: Arc::new(Mutex::new(SessionState::default())),
            tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        lock_state(&self.state)
    }

    async fn resolve(&self, credential: &SessionCredential) -> Result<UserIdentity, AppError> {
        let claims = self.sessions.verify(credential.as_str()).map_err(|e| {
            warn!("Session credential rejected: {}", e);
            AppError::AuthRequired
        })?;

        match self.store.get_user(&claims.uid).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => {
                debug!("No stored profile for '{}'", claims.uid);
                Ok(UserIdentity::bare(claims.uid))
            }
            Err(e) if !self.store.is_enabled() => {
                debug!("Store unavailable, using claims only: {}", e);
                Ok(UserIdentity::bare(claims.uid))
            }
            Err(e) => Err(AppError::Store(e)),
        }
    }

    /// Stores the new state and notifies observers. Every login and refresh
    /// is a transition, even for the same uid; clearing an empty session is not.
    fn publish(&self, user: Option<UserIdentity>, credential: Option<SessionCredential>) {
        let mut state = self.lock();
        let notify = user.is_some() || state.user.is_some();
        state.user = user.clone();
        state.credential = credential;
        if notify {
            // No receivers is fine.
            let _ = self.tx.send(user);
        }
    }

    /// Exchanges a credential for a local session and notifies observers.
    pub async fn complete_login(
        &self,
        credential: SessionCredential,
    ) -> Result<UserIdentity, AppError> {
        let user = self.resolve(&credential).await?;
        info!("Session started for '{}'", user.uid);
        self.publish(Some(user.clone()), Some(credential));
        Ok(user)
    }

    /// Replaces the credential of an active session, e.g. after token refresh.
    pub async fn refresh(&self, credential: SessionCredential) -> Result<UserIdentity, AppError> {
        if self.lock().user.is_none() {
            return Err(AppError::AuthRequired);
        }
        let user = self.resolve(&credential).await?;
        debug!("Session refreshed for '{}'", user.uid);
        self.publish(Some(user.clone()), Some(credential));
        Ok(user)
    }

    pub fn logout(&self) {
        if let Some(user) = &self.lock().user {
            info!("Session ended for '{}'", user.uid);
        }
        self.publish(None, None);
    }

    pub fn current_user(&self) -> Option<UserIdentity> {
        self.lock().user.clone()
    }

    pub fn credential(&self) -> Option<SessionCredential> {
        self.lock().credential.clone()
    }

    /// Calls `callback` with the current identity right away and again after
    /// every transition, until the returned guard is dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn observe<F>(&self, callback: F) -> SessionObserver
    where
        F: Fn(Option<&UserIdentity>) + Send + Sync + 'static,
    {
        // Subscribe and read under the same lock so no transition falls in between.
        let mut rx = {
            let state = self.lock();
            callback(state.user.as_ref());
            self.tx.subscribe()
        };

        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(user) => callback(user.as_ref()),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Session observer skipped {} transitions", skipped);
                        let current = lock_state(&state).user.clone();
                        callback(current.as_ref());
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        SessionObserver { task }
    }
}
