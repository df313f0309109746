//! Auth collaborator - sign-in provider contract and session state.
//!
//! Providers are external. The core only needs the current user, sign in and
//! out, and a plain observer registration that is independent of any UI
//! lifecycle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;
use tracing::{info, warn};

/// The signed-in author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub is_anonymous: bool,
}

impl User {
    /// Create a signed-in, non-anonymous user.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
            is_anonymous: false,
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Errors reported by a sign-in provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The user dismissed the sign-in prompt.
    #[error("sign-in cancelled")]
    Cancelled,

    #[error("{0}")]
    Provider(String),
}

impl AuthError {
    /// Message suitable for the UI.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Cancelled => "Sign-in cancelled by user.".to_string(),
            AuthError::Provider(msg) if !msg.is_empty() => msg.clone(),
            AuthError::Provider(_) => {
                "Authentication failed. Please check your connection.".to_string()
            }
        }
    }
}

/// Callback invoked with the new user (or `None` on sign-out).
pub type AuthHandler = Arc<dyn Fn(Option<&User>) + Send + Sync>;

/// A sign-in provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The signed-in user, if any.
    fn current_user(&self) -> Option<User>;

    /// Run the provider's sign-in flow.
    async fn sign_in(&self) -> Result<User, AuthError>;

    /// Sign the current user out.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Register for auth changes. Dropping the subscription unregisters.
    fn subscribe(&self, handler: AuthHandler) -> Subscription;
}

type HandlerList = Mutex<Vec<(u64, AuthHandler)>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of auth observers, for provider implementations.
#[derive(Default)]
pub struct AuthObservers {
    handlers: Arc<HandlerList>,
    next_id: AtomicU64,
}

impl AuthObservers {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler until the returned subscription is dropped.
    pub fn subscribe(&self, handler: AuthHandler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.handlers).push((id, handler));
        Subscription {
            id,
            handlers: Arc::downgrade(&self.handlers),
        }
    }

    /// Call every registered handler.
    pub fn notify(&self, user: Option<&User>) {
        // Handlers may subscribe or unsubscribe, so call outside the lock.
        let handlers: Vec<AuthHandler> =
            lock(&self.handlers).iter().map(|(_, h)| h.clone()).collect();
        for handler in handlers {
            handler(user);
        }
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        lock(&self.handlers).len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by [`AuthProvider::subscribe`].
#[must_use = "dropping a subscription unregisters its handler"]
pub struct Subscription {
    id: u64,
    handlers: Weak<HandlerList>,
}

impl Subscription {
    /// Unregister now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handlers) = self.handlers.upgrade() {
            lock(&handlers).retain(|(id, _)| *id != self.id);
        }
    }
}

/// Auth state shown by the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<User>,
    /// True until the provider reports the first auth state.
    pub is_checking: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Tracks the signed-in user and maps provider errors to messages.
pub struct AuthSession {
    provider: Arc<dyn AuthProvider>,
    state: Arc<Mutex<AuthState>>,
    _subscription: Subscription,
}

impl AuthSession {
    /// Start tracking `provider`. The state reports `is_checking` until it first calls back.
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        let state = Arc::new(Mutex::new(AuthState {
            is_checking: true,
            ..AuthState::default()
        }));

        let observed = Arc::clone(&state);
        let subscription = provider.subscribe(Arc::new(move |user: Option<&User>| {
            let mut state = lock(&observed);
            state.user = user.cloned();
            state.is_checking = false;
        }));

        Self {
            provider,
            state,
            _subscription: subscription,
        }
    }

    /// Snapshot of the auth state.
    pub fn state(&self) -> AuthState {
        lock(&self.state).clone()
    }

    /// Sign in, recording the user-facing message on failure.
    pub async fn sign_in(&self) -> Result<User, AuthError> {
        self.update(|s| s.is_loading = true);
        let result = self.provider.sign_in().await;

        match &result {
            Ok(user) => {
                info!(uid = %user.uid, "Signed in");
                self.update(|s| s.error = None);
            }
            Err(e) => {
                warn!(error = %e, "Sign in failed");
                let message = e.user_message();
                self.update(|s| s.error = Some(message));
            }
        }

        self.update(|s| s.is_loading = false);
        result
    }

    /// Sign out, recording "Sign out failed." on failure.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self.provider.sign_out().await;
        if let Err(e) = &result {
            warn!(error = %e, "Sign out failed");
            self.update(|s| s.error = Some("Sign out failed.".to_string()));
        }
        result
    }

    fn update(&self, f: impl FnOnce(&mut AuthState)) {
        f(&mut lock(&self.state));
    }
}
