use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::NotesError;
use crate::remote::RemoteError;

pub trait CredentialStore: Send + Sync {
    fn get_token(&self) -> Option<String>;
    fn set_token(&self, token: &str) -> anyhow::Result<()>;
    fn clear_token(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryTokenStore {
    fn get_token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    fn set_token(&self, token: &str) -> anyhow::Result<()> {
        *self.token.lock() = Some(token.to_string());
        Ok(())
    }

    fn clear_token(&self) -> anyhow::Result<()> {
        *self.token.lock() = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Notes,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Notes => "/notes",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

pub trait Navigator: Send + Sync {
    fn go_to(&self, route: Route);
}

/// Keeps every transition; the last one is the current route.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<Route> {
        self.history.lock().clone()
    }

    pub fn current(&self) -> Option<Route> {
        self.history.lock().last().copied()
    }
}

impl Navigator for RecordingNavigator {
    fn go_to(&self, route: Route) {
        debug!(%route, "navigating");
        self.history.lock().push(route);
    }
}

impl<N: Navigator + ?Sized> Navigator for Arc<N> {
    fn go_to(&self, route: Route) {
        (**self).go_to(route);
    }
}

impl<C: CredentialStore + ?Sized> CredentialStore for Arc<C> {
    fn get_token(&self) -> Option<String> {
        (**self).get_token()
    }

    fn set_token(&self, token: &str) -> anyhow::Result<()> {
        (**self).set_token(token)
    }

    fn clear_token(&self) -> anyhow::Result<()> {
        (**self).clear_token()
    }
}

/// Which remote failures end the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPolicy {
    /// Only 401/403 responses.
    #[default]
    AuthOnly,
    /// Every failed call, including transport errors.
    AnyFailure,
}

impl SessionPolicy {
    pub fn invalidates(self, err: &RemoteError) -> bool {
        match self {
            SessionPolicy::AuthOnly => err.is_auth(),
            SessionPolicy::AnyFailure => true,
        }
    }
}

impl FromStr for SessionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auth" | "auth-only" => Ok(SessionPolicy::AuthOnly),
            "any" | "all" => Ok(SessionPolicy::AnyFailure),
            other => Err(anyhow!("invalid session.invalidate setting: {other}")),
        }
    }
}

pub struct SessionGuard<C, N> {
    credentials: C,
    navigator: N,
    policy: SessionPolicy,
}

impl<C: CredentialStore, N: Navigator> SessionGuard<C, N> {
    pub fn new(credentials: C, navigator: N, policy: SessionPolicy) -> Self {
        Self {
            credentials,
            navigator,
            policy,
        }
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    pub fn credentials(&self) -> &C {
        &self.credentials
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Bearer token for the next call. Without one, the caller is sent to
    /// the login route and must not touch the network.
    pub fn token(&self) -> Result<String, NotesError> {
        match self.credentials.get_token() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => {
                warn!("no credential token; redirecting to login");
                self.navigator.go_to(Route::Login);
                Err(NotesError::Unauthenticated)
            }
        }
    }

    /// Classifies a failed remote call. Returns `Unauthenticated` (after
    /// navigating) when the policy says the session is gone.
    pub fn on_failure(&self, err: RemoteError) -> NotesError {
        if self.policy.invalidates(&err) {
            warn!(error = %err, policy = ?self.policy, "session invalidated by remote failure");
            self.navigator.go_to(Route::Login);
            NotesError::Unauthenticated
        } else {
            NotesError::Remote(err)
        }
    }

    /// Stores a fresh token and moves on to the notes view.
    pub fn sign_in(&self, token: &str) -> anyhow::Result<()> {
        if token.trim().is_empty() {
            return Err(anyhow!("token cannot be empty"));
        }
        self.credentials.set_token(token)?;
        info!("signed in");
        self.navigator.go_to(Route::Notes);
        Ok(())
    }

    pub fn logout(&self) -> anyhow::Result<()> {
        self.credentials.clear_token()?;
        info!("logged out");
        self.navigator.go_to(Route::Login);
        Ok(())
    }
}
