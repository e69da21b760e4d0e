use anyhow::{Context, Result};

use fourdata_db::store::SecureStore;

use crate::auth::{complete_redirect, AuthError, AuthState, Session, SessionExchange};

pub const AUTH_STATE_KEY: &str = "fourdata.auth.state";

/// Source of the signed-in user's id. Polled once per command.
pub trait IdentityProvider {
    fn current_user_id(&self) -> Option<String>;
}

impl<T: IdentityProvider + ?Sized> IdentityProvider for &T {
    fn current_user_id(&self) -> Option<String> {
        (**self).current_user_id()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<String>);

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Auth state persisted in the secure store between invocations.
pub struct AuthStateStore<S> {
    store: S,
}

impl<S: SecureStore> AuthStateStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Missing or unreadable state reads as [`AuthState::Idle`].
    pub fn load(&self) -> AuthState {
        let raw = match self.store.get(AUTH_STATE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return AuthState::Idle,
            Err(e) => {
                tracing::warn!(error = %e, "cannot read auth state");
                return AuthState::Idle;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "discarding corrupt auth state");
                AuthState::Idle
            }
        }
    }

    pub fn save(&self, state: &AuthState) -> Result<()> {
        if *state == AuthState::Idle {
            return self.clear();
        }
        let json = serde_json::to_string(state)?;
        self.store
            .set(AUTH_STATE_KEY, &json)
            .context("Cannot persist auth state")?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.store
            .delete(AUTH_STATE_KEY)
            .context("Cannot clear auth state")?;
        Ok(())
    }

    /// Feeds a redirect into a pending sign-in and persists the outcome.
    /// Without a pending sign-in nothing is saved, so an existing session survives.
    pub fn finish_sign_in(&self, uri: &str, exchange: &impl SessionExchange) -> Result<AuthState> {
        let state = self.load();
        if !matches!(state, AuthState::AwaitingRedirect { .. }) {
            return Err(AuthError::UnexpectedEvent {
                state: state.name().to_string(),
                event: "redirect".to_string(),
            }
            .into());
        }
        let next = complete_redirect(state, uri, exchange);
        self.save(&next)?;
        Ok(next)
    }

    pub fn session(&self) -> Option<Session> {
        match self.load() {
            AuthState::Authenticated { session } => Some(session),
            _ => None,
        }
    }
}

impl<S: SecureStore> IdentityProvider for AuthStateStore<S> {
    fn current_user_id(&self) -> Option<String> {
        self.session().map(|s| s.user_id)
    }
}
