//! OAuth redirect flow as a state machine.
//!
//! The hosted auth service sends the browser back to the app's redirect URI
//! with the tokens in the hash fragment. Everything here is pure except
//! [`SessionExchange`], which turns tokens into a session.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Facebook,
    Apple,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Facebook => "facebook",
            Provider::Apple => "apple",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid redirect URI: {0}")]
    InvalidUri(String),

    #[error("Redirect does not target {expected}")]
    ForeignRedirect { expected: String },

    #[error("No hash fragment in URL")]
    MissingFragment,

    #[error("Missing tokens in URL")]
    MissingTokens,

    #[error("Sign-in denied ({code}): {description}")]
    Denied { code: String, description: String },

    #[error("Invalid access token: {0}")]
    InvalidToken(String),

    #[error("Unexpected {event} while {state}")]
    UnexpectedEvent { state: String, event: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthState {
    Idle,
    AwaitingRedirect {
        provider: Provider,
        redirect_uri: String,
    },
    ExchangingToken {
        provider: Provider,
        tokens: TokenPair,
    },
    Authenticated {
        session: Session,
    },
    Failed {
        error: AuthError,
    },
}

impl AuthState {
    pub fn name(&self) -> &'static str {
        match self {
            AuthState::Idle => "idle",
            AuthState::AwaitingRedirect { .. } => "awaiting redirect",
            AuthState::ExchangingToken { .. } => "exchanging token",
            AuthState::Authenticated { .. } => "authenticated",
            AuthState::Failed { .. } => "failed",
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::Authenticated { session } => Some(session),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum AuthEvent {
    Start {
        provider: Provider,
        redirect_uri: String,
    },
    Redirect(String),
    Exchanged(Result<Session, AuthError>),
    SignOut,
    /// Abandon a pending or failed sign-in.
    Reset,
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::Start { .. } => "start",
            AuthEvent::Redirect(_) => "redirect",
            AuthEvent::Exchanged(_) => "token exchange result",
            AuthEvent::SignOut => "sign out",
            AuthEvent::Reset => "reset",
        }
    }
}

pub fn transition(state: AuthState, event: AuthEvent) -> AuthState {
    match (state, event) {
        (_, AuthEvent::SignOut) => AuthState::Idle,
        (
            AuthState::Idle | AuthState::Failed { .. } | AuthState::AwaitingRedirect { .. },
            AuthEvent::Start {
                provider,
                redirect_uri,
            },
        ) => AuthState::AwaitingRedirect {
            provider,
            redirect_uri,
        },
        (
            AuthState::AwaitingRedirect {
                provider,
                redirect_uri,
            },
            AuthEvent::Redirect(uri),
        ) => match parse_redirect(&uri, &redirect_uri) {
            Ok(tokens) => AuthState::ExchangingToken { provider, tokens },
            Err(error) => AuthState::Failed { error },
        },
        (AuthState::ExchangingToken { .. }, AuthEvent::Exchanged(result)) => match result {
            Ok(session) => AuthState::Authenticated { session },
            Err(error) => AuthState::Failed { error },
        },
        (state @ AuthState::Authenticated { .. }, AuthEvent::Reset) => AuthState::Failed {
            error: AuthError::UnexpectedEvent {
                state: state.name().to_string(),
                event: AuthEvent::Reset.name().to_string(),
            },
        },
        (_, AuthEvent::Reset) => AuthState::Idle,
        (state, event) => AuthState::Failed {
            error: AuthError::UnexpectedEvent {
                state: state.name().to_string(),
                event: event.name().to_string(),
            },
        },
    }
}

/// Turns tokens from a redirect into a session; backed by the hosted auth service.
pub trait SessionExchange {
    fn exchange(&self, tokens: &TokenPair) -> Result<Session, AuthError>;
}

/// Feeds a redirect into the machine and, on success, runs the token exchange.
pub fn complete_redirect(
    state: AuthState,
    uri: &str,
    exchange: &impl SessionExchange,
) -> AuthState {
    match transition(state, AuthEvent::Redirect(uri.to_string())) {
        AuthState::ExchangingToken { provider, tokens } => {
            let result = exchange.exchange(&tokens);
            transition(
                AuthState::ExchangingToken { provider, tokens },
                AuthEvent::Exchanged(result),
            )
        }
        other => other,
    }
}

pub fn parse_redirect(uri: &str, expected: &str) -> Result<TokenPair, AuthError> {
    let url = Url::parse(uri).map_err(|e| AuthError::InvalidUri(format!("{}: {}", uri, e)))?;

    let base = uri.split(['#', '?']).next().unwrap_or_default();
    if base.trim_end_matches('/') != expected.trim_end_matches('/') {
        return Err(AuthError::ForeignRedirect {
            expected: expected.to_string(),
        });
    }

    let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let fragment: Vec<(String, String)> = url
        .fragment()
        .map(|f| url::form_urlencoded::parse(f.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let lookup = |name: &str| {
        fragment
            .iter()
            .chain(query.iter())
            .find(|(k, v)| k == name && !v.is_empty())
            .map(|(_, v)| v.clone())
    };

    if let Some(code) = lookup("error") {
        return Err(AuthError::Denied {
            code,
            description: lookup("error_description").unwrap_or_default(),
        });
    }
    // Tokens travel in the fragment only; the query may carry an error.
    if url.fragment().map_or(true, str::is_empty) {
        return Err(AuthError::MissingFragment);
    }

    let from_fragment = |name: &str| {
        fragment
            .iter()
            .find(|(k, v)| k == name && !v.is_empty())
            .map(|(_, v)| v.clone())
    };
    match (from_fragment("access_token"), from_fragment("refresh_token")) {
        (Some(access_token), Some(refresh_token)) => Ok(TokenPair {
            access_token,
            refresh_token,
        }),
        _ => Err(AuthError::MissingTokens),
    }
}

pub fn authorize_url(base_url: &str, provider: Provider, redirect_uri: &str) -> Result<Url, AuthError> {
    let raw = format!("{}/auth/v1/authorize", base_url.trim_end_matches('/'));
    let mut url = Url::parse(&raw).map_err(|e| AuthError::InvalidUri(format!("{}: {}", raw, e)))?;
    url.query_pairs_mut()
        .append_pair("provider", provider.as_str())
        .append_pair("redirect_to", redirect_uri);
    Ok(url)
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    email: Option<String>,
    exp: Option<i64>,
}

/// Reads the session from the access token's claims without verifying the
/// signature; the token was just handed over by the auth service.
#[derive(Debug, Default, Clone, Copy)]
pub struct JwtSessionExchange;

impl SessionExchange for JwtSessionExchange {
    fn exchange(&self, tokens: &TokenPair) -> Result<Session, AuthError> {
        let payload = tokens
            .access_token
            .split('.')
            .nth(1)
            .ok_or_else(|| AuthError::InvalidToken("not a JWT".to_string()))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let claims: Claims =
            serde_json::from_slice(&bytes).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        if claims.sub.is_empty() {
            return Err(AuthError::InvalidToken("empty subject".to_string()));
        }
        Ok(Session {
            user_id: claims.sub,
            email: claims.email,
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: claims.exp,
        })
    }
}
