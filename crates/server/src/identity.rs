//! Maps bearer tokens to actors. Tokens are issued by the external authentication
//! service; this side only looks them up.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use secrecy::{ExposeSecret, SecretString};

use grievance_core::domain::user::Actor;
use grievance_core::errors::ApplicationError;
use grievance_db::SessionRepository;
use grievance_workflow::Clock;

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `None` when the token is unknown or expired.
    async fn resolve(&self, token: &SecretString) -> Result<Option<Actor>, ApplicationError>;
}

pub struct SessionIdentityResolver {
    sessions: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl SessionIdentityResolver {
    pub fn new(sessions: Arc<dyn SessionRepository>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self { sessions, clock, timeout }
    }
}

#[async_trait]
impl IdentityResolver for SessionIdentityResolver {
    async fn resolve(&self, token: &SecretString) -> Result<Option<Actor>, ApplicationError> {
        let lookup = self.sessions.find_session_user(token.expose_secret(), self.clock.now());
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(user)) => Ok(user.as_ref().map(Actor::from)),
            Ok(Err(error)) => {
                Err(ApplicationError::DependencyFailure(format!("session lookup failed: {error}")))
            }
            Err(_) => Err(ApplicationError::DependencyFailure("session lookup timed out".to_owned())),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum BearerError {
    Malformed,
}

/// Reads `Authorization: Bearer <token>`. A missing header is not an error.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<SecretString>, BearerError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| BearerError::Malformed)?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(BearerError::Malformed)?;
    Ok(Some(SecretString::from(token.to_owned())))
}
