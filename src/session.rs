//! Typed session payload and the per-process auth context.
//!
//! The cookie layer itself lives in the HTTP boundary; this module only owns
//! what goes into the cookie and how it is checked.

use crate::config::Auth;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Built once from configuration and handed to every request handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    cookie_name: String,
    secret: String,
    max_age: Duration,
}

impl AuthContext {
    pub fn from_config(auth: &Auth) -> Self {
        Self {
            cookie_name: auth.cookie_name.clone(),
            secret: auth.secret.clone(),
            max_age: Duration::from_secs(auth.session_max_age_secs),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Key the cookie layer signs sessions with.
    pub fn secret(&self) -> &[u8] {
        self.secret.as_bytes()
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// User id of an authenticated session.
    pub fn authorize(&self, session: &SessionPayload) -> Result<i64, Error> {
        match (session.authenticated, session.uid) {
            (true, Some(uid)) => Ok(uid),
            _ => Err(Error::not_authorized("login required")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionPayload {
    pub authenticated: bool,
    #[serde(default)]
    pub uid: Option<i64>,
    /// Local path to return to after login.
    #[serde(default)]
    pub redirect: Option<String>,
}

impl SessionPayload {
    pub fn login(uid: i64) -> Self {
        Self {
            authenticated: true,
            uid: Some(uid),
            redirect: None,
        }
    }

    pub fn logout() -> Self {
        Self::default()
    }

    /// Parses and validates a payload read back from the cookie store.
    pub fn decode(raw: &str) -> Result<Self, Error> {
        let payload: SessionPayload = serde_json::from_str(raw)
            .map_err(|e| Error::bad_input(format!("malformed session: {e}")))?;
        payload.validate()?;
        Ok(payload)
    }

    pub fn encode(&self) -> Result<String, Error> {
        serde_json::to_string(self)
            .map_err(|e| Error::internal(format!("could not encode session: {e}")))
    }

    fn validate(&self) -> Result<(), Error> {
        if self.authenticated && !matches!(self.uid, Some(uid) if uid > 0) {
            return Err(Error::bad_input("authenticated session without user id"));
        }
        if let Some(redirect) = &self.redirect {
            if !redirect.starts_with('/') || redirect.starts_with("//") {
                return Err(Error::bad_input("redirect must be a local path"));
            }
        }
        Ok(())
    }

    pub fn redirect_target(&self) -> &str {
        self.redirect.as_deref().unwrap_or("/")
    }
}
