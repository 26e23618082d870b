//! # Session
//!
//! The shelf never signs anyone in. It reads whether a session exists, borrows its bearer token for
//! remote calls, and asks for the session to be cleared when the remote says the token expired.
use std::fmt;

use parking_lot::RwLock;
use tracing::info;

#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub authenticated: bool,
    pub token: Option<Credential>,
}

pub trait SessionProvider: Send + Sync {
    fn is_authenticated(&self) -> bool;

    fn credential(&self) -> Option<Credential>;

    /// Drops the session, the logout side effect of an expired token.
    fn clear(&self);
}

#[derive(Debug, Default)]
pub struct SharedSession {
    inner: RwLock<Session>,
}

impl SharedSession {
    pub fn signed_in(token: Credential) -> Self {
        Self {
            inner: RwLock::new(Session {
                authenticated: true,
                token: Some(token),
            }),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, token: Credential) {
        *self.inner.write() = Session {
            authenticated: true,
            token: Some(token),
        };
    }

    pub fn session(&self) -> Session {
        self.inner.read().clone()
    }
}

impl SessionProvider for SharedSession {
    fn is_authenticated(&self) -> bool {
        let session = self.inner.read();

        session.authenticated && session.token.is_some()
    }

    fn credential(&self) -> Option<Credential> {
        let session = self.inner.read();

        session
            .authenticated
            .then(|| session.token.clone())
            .flatten()
    }

    fn clear(&self) {
        *self.inner.write() = Session::default();

        info!("Session cleared");
    }
}
