//! Bearer token state shared by every outbound call
//!
//! The store is a cheap cloneable handle. `main` builds it once from the
//! persisted token file and hands clones to the remote client and the
//! coordinator; nothing reaches it through globals.
//!
//! Two counters ride along with the token:
//! - the auth **epoch**, bumped on every login and teardown, lets late
//!   responses from a previous session be recognised and ignored
//! - the request **sequence**, handed out per call, keeps rotation monotonic
//!   in call order when responses arrive out of order

mod storage;

pub use storage::TokenFile;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Opaque bearer credential
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
}

impl Token {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

// Never print the credential itself, even in debug logs
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Snapshot taken when a request is issued
#[derive(Debug, Clone)]
pub struct RequestStamp {
    pub seq: u64,
    pub epoch: u64,
    pub token: Option<Token>,
}

#[derive(Debug, Default)]
struct AuthState {
    token: Option<Token>,
    epoch: u64,
    next_seq: u64,
    /// Sequence of the request whose token was last applied
    rotated_seq: u64,
}

/// Process-wide token holder with login/teardown lifecycle
#[derive(Clone)]
pub struct AuthStore {
    state: Arc<Mutex<AuthState>>,
    storage: Option<TokenFile>,
}

impl AuthStore {
    /// Store without persistence
    #[cfg(test)]
    pub fn in_memory(token: Option<Token>) -> Self {
        Self {
            state: Arc::new(Mutex::new(AuthState {
                token,
                ..Default::default()
            })),
            storage: None,
        }
    }

    /// Initialise from the persisted token file, if one exists
    pub fn load(storage: TokenFile) -> Self {
        let token = match storage.read() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Ignoring unreadable token file: {:#}", e);
                None
            }
        };
        if token.is_some() {
            tracing::debug!("Restored session token from {}", storage.path().display());
        }
        Self {
            state: Arc::new(Mutex::new(AuthState {
                token,
                ..Default::default()
            })),
            storage: Some(storage),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<Token> {
        self.lock().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().token.is_some()
    }

    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Reserve a sequence number and capture the token to send with it
    pub fn begin_request(&self) -> RequestStamp {
        let mut state = self.lock();
        state.next_seq += 1;
        RequestStamp {
            seq: state.next_seq,
            epoch: state.epoch,
            token: state.token.clone(),
        }
    }

    /// Replace the stored token irrespective of its prior value.
    /// Responses go through [`AuthStore::rotate_from`] instead.
    #[cfg(test)]
    pub fn rotate(&self, token: Token) {
        {
            let mut state = self.lock();
            state.rotated_seq = state.next_seq;
            state.token = Some(token.clone());
        }
        self.persist(Some(&token));
    }

    /// Apply a token carried by the response to `stamp`.
    ///
    /// Returns false (and leaves the store alone) when the response belongs
    /// to an earlier session, or when a newer request already rotated.
    pub fn rotate_from(&self, stamp: &RequestStamp, token: Token) -> bool {
        {
            let mut state = self.lock();
            if state.epoch != stamp.epoch || state.token.is_none() {
                return false;
            }
            if stamp.seq < state.rotated_seq {
                tracing::trace!(
                    seq = stamp.seq,
                    rotated = state.rotated_seq,
                    "Skipping rotation from older request"
                );
                return false;
            }
            state.rotated_seq = stamp.seq;
            state.token = Some(token.clone());
        }
        self.persist(Some(&token));
        true
    }

    /// Start a new authenticated session
    pub fn login(&self, token: Token) {
        {
            let mut state = self.lock();
            state.epoch += 1;
            state.rotated_seq = state.next_seq;
            state.token = Some(token.clone());
        }
        tracing::info!("Session started");
        self.persist(Some(&token));
    }

    /// Drop the token (logout or detected expiry)
    pub fn clear(&self) {
        {
            let mut state = self.lock();
            state.epoch += 1;
            state.token = None;
        }
        self.persist(None);
    }

    /// Collapse a 401 into a single teardown.
    ///
    /// Returns true only for the first rejection observed in the session
    /// identified by `epoch`; later or concurrent rejections return false.
    pub fn expire(&self, epoch: u64) -> bool {
        {
            let mut state = self.lock();
            if state.epoch != epoch || state.token.is_none() {
                return false;
            }
            state.epoch += 1;
            state.token = None;
        }
        tracing::warn!("Access token rejected by server, session expired");
        self.persist(None);
        true
    }

    fn persist(&self, token: Option<&Token>) {
        let Some(storage) = &self.storage else {
            return;
        };
        let result = match token {
            Some(token) => storage.write(token),
            None => storage.remove(),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to persist session token: {:#}", e);
        }
    }
}

impl fmt::Debug for AuthStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("AuthStore")
            .field("authenticated", &state.token.is_some())
            .field("epoch", &state.epoch)
            .finish()
    }
}
