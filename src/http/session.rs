// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::RetryClient;
use crate::common::Error;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use tracing::{info, warn};

/// Key-value storage for serialized cookie jars, keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Base64 cookies previously written for `session_id`, if any.
    async fn read_session(&self, session_id: &str) -> Result<Option<Vec<u8>>, Error>;

    /// Stores `b64_cookies` for `session_id`, overwriting any prior value.
    async fn write_session(&self, session_id: &str, b64_cookies: Vec<u8>) -> Result<(), Error>;
}

/// In-process [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn read_session(&self, session_id: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.sessions().get(session_id).cloned())
    }

    async fn write_session(&self, session_id: &str, b64_cookies: Vec<u8>) -> Result<(), Error> {
        self.sessions().insert(session_id.to_string(), b64_cookies);
        Ok(())
    }
}

/// A [`RetryClient`] whose cookies live in a [`SessionStore`] between uses.
pub struct SessionPersistClient<S> {
    store: S,
    session_id: String,
    client: RetryClient,
}

impl<S: SessionStore> SessionPersistClient<S> {
    /// Wraps `client`; nothing is read until [`SessionPersistClient::open`].
    pub fn new(store: S, session_id: impl Into<String>, client: RetryClient) -> Self {
        Self {
            store,
            session_id: session_id.into(),
            client,
        }
    }

    /// The wrapped client.
    pub fn client(&self) -> &RetryClient {
        &self.client
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The session id cookies are stored under.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Installs the stored cookies, if any, into the client.
    pub async fn open(&self) -> Result<&RetryClient, Error> {
        match self.store.read_session(&self.session_id).await? {
            Some(b64_cookies) => {
                self.client.b64_decode_and_set_cookies(&b64_cookies)?;
                info!(
                    session_id = %self.session_id,
                    cookies = self.client.cookie_jar().len(),
                    "restored session cookies"
                );
            }
            None => info!(session_id = %self.session_id, "no stored session cookies"),
        }
        Ok(&self.client)
    }

    /// Writes the client's cookies back under the session id.
    pub async fn close(&self) -> Result<(), Error> {
        let b64_cookies = self.client.b64_encoded_cookies()?;
        self.store
            .write_session(&self.session_id, b64_cookies.into_bytes())
            .await?;
        info!(session_id = %self.session_id, "saved session cookies");
        Ok(())
    }

    /// Opens the session, runs `f` with the client and closes the session, even when `f`
    /// fails. The error of `f` takes precedence over an error while closing.
    pub async fn run<T, F, Fut>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(RetryClient) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        self.open().await?;
        let result = f(self.client.clone()).await;
        match (result, self.close().await) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_error)) => {
                warn!(session_id = %self.session_id, "cannot save session: {close_error}");
                Err(e)
            }
        }
    }
}
