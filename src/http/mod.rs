// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

/// Retrying HTTP client and status classification.
mod client;
/// Cookie jar and its persisted form.
mod cookies;
/// Cookie persistence across sessions.
mod session;

pub use self::client::{
    check_status, is_retryable, RetryClient, RetryClientBuilder, RETRYABLE_STATUS_CODES,
};
pub use self::cookies::{build_set_cookie_header, expiry_timestamp, CookieJar, StoredCookie};
pub use self::session::{MemorySessionStore, SessionPersistClient, SessionStore};
