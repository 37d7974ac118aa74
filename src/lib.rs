// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

#![warn(missing_docs)]
//! Building blocks for services that talk to AWS and to third-party HTTP APIs:
//! retries with backoff, HTTP status classification, cookie-jar persistence,
//! Dynamo DB error normalization and thin Cognito, Secrets Manager and SSM wrappers.

#[cfg(feature = "aws")]
/// A wrapper which provides access to Dynamo DB, Cognito, Secrets Manager and SSM.
pub mod aws;
#[cfg(feature = "aws")]
pub use aws::*;

/// Types common to multiple wrappers.
pub mod common;
pub use common::*;

#[cfg(feature = "http")]
/// An HTTP client with retries and a persistable cookie jar.
pub mod http;
#[cfg(feature = "http")]
pub use http::*;

#[cfg(feature = "log")]
/// Structured logging.
pub mod log;
#[cfg(feature = "log")]
pub use log::*;

#[cfg(feature = "retry")]
/// Retries with exponential backoff and jitter.
pub mod retry;
#[cfg(feature = "retry")]
pub use retry::*;
