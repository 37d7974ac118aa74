// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

/// Configuration read from TOML and the environment.
mod config;
/// An enum that encapsulates a variety of error types.
mod error;
/// API Gateway proxy responses.
mod response;
/// ISO 8601 and Unix timestamps.
mod time;

pub use self::config::{KitConfig, KitConfigBuilder};
pub use self::error::Error;
#[cfg(feature = "aws")]
pub use self::error::{AnyhowError, DynamoError, SerdeError};
#[cfg(feature = "http")]
pub use self::error::ReqwestError;
pub use self::response::{build_lambda_response, lambda_response};
pub use self::time::{
    expire_at, now_iso_8601, to_iso_8601, DEFAULT_EXPIRES_IN_SECONDS, SECONDS_IN_DAY,
};
