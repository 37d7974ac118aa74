// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

use hyper::StatusCode;
use std::borrow::Cow;
use std::fmt::{Display, Formatter};

#[cfg(feature = "aws")]
pub use crate::aws::DbError;

#[cfg(feature = "aws")]
/// A convenient alias for Anyhow so consuming code doesn't need to add to `Cargo.toml`
pub type AnyhowError = anyhow::Error;

#[cfg(feature = "aws")]
/// A convenient alias for Dynamo DB error so consuming code doesn't need to add to `Cargo.toml`
pub type DynamoError = aws_sdk_dynamodb::Error;

#[cfg(feature = "aws")]
/// A convenient alias for Serde Dynamo error so consuming code doesn't need to add to `Cargo.toml`
pub type SerdeError = serde_dynamo::Error;

#[cfg(feature = "http")]
/// A convenient alias for the HTTP client error so consuming code doesn't need to add to `Cargo.toml`
pub type ReqwestError = reqwest::Error;

#[derive(Debug)]
/// An enum that encapsulates a variety of error types.
///
/// # Example
///
/// Error::Http(StatusCode::NOT_FOUND, format!("{url}: not found"))
pub enum Error {
    #[cfg(feature = "aws")]
    /// Wrapped AWS SDK error without a typed mapping.
    Anyhow(AnyhowError, String),
    #[cfg(feature = "aws")]
    /// Dynamo DB error that no error map recognized, passed through as is.
    Dynamo(DynamoError, String),
    #[cfg(feature = "aws")]
    /// Dynamo DB error normalized to a typed kind.
    Db(DbError, String),
    #[cfg(feature = "aws")]
    /// Serde (serialization or deserialization) error
    Serde(SerdeError),
    #[cfg(feature = "http")]
    /// Transport error, or an error status the caller asked to pass through.
    Reqwest(ReqwestError, String),
    /// API error: an error status that is neither passed through nor 401.
    Http(StatusCode, String),
    /// Credentials were rejected (HTTP 401 or Cognito `NotAuthorizedException`).
    NotAuthorized(String),
    /// A stored cookie jar could not be decoded.
    CookieDecoding(String),
    /// A secret or parameter is missing or malformed.
    Secret(String),
    /// String error.
    String(String),
}

impl Error {
    /// Short, stable name of the error kind, e.g. for response bodies. Application defined
    /// Dynamo DB kinds are named after themselves.
    pub fn name(&self) -> Cow<'static, str> {
        let name = match self {
            #[cfg(feature = "aws")]
            Error::Anyhow(..) => "ServiceError",
            #[cfg(feature = "aws")]
            Error::Dynamo(..) => "DynamoDBError",
            #[cfg(feature = "aws")]
            Error::Db(db_error, _) => return db_error.name(),
            #[cfg(feature = "aws")]
            Error::Serde(_) => "SerdeError",
            #[cfg(feature = "http")]
            Error::Reqwest(..) => "RequestError",
            Error::Http(..) => "APIError",
            Error::NotAuthorized(_) => "NotAuthorized",
            Error::CookieDecoding(_) => "CookieDecodingError",
            Error::Secret(_) => "SecretError",
            Error::String(_) => "CoreError",
        };
        Cow::Borrowed(name)
    }

    /// Map `String` to `Error`.
    pub fn from_string(s: String) -> Self {
        Error::String(s)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            #[cfg(feature = "aws")]
            Error::Anyhow(e, context) => write!(f, "{context}: {e}"),
            #[cfg(feature = "aws")]
            Error::Dynamo(e, context) => write!(f, "{context}: {e}"),
            #[cfg(feature = "aws")]
            Error::Db(db_error, context) => write!(f, "{context}: {db_error}"),
            #[cfg(feature = "aws")]
            Error::Serde(e) => write!(f, "{e}"),
            #[cfg(feature = "http")]
            Error::Reqwest(e, context) => write!(f, "{context}: {e}"),
            Error::Http(status_code, mesg) => write!(f, "{status_code}: {mesg}"),
            Error::NotAuthorized(mesg) => write!(f, "not authorized: {mesg}"),
            Error::CookieDecoding(mesg) => write!(f, "cannot decode cookies: {mesg}"),
            Error::Secret(mesg) => write!(f, "secret: {mesg}"),
            Error::String(s) => Display::fmt(&s, f),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(feature = "aws")]
impl From<SerdeError> for Error {
    fn from(e: SerdeError) -> Self {
        Error::Serde(e)
    }
}
