// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use crate::common::{DynamoError, Error};
use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::transact_get_items::TransactGetItemsError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::CancellationReason;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use tracing::error;

/// Typed kinds a Dynamo DB failure is normalized to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DbError {
    /// A condition expression evaluated to false.
    ConditionCheckFailed,
    /// Another transaction touched the same item.
    TransactionConflict,
    /// Provisioned throughput of the table or index was exceeded.
    ThroughputExceeded,
    /// An item collection grew past 10 GB.
    ItemCollectionSizeLimitExceeded,
    /// Account level request limit was exceeded.
    RequestLimitExceeded,
    /// The table or index does not exist.
    ResourceNotFound,
    /// The request rate was throttled.
    Throttled,
    /// The request was malformed.
    Validation,
    /// Dynamo DB failed internally.
    InternalServerError,
    /// Application defined kind, e.g. `"SessionExists"`.
    Custom(String),
}

impl DbError {
    /// Short, stable name of the kind; a custom kind is its own name.
    pub fn name(&self) -> Cow<'static, str> {
        let name = match self {
            Self::ConditionCheckFailed => "ConditionCheckFailed",
            Self::TransactionConflict => "TransactionConflict",
            Self::ThroughputExceeded => "ThroughputExceeded",
            Self::ItemCollectionSizeLimitExceeded => "ItemCollectionSizeLimitExceeded",
            Self::RequestLimitExceeded => "RequestLimitExceeded",
            Self::ResourceNotFound => "ResourceNotFound",
            Self::Throttled => "Throttled",
            Self::Validation => "ValidationError",
            Self::InternalServerError => "InternalServerError",
            Self::Custom(name) => return Cow::Owned(name.clone()),
        };
        Cow::Borrowed(name)
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConditionCheckFailed => write!(f, "conditional check failed"),
            Self::TransactionConflict => write!(f, "transaction conflict"),
            Self::ThroughputExceeded => write!(f, "provisioned throughput exceeded"),
            Self::ItemCollectionSizeLimitExceeded => {
                write!(f, "item collection size limit exceeded")
            }
            Self::RequestLimitExceeded => write!(f, "request limit exceeded"),
            Self::ResourceNotFound => write!(f, "resource not found"),
            Self::Throttled => write!(f, "throttled"),
            Self::Validation => write!(f, "validation failed"),
            Self::InternalServerError => write!(f, "internal server error"),
            Self::Custom(s) => Display::fmt(s, f),
        }
    }
}

/// Maps Dynamo DB error codes to [`DbError`].
#[derive(Clone, Debug, Default)]
pub struct ErrorMap {
    codes: HashMap<String, DbError>,
}

impl ErrorMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the mapping of `code`.
    pub fn with(mut self, code: impl Into<String>, db_error: DbError) -> Self {
        self.codes.insert(code.into(), db_error);
        self
    }

    /// The kind `code` maps to, if any.
    pub fn get(&self, code: &str) -> Option<&DbError> {
        self.codes.get(code)
    }

    /// Top level service error codes.
    pub fn client_defaults() -> Self {
        Self::new()
            .with(
                "ConditionalCheckFailedException",
                DbError::ConditionCheckFailed,
            )
            .with("TransactionConflictException", DbError::TransactionConflict)
            .with(
                "ProvisionedThroughputExceededException",
                DbError::ThroughputExceeded,
            )
            .with(
                "ItemCollectionSizeLimitExceededException",
                DbError::ItemCollectionSizeLimitExceeded,
            )
            .with("RequestLimitExceeded", DbError::RequestLimitExceeded)
            .with("ResourceNotFoundException", DbError::ResourceNotFound)
            .with("ThrottlingException", DbError::Throttled)
            .with("ValidationException", DbError::Validation)
            .with("InternalServerError", DbError::InternalServerError)
    }

    /// Codes of per-item transaction cancellation reasons.
    pub fn cancellation_defaults() -> Self {
        Self::new()
            .with("ConditionalCheckFailed", DbError::ConditionCheckFailed)
            .with("TransactionConflict", DbError::TransactionConflict)
            .with(
                "ProvisionedThroughputExceeded",
                DbError::ThroughputExceeded,
            )
            .with(
                "ItemCollectionSizeLimitExceeded",
                DbError::ItemCollectionSizeLimitExceeded,
            )
            .with("ThrottlingError", DbError::Throttled)
            .with("ValidationError", DbError::Validation)
    }
}

/// Why one item of a transaction was cancelled. `code` is `"None"` for items that passed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CancelReason {
    /// Reason code, e.g. `"ConditionalCheckFailed"`.
    pub code: Option<String>,
    /// Human readable detail.
    pub message: Option<String>,
}

impl From<&CancellationReason> for CancelReason {
    fn from(reason: &CancellationReason) -> Self {
        Self {
            code: reason.code().map(str::to_string),
            message: reason.message().map(str::to_string),
        }
    }
}

/// Operation errors that may carry per-item cancellation reasons.
pub trait ProvideCancellationReasons {
    /// Reasons in the order of the items of the request; empty unless a transaction was
    /// cancelled.
    fn cancellation_reasons(&self) -> Vec<CancelReason> {
        Vec::new()
    }
}

impl ProvideCancellationReasons for TransactWriteItemsError {
    fn cancellation_reasons(&self) -> Vec<CancelReason> {
        match self {
            Self::TransactionCanceledException(e) => {
                e.cancellation_reasons().iter().map(CancelReason::from).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl ProvideCancellationReasons for TransactGetItemsError {
    fn cancellation_reasons(&self) -> Vec<CancelReason> {
        match self {
            Self::TransactionCanceledException(e) => {
                e.cancellation_reasons().iter().map(CancelReason::from).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl ProvideCancellationReasons for BatchWriteItemError {}
impl ProvideCancellationReasons for DeleteItemError {}
impl ProvideCancellationReasons for GetItemError {}
impl ProvideCancellationReasons for PutItemError {}
impl ProvideCancellationReasons for QueryError {}
impl ProvideCancellationReasons for UpdateItemError {}

/// The parts of a Dynamo DB error response that normalization looks at.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ErrorResponse {
    /// Top level error code, e.g. `"TransactionCanceledException"`.
    pub code: Option<String>,
    /// Top level message.
    pub message: Option<String>,
    /// Per-item reasons of a cancelled transaction.
    pub cancellation_reasons: Vec<CancelReason>,
}

impl ErrorResponse {
    /// Extracts the response of a service error. Transport failures have no code.
    pub fn from_sdk_error<E, R>(error: &SdkError<E, R>) -> Self
    where
        E: ProvideErrorMetadata + ProvideCancellationReasons,
    {
        match error.as_service_error() {
            Some(service_error) => Self {
                code: service_error.code().map(str::to_string),
                message: service_error.message().map(str::to_string),
                cancellation_reasons: service_error.cancellation_reasons(),
            },
            None => Self::default(),
        }
    }
}

/// Turns Dynamo DB failures into [`Error::Db`] when a map recognizes them and
/// [`Error::Dynamo`] otherwise.
#[derive(Clone, Debug)]
pub struct DynamoErrorHandler {
    client_map: ErrorMap,
    cancellation_maps: Vec<ErrorMap>,
}

impl Default for DynamoErrorHandler {
    fn default() -> Self {
        Self::new(ErrorMap::client_defaults())
    }
}

impl DynamoErrorHandler {
    /// A handler for top level codes only.
    pub fn new(client_map: ErrorMap) -> Self {
        Self {
            client_map,
            cancellation_maps: Vec::new(),
        }
    }

    /// A handler for a transaction: `cancellation_maps[i]` applies to item `i`.
    pub fn with_cancellation_maps(&self, cancellation_maps: Vec<ErrorMap>) -> Self {
        Self {
            client_map: self.client_map.clone(),
            cancellation_maps,
        }
    }

    /// Typed kind for `response`, if any.
    ///
    /// Cancellation reasons are paired positionally with the cancellation maps and the
    /// first reason whose map knows its code wins. When none does, the top level code is
    /// looked up in the client map.
    pub fn normalize(&self, response: &ErrorResponse) -> Option<DbError> {
        response
            .cancellation_reasons
            .iter()
            .zip(self.cancellation_maps.iter())
            .find_map(|(reason, map)| reason.code.as_deref().and_then(|code| map.get(code)))
            .or_else(|| {
                response
                    .code
                    .as_deref()
                    .and_then(|code| self.client_map.get(code))
            })
            .cloned()
    }

    /// Maps the error of an SDK call, logging the raw response.
    pub fn map_error<E, R>(&self, error: SdkError<E, R>, context: String) -> Error
    where
        E: ProvideErrorMetadata + ProvideCancellationReasons,
        DynamoError: From<SdkError<E, R>>,
    {
        let response = ErrorResponse::from_sdk_error(&error);
        error!(
            context = %context,
            code = ?response.code,
            message = ?response.message,
            reasons = ?response.cancellation_reasons,
            "dynamo db error"
        );
        match self.normalize(&response) {
            Some(db_error) => Error::Db(db_error, context),
            None => Error::Dynamo(error.into(), context),
        }
    }

    /// Passes `Ok` through and maps `Err` with [`DynamoErrorHandler::map_error`].
    pub fn handle<T, E, R>(
        &self,
        result: Result<T, SdkError<E, R>>,
        context: impl FnOnce() -> String,
    ) -> Result<T, Error>
    where
        E: ProvideErrorMetadata + ProvideCancellationReasons,
        DynamoError: From<SdkError<E, R>>,
    {
        result.map_err(|e| self.map_error(e, context()))
    }
}
