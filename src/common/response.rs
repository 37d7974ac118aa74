// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

use super::Error;
use hyper::StatusCode;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::warn;

/// Build an AWS API Gateway proxy response.
///
/// API Gateway does not add CORS headers to proxy integrations, so they are set here.
/// If `error` is present, the body gains an `error` field of the form `"Name: message"`.
pub fn build_lambda_response(
    status: StatusCode,
    body: Option<Value>,
    error: Option<&Error>,
) -> Value {
    let body = match (body, error) {
        (body, Some(e)) => {
            let mut object = match body {
                Some(Value::Object(object)) => object,
                _ => Map::new(),
            };
            object.insert(
                "error".to_string(),
                Value::String(format!("{}: {e}", e.name())),
            );
            Value::Object(object).to_string()
        }
        (Some(Value::String(s)), None) => s,
        (Some(value), None) => value.to_string(),
        (None, None) => "{}".to_string(),
    };
    json!({
        "isBase64Encoded": false,
        "statusCode": status.as_u16(),
        "body": body,
        "headers": {
            "Content-Type": "application/json",
            "Access-Control-Allow-Credentials": true,
            "Access-Control-Allow-Headers": "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token",
            "Access-Control-Allow-Origin": "*",
            "Access-Control-Allow-Methods": "DELETE,GET,POST,PUT",
        },
    })
}

/// Convert the result of a handler into an API Gateway response: `200` with the
/// serialized value, or `400` carrying the error.
pub fn lambda_response<T: Serialize>(result: Result<T, Error>) -> Value {
    match result.and_then(|value| {
        serde_json::to_value(value).map_err(|e| Error::String(format!("response JSON: {e}")))
    }) {
        Ok(value) => build_lambda_response(StatusCode::OK, Some(value), None),
        Err(e) => {
            warn!("handler failed: {e}");
            build_lambda_response(StatusCode::BAD_REQUEST, None, Some(&e))
        }
    }
}
