// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

use super::{DynamoDbClient, DynamoErrorHandler, ErrorMap};
use crate::common::Error;
use crate::retry::RetryPolicy;
use aws_sdk_dynamodb::types::{
    AttributeValue, PutRequest, ReturnValue, TransactWriteItem, WriteRequest,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::mem;
use tracing::warn;

/// Items per `BatchWriteItem` request, the Dynamo DB limit.
pub const BATCH_WRITE_LIMIT: usize = 25;

/// Key of an entity of type `ty`, e.g. `SESSION#1234`.
pub fn entity_key(ty: &str, id: &str) -> String {
    format!("{ty}#{id}")
}

/// Packs a Dynamo DB `AttributeValue`.
pub fn to_dynamo_av<T: Serialize>(value: T) -> Result<AttributeValue, Error> {
    serde_dynamo::to_attribute_value(value).map_err(Error::Serde)
}

/// Packs a Dynamo DB item.
pub fn to_dynamo_item<T: Serialize>(value: T) -> Result<HashMap<String, AttributeValue>, Error> {
    serde_dynamo::to_item(value).map_err(Error::Serde)
}

/// One attribute of an update expression.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateField {
    /// Placeholder used for both `#alias` and `:alias`.
    pub alias: String,
    /// Attribute name.
    pub attr: String,
    /// New value.
    pub value: AttributeValue,
    /// Only written if the attribute does not exist yet.
    pub set_once: bool,
}

impl UpdateField {
    /// A field that is always written.
    pub fn new(alias: &str, attr: &str, value: AttributeValue) -> Self {
        Self {
            alias: alias.to_string(),
            attr: attr.to_string(),
            value,
            set_once: false,
        }
    }

    /// A field that keeps its first value, via `if_not_exists`.
    pub fn set_once(alias: &str, attr: &str, value: AttributeValue) -> Self {
        Self {
            set_once: true,
            ..Self::new(alias, attr, value)
        }
    }
}

/// `SET` expression for `fields`: plain fields first, then set-once fields, each group in
/// the given order.
///
/// # Example
///
/// `SET #gh = :gh, #ab = if_not_exists(#ab, :ab)`
pub fn build_update_expression(fields: &[UpdateField]) -> String {
    let plain = fields
        .iter()
        .filter(|f| !f.set_once)
        .map(|f| format!("#{0} = :{0}", f.alias));
    let once = fields
        .iter()
        .filter(|f| f.set_once)
        .map(|f| format!("#{0} = if_not_exists(#{0}, :{0})", f.alias));
    format!("SET {}", plain.chain(once).collect::<Vec<_>>().join(", "))
}

/// Gets the item with `key` (hash and, if any, range attributes), if any.
pub async fn get_ddb_item<K: Serialize, O: DeserializeOwned>(
    client: &DynamoDbClient,
    handler: &DynamoErrorHandler,
    table: &str,
    key: K,
) -> Result<Option<O>, Error> {
    let mut output = handler.handle(
        client
            .get_item()
            .consistent_read(true)
            .table_name(table)
            .set_key(Some(to_dynamo_item(key)?))
            .send()
            .await,
        || format!("get_item(t={table})"),
    )?;

    match mem::take(&mut output.item) {
        Some(item) => serde_dynamo::from_item(item).map(Some).map_err(Error::Serde),
        None => Ok(None),
    }
}

/// Puts an item, replacing any item with the same key.
pub async fn put_ddb_item<I: Serialize>(
    client: &DynamoDbClient,
    handler: &DynamoErrorHandler,
    table: &str,
    item: I,
) -> Result<(), Error> {
    handler.handle(
        client
            .put_item()
            .table_name(table)
            .set_item(Some(to_dynamo_item(item)?))
            .send()
            .await,
        || format!("put_item(t={table})"),
    )?;
    Ok(())
}

/// Creates an item only if its hash key does not exist, so a collision is
/// `DbError::ConditionCheckFailed`.
pub async fn create_ddb_item<I: Serialize>(
    client: &DynamoDbClient,
    handler: &DynamoErrorHandler,
    table: &str,
    item: I,
    hash_name: &str,
) -> Result<(), Error> {
    handler.handle(
        client
            .put_item()
            .table_name(table)
            .expression_attribute_names("#hn", hash_name)
            .condition_expression("attribute_not_exists(#hn)")
            .set_item(Some(to_dynamo_item(item)?))
            .send()
            .await,
        || format!("create_item(t={table}, h={hash_name})"),
    )?;
    Ok(())
}

/// Deletes the item with `key`, if any.
pub async fn delete_ddb_item<K: Serialize>(
    client: &DynamoDbClient,
    handler: &DynamoErrorHandler,
    table: &str,
    key: K,
) -> Result<(), Error> {
    handler.handle(
        client
            .delete_item()
            .table_name(table)
            .set_key(Some(to_dynamo_item(key)?))
            .send()
            .await,
        || format!("delete_item(t={table})"),
    )?;
    Ok(())
}

/// Applies `fields` to the item with `key`, creating it if needed, and returns every
/// attribute of the updated item.
pub async fn update_ddb_item<K: Serialize>(
    client: &DynamoDbClient,
    handler: &DynamoErrorHandler,
    table: &str,
    key: K,
    fields: &[UpdateField],
) -> Result<HashMap<String, AttributeValue>, Error> {
    let mut request = client
        .update_item()
        .table_name(table)
        .set_key(Some(to_dynamo_item(key)?))
        .update_expression(build_update_expression(fields))
        .return_values(ReturnValue::AllNew);
    for field in fields {
        request = request
            .expression_attribute_names(format!("#{}", field.alias), &field.attr)
            .expression_attribute_values(format!(":{}", field.alias), field.value.clone());
    }
    let mut output = handler.handle(request.send().await, || {
        format!("update_item(t={table})")
    })?;
    Ok(mem::take(&mut output.attributes).unwrap_or_default())
}

/// Query and return every item whose hash key is `hash_value`, following pagination.
/// Items that do not deserialize are skipped if `ignore_corrupt`.
pub async fn query_ddb<HK: Serialize, O: DeserializeOwned>(
    client: &DynamoDbClient,
    handler: &DynamoErrorHandler,
    table: &str,
    hash_name: &str,
    hash_value: HK,
    ignore_corrupt: bool,
) -> Result<Vec<O>, Error> {
    let hash_ser = to_dynamo_av(hash_value)?;

    let mut ret = Vec::new();
    let mut last_evaluated_key = None;
    loop {
        let output = handler.handle(
            client
                .query()
                .consistent_read(true)
                .table_name(table)
                .key_condition_expression("#h = :hv")
                .expression_attribute_names("#h", hash_name)
                .expression_attribute_values(":hv", hash_ser.clone())
                .set_exclusive_start_key(last_evaluated_key)
                .send()
                .await,
            || format!("query(t={table}, h={hash_name})"),
        )?;

        for item in output.items.unwrap_or_default() {
            match serde_dynamo::from_item(item) {
                Ok(de) => ret.push(de),
                Err(e) if ignore_corrupt => warn!("query(t={table}): skipping item: {e}"),
                Err(e) => return Err(Error::Serde(e)),
            }
        }

        last_evaluated_key = output.last_evaluated_key;
        if last_evaluated_key.is_none() {
            break;
        }
    }

    Ok(ret)
}

/// Writes `items` in one transaction. When it is cancelled, the reason of item `i` is
/// looked up in `cancellation_maps[i]`.
pub async fn transact_write_ddb_items(
    client: &DynamoDbClient,
    handler: &DynamoErrorHandler,
    items: Vec<TransactWriteItem>,
    cancellation_maps: Vec<ErrorMap>,
) -> Result<(), Error> {
    let count = items.len();
    handler.with_cancellation_maps(cancellation_maps).handle(
        client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await,
        || format!("transact_write_items(n={count})"),
    )?;
    Ok(())
}

/// Puts `items` in batches of [`BATCH_WRITE_LIMIT`], resubmitting unprocessed items with
/// backoff until `policy` runs out of tries.
pub async fn batch_write_ddb_items<I: Serialize>(
    client: &DynamoDbClient,
    handler: &DynamoErrorHandler,
    table: &str,
    items: Vec<I>,
    policy: &RetryPolicy,
) -> Result<(), Error> {
    let mut requests = Vec::with_capacity(items.len());
    for item in items {
        let put = PutRequest::builder()
            .set_item(Some(to_dynamo_item(item)?))
            .build()
            .map_err(|e| Error::String(format!("batch_write_item(t={table}): {e}")))?;
        requests.push(WriteRequest::builder().put_request(put).build());
    }

    let tries = policy.tries.max(1);
    for chunk in requests.chunks(BATCH_WRITE_LIMIT) {
        let mut pending = chunk.to_vec();
        let mut attempt = 1;
        loop {
            let mut output = handler.handle(
                client
                    .batch_write_item()
                    .request_items(table, pending)
                    .send()
                    .await,
                || format!("batch_write_item(t={table})"),
            )?;
            pending = output
                .unprocessed_items
                .as_mut()
                .and_then(|unprocessed| unprocessed.remove(table))
                .unwrap_or_default();
            if pending.is_empty() {
                break;
            }
            if attempt >= tries {
                return Err(Error::String(format!(
                    "batch_write_item(t={table}): {} items unprocessed",
                    pending.len()
                )));
            }
            let delay = policy.delay_for(attempt, &mut rand::thread_rng());
            warn!(
                attempt,
                unprocessed = pending.len(),
                "batch_write_item(t={table}): retrying unprocessed items"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
    Ok(())
}
