// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::{
    entity_key, update_ddb_item, AttributeValuesExt, DynamoDbClient, DynamoErrorHandler,
    UpdateField,
};
use crate::common::{expire_at, to_iso_8601, Error, DEFAULT_EXPIRES_IN_SECONDS};
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::mem;

/// Entity type of a session item.
pub const SESSION_TYPE: &str = "SESSION";

/// Stored HTTP session: the cookies of one client, keyed by session id.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Session {
    /// Partition key, `SESSION#<id>`.
    pub pk: String,
    /// Sort key, same as `pk`.
    pub sk: String,
    /// Entity type, `SESSION`.
    pub ty: String,
    /// Session id.
    pub session_id: String,
    /// Base64 serialized cookie jar.
    pub base64_cookies: Option<Vec<u8>>,
    /// ISO 8601 creation time.
    pub created_at: Option<String>,
    /// Creator.
    pub created_by: Option<String>,
    /// ISO 8601 time of the last update.
    pub modified_at: Option<String>,
    /// Last updater.
    pub modified_by: Option<String>,
    /// Unix time after which Dynamo DB may delete the item.
    pub expires_at: Option<i64>,
}

#[derive(Serialize)]
struct SessionKey<'a> {
    #[serde(rename = "PK")]
    pk: &'a str,
    #[serde(rename = "SK")]
    sk: &'a str,
}

impl Session {
    /// Partition (and sort) key of session `session_id`.
    pub fn key(session_id: &str) -> String {
        entity_key(SESSION_TYPE, session_id)
    }

    /// Reads a (possibly projected) session item. Only `PK` is required.
    pub fn from_item(item: &HashMap<String, AttributeValue>) -> Result<Self, Error> {
        let pk = item
            .get_s("PK")
            .ok_or_else(|| Error::String("session item without PK".to_string()))?
            .to_string();
        let session_id = match item.get_s("SessionId") {
            Some(session_id) => session_id.to_string(),
            None => pk
                .strip_prefix(&format!("{SESSION_TYPE}#"))
                .unwrap_or(&pk)
                .to_string(),
        };
        let string = |key: &str| item.get_s(key).map(str::to_string);
        Ok(Self {
            sk: string("SK").unwrap_or_else(|| pk.clone()),
            ty: string("Type").unwrap_or_else(|| SESSION_TYPE.to_string()),
            session_id,
            base64_cookies: item.get_b("Base64Cookies").map(<[u8]>::to_vec),
            created_at: string("CreatedAt"),
            created_by: string("CreatedBy"),
            modified_at: string("ModifiedAt"),
            modified_by: string("ModifiedBy"),
            expires_at: item.get_n("ExpiresAt"),
            pk,
        })
    }

    /// Writes the session as an item, omitting absent attributes.
    pub fn to_item(&self) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        let s = |value: &str| AttributeValue::S(value.to_string());
        item.insert("PK".to_string(), s(&self.pk));
        item.insert("SK".to_string(), s(&self.sk));
        item.insert("Type".to_string(), s(&self.ty));
        item.insert("SessionId".to_string(), s(&self.session_id));
        if let Some(cookies) = &self.base64_cookies {
            item.insert(
                "Base64Cookies".to_string(),
                AttributeValue::B(Blob::new(cookies.clone())),
            );
        }
        for (key, value) in [
            ("CreatedAt", &self.created_at),
            ("CreatedBy", &self.created_by),
            ("ModifiedAt", &self.modified_at),
            ("ModifiedBy", &self.modified_by),
        ] {
            if let Some(value) = value {
                item.insert(key.to_string(), s(value));
            }
        }
        if let Some(expires_at) = self.expires_at {
            item.insert(
                "ExpiresAt".to_string(),
                AttributeValue::N(expires_at.to_string()),
            );
        }
        item
    }
}

/// Session items in a single Dynamo DB table.
#[derive(Clone, Debug)]
pub struct SessionService {
    client: DynamoDbClient,
    table: String,
    handler: DynamoErrorHandler,
    expires_in_seconds: Option<i64>,
}

impl SessionService {
    /// Sessions in `table`, expiring [`DEFAULT_EXPIRES_IN_SECONDS`] after creation.
    pub fn new(client: DynamoDbClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            handler: DynamoErrorHandler::default(),
            expires_in_seconds: Some(DEFAULT_EXPIRES_IN_SECONDS),
        }
    }

    /// Changes the lifetime of new sessions; `None` never expires.
    pub fn expires_in(mut self, seconds: Option<i64>) -> Self {
        self.expires_in_seconds = seconds;
        self
    }

    /// Replaces the error handler.
    pub fn error_handler(mut self, handler: DynamoErrorHandler) -> Self {
        self.handler = handler;
        self
    }

    fn session_key(session_id: &str) -> String {
        Session::key(session_id)
    }

    /// Returns session `session_id`, creating it if needed. `CreatedAt` and `ExpiresAt`
    /// keep the values of the first call.
    pub async fn get_or_create_session(&self, session_id: &str) -> Result<Session, Error> {
        let now = Utc::now();
        let now_iso = to_iso_8601(now);
        let s = |value: &str| AttributeValue::S(value.to_string());
        let mut fields = vec![
            UpdateField::new("ty", "Type", s(SESSION_TYPE)),
            UpdateField::new("si", "SessionId", s(session_id)),
            UpdateField::new("ma", "ModifiedAt", s(&now_iso)),
            UpdateField::set_once("ca", "CreatedAt", s(&now_iso)),
        ];
        if let Some(expires_at) = expire_at(now, self.expires_in_seconds) {
            fields.push(UpdateField::set_once(
                "ea",
                "ExpiresAt",
                AttributeValue::N(expires_at.to_string()),
            ));
        }
        let key = Self::session_key(session_id);
        let attributes = update_ddb_item(
            &self.client,
            &self.handler,
            &self.table,
            SessionKey { pk: &key, sk: &key },
            &fields,
        )
        .await?;
        Session::from_item(&attributes)
    }

    /// Returns the key, type and cookies of session `session_id`, if it exists.
    pub async fn get_session_item(&self, session_id: &str) -> Result<Option<Session>, Error> {
        let key = Self::session_key(session_id);
        let table = &self.table;
        let mut output = self.handler.handle(
            self.client
                .get_item()
                .table_name(table)
                .key("PK", AttributeValue::S(key.clone()))
                .key("SK", AttributeValue::S(key.clone()))
                .projection_expression("#pk, #bc, #tp")
                .expression_attribute_names("#pk", "PK")
                .expression_attribute_names("#bc", "Base64Cookies")
                .expression_attribute_names("#tp", "Type")
                .send()
                .await,
            || format!("get_session_item(t={table}, k={key})"),
        )?;
        mem::take(&mut output.item)
            .map(|item| Session::from_item(&item))
            .transpose()
    }

    /// Writes session `session_id` with `b64_cookies`, replacing any stored session.
    /// The written session has no `ExpiresAt`, so it never expires.
    pub async fn put_session_item(
        &self,
        session_id: &str,
        b64_cookies: Vec<u8>,
    ) -> Result<Session, Error> {
        let now = Utc::now();
        let now_iso = to_iso_8601(now);
        let key = Self::session_key(session_id);
        let session = Session {
            pk: key.clone(),
            sk: key,
            ty: SESSION_TYPE.to_string(),
            session_id: session_id.to_string(),
            base64_cookies: Some(b64_cookies),
            created_at: Some(now_iso.clone()),
            modified_at: Some(now_iso),
            expires_at: None,
            ..Default::default()
        };
        let table = &self.table;
        self.handler.handle(
            self.client
                .put_item()
                .table_name(table)
                .set_item(Some(session.to_item()))
                .send()
                .await,
            || format!("put_session_item(t={table}, k={})", session.pk),
        )?;
        Ok(session)
    }

    /// Stores `b64_cookies` in session `session_id` and returns the updated session.
    pub async fn update_session_cookies(
        &self,
        session_id: &str,
        b64_cookies: Vec<u8>,
    ) -> Result<Session, Error> {
        let key = Self::session_key(session_id);
        let fields = [
            UpdateField::new("b64", "Base64Cookies", AttributeValue::B(Blob::new(b64_cookies))),
            UpdateField::new(
                "mda",
                "ModifiedAt",
                AttributeValue::S(to_iso_8601(Utc::now())),
            ),
        ];
        let attributes = update_ddb_item(
            &self.client,
            &self.handler,
            &self.table,
            SessionKey { pk: &key, sk: &key },
            &fields,
        )
        .await?;
        Session::from_item(&attributes)
    }
}

#[cfg(feature = "http")]
#[async_trait::async_trait]
impl crate::http::SessionStore for SessionService {
    async fn read_session(&self, session_id: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.get_or_create_session(session_id).await?.base64_cookies)
    }

    async fn write_session(&self, session_id: &str, b64_cookies: Vec<u8>) -> Result<(), Error> {
        self.update_session_cookies(session_id, b64_cookies).await?;
        Ok(())
    }
}
