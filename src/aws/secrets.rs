// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::{secret_name, SecretsManagerClient};
use crate::common::{Error, KitConfig};
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use tokio::sync::OnceCell;
use tracing::debug;

/// Key-value secrets stored as one JSON `SecretString`, fetched once and cached.
#[derive(Debug)]
pub struct SecretsManager {
    client: SecretsManagerClient,
    secret_name: String,
    cache: OnceCell<HashMap<String, String>>,
}

impl SecretsManager {
    /// Reads the keys of secret `secret_name`.
    pub fn new(client: SecretsManagerClient, secret_name: impl Into<String>) -> Self {
        Self {
            client,
            secret_name: secret_name.into(),
            cache: OnceCell::new(),
        }
    }

    /// Takes the secret name from `AWS_SECRET_NAME` or `aws.secret_name`.
    pub fn from_config(client: SecretsManagerClient, config: &KitConfig) -> Result<Self, Error> {
        Ok(Self::new(client, secret_name(config)?))
    }

    /// Value of `name`: the environment variable if set, otherwise the key of the secret.
    pub async fn get_secret(&self, name: &str) -> Result<String, Error> {
        if let Ok(value) = env::var(name) {
            if !value.is_empty() {
                return Ok(value);
            }
        }
        let secrets = self.cache.get_or_try_init(|| self.fetch()).await?;
        secrets
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Secret(format!("{name} not found")))
    }

    async fn fetch(&self) -> Result<HashMap<String, String>, Error> {
        let secret_name = &self.secret_name;
        debug!("fetching secret {secret_name}");
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_name)
            .send()
            .await
            .map_err(|e| Error::Anyhow(e.into(), format!("get_secret_value({secret_name})")))?;
        let secret_string = output
            .secret_string()
            .ok_or_else(|| Error::Secret(format!("{secret_name}: no SecretString")))?;
        parse_secret_string(secret_string)
            .map_err(|e| Error::Secret(format!("{secret_name}: {e}")))
    }
}

/// Flattens a JSON object; non-string values keep their JSON text.
pub(crate) fn parse_secret_string(
    secret_string: &str,
) -> Result<HashMap<String, String>, serde_json::Error> {
    let values: HashMap<String, Value> = serde_json::from_str(secret_string)?;
    Ok(values
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => (key, s),
            other => (key, other.to_string()),
        })
        .collect())
}
