// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::SsmClient;
use crate::common::Error;
use aws_sdk_ssm::error::ProvideErrorMetadata;
use std::collections::HashMap;
use std::env;
use std::sync::Mutex;

/// SSM parameters, decrypted and cached per name.
#[derive(Debug)]
pub struct ParameterStore {
    client: SsmClient,
    cache: Mutex<HashMap<String, String>>,
}

impl ParameterStore {
    /// Wraps `client`.
    pub fn new(client: SsmClient) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, name: &str) -> Option<String> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }

    /// Value of `name`: the environment variable if set, otherwise the parameter.
    pub async fn get_secret(&self, name: &str) -> Result<String, Error> {
        if let Ok(value) = env::var(name) {
            if !value.is_empty() {
                return Ok(value);
            }
        }
        if let Some(value) = self.cached(name) {
            return Ok(value);
        }

        let output = match self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                if e.as_service_error().and_then(|e| e.code()) == Some("ParameterNotFound") {
                    return Err(Error::Secret(format!("{name} not found")));
                }
                return Err(Error::Anyhow(e.into(), format!("get_parameter({name})")));
            }
        };
        let value = output
            .parameter()
            .and_then(|parameter| parameter.value())
            .ok_or_else(|| Error::Secret(format!("{name} has no value")))?
            .to_string();
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.to_string(), value.clone());
        Ok(value)
    }
}
