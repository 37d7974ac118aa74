// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use super::Error;
use serde::de::DeserializeOwned;
use std::env;
#[allow(deprecated)]
use std::env::home_dir;
use std::fs::read_to_string;

/// Configuration parameters for the wrappers, read from TOML with environment overrides.
#[derive(Debug, Default)]
pub struct KitConfig {
    debug_enabled: bool,
    toml: String,
}

impl KitConfig {
    /// Creates a configuration builder.
    pub fn builder() -> KitConfigBuilder {
        KitConfigBuilder {
            debug_enabled: false,
            toml: Ok(None),
        }
    }

    /// Returns `true` if debug is enabled.
    pub fn debug(&self) -> bool {
        self.debug_enabled
    }

    /// Returns configuration parameters.
    pub fn get<T: DeserializeOwned>(&self) -> Result<T, Error> {
        toml::from_str(&self.toml).map_err(|e: toml::de::Error| Error::String(format!("toml: {e}")))
    }

    /// Returns the environment variable `key` if set, otherwise the value found by `lookup`
    /// in the TOML configuration.
    pub fn env_or<T: DeserializeOwned>(
        &self,
        key: &str,
        lookup: impl FnOnce(T) -> Option<String>,
    ) -> Option<String> {
        match env::var(key) {
            Ok(value) if !value.is_empty() => Some(value),
            _ => self.get::<T>().ok().and_then(lookup),
        }
    }
}

/// Builder for `KitConfig`; the first TOML source that succeeds wins.
pub struct KitConfigBuilder {
    debug_enabled: bool,
    toml: Result<Option<String>, Error>,
}

impl KitConfigBuilder {
    /// Finishes the configuration.
    pub fn build(self) -> Result<KitConfig, Error> {
        match self.toml? {
            Some(toml) => Ok(KitConfig {
                debug_enabled: self.debug_enabled,
                toml,
            }),
            None => Err(Error::String("config not set".to_string())),
        }
    }

    /// Enables or disables debug output.
    pub fn debug(mut self, debug_enabled: bool) -> Self {
        self.debug_enabled = debug_enabled;
        self
    }

    /// Uses an empty configuration, so only the environment applies.
    pub fn env_only(self) -> Self {
        self.toml_string(String::new())
    }

    /// Reads `file_name` from the home directory, falling back to the current directory.
    pub fn toml_file(mut self, file_name: &str) -> Self {
        #[allow(deprecated)]
        let home_path = home_dir()
            .and_then(|pathbuf| pathbuf.to_str().map(|path| format!("{path}/{file_name}")));
        let local_path = format!("./{file_name}");
        self.toml = match home_path.and_then(|path| read_to_string(path).ok()) {
            Some(s) => Ok(Some(s)),
            None => read_to_string(&local_path)
                .map(Some)
                .map_err(|_| Error::String(format!("{local_path}: cannot read"))),
        };
        self
    }

    /// Uses `toml` as the configuration.
    pub fn toml_str(self, toml: &str) -> Self {
        self.toml_string(toml.to_string())
    }

    /// Uses `toml` as the configuration.
    pub fn toml_string(mut self, toml: String) -> Self {
        self.toml = Ok(Some(toml));
        self
    }
}
