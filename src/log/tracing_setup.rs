// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::common::Error;
use tracing_subscriber::EnvFilter;

/// Level used when neither `RUST_LOG` nor `LOG_LEVEL` is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Filter directives from `RUST_LOG`, then `LOG_LEVEL`, then [`DEFAULT_LOG_LEVEL`].
/// Empty values are skipped.
pub fn env_filter_directives(lookup: impl Fn(&str) -> Option<String>) -> String {
    ["RUST_LOG", "LOG_LEVEL"]
        .into_iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// Installs a global JSON formatter filtered by [`env_filter_directives`].
///
/// Fails if the directives do not parse or a global subscriber is already set.
pub fn setup_tracing() -> Result<(), Error> {
    let directives = env_filter_directives(|key| std::env::var(key).ok());
    let filter = EnvFilter::try_new(&directives)
        .map_err(|e| Error::String(format!("invalid log filter {directives:?}: {e}")))?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::String(format!("failed to set tracing subscriber: {e}")))
}
