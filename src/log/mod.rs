// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

/// Structured logging setup.
mod tracing_setup;

pub use self::tracing_setup::{env_filter_directives, setup_tracing, DEFAULT_LOG_LEVEL};
