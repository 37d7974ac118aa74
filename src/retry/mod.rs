// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

/// Backoff policy and the retry loop.
mod policy;

pub use self::policy::{retry, RetryPolicy};
