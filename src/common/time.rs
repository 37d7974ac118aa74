// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

/// Number of seconds in a day.
pub const SECONDS_IN_DAY: i64 = 86_400;

/// Default time to live of a stored entity (180 days).
pub const DEFAULT_EXPIRES_IN_SECONDS: i64 = 180 * SECONDS_IN_DAY;

/// Formats `dt` as ISO 8601 with second precision, e.g. `2003-09-05T15:33:28+00:00`.
pub fn to_iso_8601(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// The current time as ISO 8601 with second precision.
pub fn now_iso_8601() -> String {
    to_iso_8601(Utc::now())
}

/// Unix timestamp (seconds) `expire_in_seconds` after `now`, or `None` if the
/// entity never expires.
pub fn expire_at(now: DateTime<Utc>, expire_in_seconds: Option<i64>) -> Option<i64> {
    let seconds = expire_in_seconds?;
    let delta = TimeDelta::try_seconds(seconds)?;
    now.checked_add_signed(delta).map(|dt| dt.timestamp())
}
