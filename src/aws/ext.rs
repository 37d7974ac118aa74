// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;

/// Typed reads from a Dynamo DB item.
pub trait AttributeValuesExt {
    /// String attribute `key`.
    fn get_s(&self, key: &str) -> Option<&str>;
    /// Numeric attribute `key`, if it is an integer.
    fn get_n(&self, key: &str) -> Option<i64>;
    /// Binary attribute `key`.
    fn get_b(&self, key: &str) -> Option<&[u8]>;
}

impl AttributeValuesExt for HashMap<String, AttributeValue> {
    fn get_s(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_s().ok().map(String::as_str)
    }

    fn get_n(&self, key: &str) -> Option<i64> {
        self.get(key)?.as_n().ok()?.parse().ok()
    }

    fn get_b(&self, key: &str) -> Option<&[u8]> {
        self.get(key)?.as_b().ok().map(|blob| blob.as_ref())
    }
}
