// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! A small key/value configuration surface, plus the handful of parsing
//! helpers every config-reading component in the scheduler needs. This is
//! deliberately not a general config-loading framework: it is read once at
//! construction time and never watched for changes.

use crate::error::{BallistaError, Result};
use std::collections::HashMap;

/// A source of configuration values, addressed by key. Implementors are free
/// to back this with environment variables, a properties file, or (in tests)
/// a plain map.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// The simplest possible [`ConfigSource`], backed by an in-memory map. Used
/// pervasively by tests, and a perfectly reasonable production choice when
/// configuration is assembled programmatically.
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource(HashMap<String, String>);

impl MapConfigSource {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Parses a boolean config value. Accepts the usual `true`/`false` spellings
/// case-insensitively; anything else is a parse error.
pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(BallistaError::ConfigParse {
            key: key.to_string(),
            reason: format!("expected 'true' or 'false', got '{}'", other),
        }),
    }
}

/// Parses a duration string into milliseconds. Accepts a bare integer
/// (interpreted as milliseconds) or `<integer><suffix>` where suffix is one
/// of `ms`, `s`, `m`, `h`, `d`.
pub fn parse_duration_ms(key: &str, value: &str) -> Result<i64> {
    let value = value.trim();

    let parse_error = || BallistaError::ConfigParse {
        key: key.to_string(),
        reason: format!("'{}' is not a valid duration (expected e.g. '1h', '30m', '500ms', or a bare millisecond count)", value),
    };

    let (number_part, unit_multiplier_ms) = if let Some(stripped) = value.strip_suffix("ms") {
        (stripped, 1)
    } else if let Some(stripped) = value.strip_suffix('s') {
        (stripped, 1_000)
    } else if let Some(stripped) = value.strip_suffix('m') {
        (stripped, 60_000)
    } else if let Some(stripped) = value.strip_suffix('h') {
        (stripped, 3_600_000)
    } else if let Some(stripped) = value.strip_suffix('d') {
        (stripped, 86_400_000)
    } else {
        (value, 1)
    };

    let number: i64 = number_part
        .trim()
        .parse()
        .map_err(|_| parse_error())?;

    number
        .checked_mul(unit_multiplier_ms)
        .ok_or_else(parse_error)
}
