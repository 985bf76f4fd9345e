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

//! Ballista scheduler specific configuration, including the blacklist
//! tuning knobs.

use crate::state::blacklist::BlacklistConfig;
use ballista_core::config::{parse_bool, parse_duration_ms, ConfigSource};
use ballista_core::error::Result;
use log::warn;

const CONF_BLACKLIST_ENABLED: &str = "spark.blacklist.enabled";
const CONF_MAX_FAILED_TASKS_PER_EXECUTOR: &str =
    "spark.blacklist.application.maxFailedTasksPerExecutor";
const CONF_MAX_FAILED_EXECUTORS_PER_NODE: &str =
    "spark.blacklist.application.maxFailedExecutorsPerNode";
const CONF_BLACKLIST_TIMEOUT: &str = "spark.blacklist.timeout";
const CONF_LEGACY_EXECUTOR_TASK_BLACKLIST_TIME: &str =
    "spark.scheduler.executorTaskBlacklistTime";

const DEFAULT_MAX_FAILED_TASKS_PER_EXECUTOR: u32 = 2;
const DEFAULT_MAX_FAILED_EXECUTORS_PER_NODE: u32 = 2;
const DEFAULT_BLACKLIST_TIMEOUT: &str = "1h";

/// Configurations for how the ballista scheduler schedules jobs and tasks.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// The event loop buffer size. for a system of high throughput, a larger value like 1000000 is recommended
    pub event_loop_buffer_size: u32,
    /// Whether the executor/node failure blacklist is enabled.
    pub blacklist_enabled: bool,
    /// Tuning knobs for the blacklist tracker, used only if `blacklist_enabled` is true.
    pub blacklist: BlacklistConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            event_loop_buffer_size: 10000,
            blacklist_enabled: false,
            blacklist: BlacklistConfig::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_event_loop_buffer_size(mut self, buffer_size: u32) -> Self {
        self.event_loop_buffer_size = buffer_size;
        self
    }

    pub fn with_blacklist_enabled(mut self, enabled: bool) -> Self {
        self.blacklist_enabled = enabled;
        self
    }

    pub fn with_blacklist_config(mut self, blacklist: BlacklistConfig) -> Self {
        self.blacklist = blacklist;
        self
    }

    /// Reads the blacklist-related knobs from `source` and builds a
    /// [`SchedulerConfig`] with everything else left at its default. Returns
    /// an error (rather than starting with a partially-configured tracker)
    /// if any of the values present are malformed.
    pub fn from_blacklist_config_source(source: &dyn ConfigSource) -> Result<Self> {
        let blacklist_enabled = is_blacklist_enabled(source)?;
        let max_failures_per_exec = match source.get(CONF_MAX_FAILED_TASKS_PER_EXECUTOR) {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .map_err(|_| config_parse_error(CONF_MAX_FAILED_TASKS_PER_EXECUTOR, &v))?,
            None => DEFAULT_MAX_FAILED_TASKS_PER_EXECUTOR,
        };
        let max_failed_exec_per_node = match source.get(CONF_MAX_FAILED_EXECUTORS_PER_NODE) {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .map_err(|_| config_parse_error(CONF_MAX_FAILED_EXECUTORS_PER_NODE, &v))?,
            None => DEFAULT_MAX_FAILED_EXECUTORS_PER_NODE,
        };
        let timeout_ms = get_blacklist_timeout_ms(source)?;

        Ok(Self::default()
            .with_blacklist_enabled(blacklist_enabled)
            .with_blacklist_config(BlacklistConfig {
                max_failures_per_exec,
                max_failed_exec_per_node,
                timeout_ms,
            }))
    }
}

fn config_parse_error(key: &str, value: &str) -> ballista_core::error::BallistaError {
    ballista_core::error::BallistaError::ConfigParse {
        key: key.to_string(),
        reason: format!("'{}' is not a valid integer", value),
    }
}

/// Implements the enablement policy:
///
/// 1. If `spark.blacklist.enabled` is set, parse it as a boolean; that wins.
/// 2. Else if the legacy `spark.scheduler.executorTaskBlacklistTime` is set,
///    the blacklist is enabled iff its numeric value is non-zero. A value of
///    `0` logs an explicit "turning off" diagnostic.
/// 3. Else, the blacklist is off by default.
pub fn is_blacklist_enabled(source: &dyn ConfigSource) -> Result<bool> {
    if let Some(raw) = source.get(CONF_BLACKLIST_ENABLED) {
        return parse_bool(CONF_BLACKLIST_ENABLED, &raw);
    }

    if let Some(raw) = source.get(CONF_LEGACY_EXECUTOR_TASK_BLACKLIST_TIME) {
        let legacy_ms: i64 = raw.trim().parse().map_err(|_| {
            config_parse_error(CONF_LEGACY_EXECUTOR_TASK_BLACKLIST_TIME, &raw)
        })?;

        if legacy_ms == 0 {
            warn!(
                "'{}' is set to 0, turning the blacklist off",
                CONF_LEGACY_EXECUTOR_TASK_BLACKLIST_TIME
            );
            return Ok(false);
        }

        return Ok(true);
    }

    Ok(false)
}

/// Resolves the blacklist timeout: `spark.blacklist.timeout` if present,
/// else the legacy `spark.scheduler.executorTaskBlacklistTime` (milliseconds)
/// if present, else the default of one hour.
pub fn get_blacklist_timeout_ms(source: &dyn ConfigSource) -> Result<i64> {
    if let Some(raw) = source.get(CONF_BLACKLIST_TIMEOUT) {
        return parse_duration_ms(CONF_BLACKLIST_TIMEOUT, &raw);
    }

    if let Some(raw) = source.get(CONF_LEGACY_EXECUTOR_TASK_BLACKLIST_TIME) {
        return parse_duration_ms(CONF_LEGACY_EXECUTOR_TASK_BLACKLIST_TIME, &raw);
    }

    parse_duration_ms(CONF_BLACKLIST_TIMEOUT, DEFAULT_BLACKLIST_TIMEOUT)
}

#[cfg(test)]
mod test {
    use super::*;
    use ballista_core::config::MapConfigSource;

    #[test]
    fn legacy_config_enables_with_non_zero_value() {
        let source = MapConfigSource::new()
            .with(CONF_LEGACY_EXECUTOR_TASK_BLACKLIST_TIME, "60000");

        assert!(is_blacklist_enabled(&source).unwrap());
        assert_eq!(get_blacklist_timeout_ms(&source).unwrap(), 60_000);
    }

    #[test]
    fn legacy_config_disables_with_zero_value() {
        let source = MapConfigSource::new()
            .with(CONF_LEGACY_EXECUTOR_TASK_BLACKLIST_TIME, "0");

        assert!(!is_blacklist_enabled(&source).unwrap());
    }

    #[test]
    fn explicit_disable_beats_legacy_enable() {
        let source = MapConfigSource::new()
            .with(CONF_BLACKLIST_ENABLED, "false")
            .with(CONF_LEGACY_EXECUTOR_TASK_BLACKLIST_TIME, "60000");

        assert!(!is_blacklist_enabled(&source).unwrap());
    }

    #[test]
    fn defaults_to_disabled_with_no_config() {
        let source = MapConfigSource::new();
        assert!(!is_blacklist_enabled(&source).unwrap());
        assert_eq!(get_blacklist_timeout_ms(&source).unwrap(), 3_600_000);
    }

    #[test]
    fn timeout_prefers_new_key_over_legacy() {
        let source = MapConfigSource::new()
            .with(CONF_BLACKLIST_TIMEOUT, "30m")
            .with(CONF_LEGACY_EXECUTOR_TASK_BLACKLIST_TIME, "60000");

        assert_eq!(get_blacklist_timeout_ms(&source).unwrap(), 1_800_000);
    }

    #[test]
    fn from_blacklist_config_source_uses_defaults_when_nothing_set() {
        let source = MapConfigSource::new();
        let config = SchedulerConfig::from_blacklist_config_source(&source).unwrap();

        assert!(!config.blacklist_enabled);
        assert_eq!(
            config.blacklist.max_failures_per_exec,
            DEFAULT_MAX_FAILED_TASKS_PER_EXECUTOR
        );
        assert_eq!(
            config.blacklist.max_failed_exec_per_node,
            DEFAULT_MAX_FAILED_EXECUTORS_PER_NODE
        );
        assert_eq!(config.blacklist.timeout_ms, 3_600_000);
    }

    #[test]
    fn from_blacklist_config_source_reads_custom_thresholds() {
        let source = MapConfigSource::new()
            .with(CONF_BLACKLIST_ENABLED, "true")
            .with(CONF_MAX_FAILED_TASKS_PER_EXECUTOR, "5")
            .with(CONF_MAX_FAILED_EXECUTORS_PER_NODE, "3")
            .with(CONF_BLACKLIST_TIMEOUT, "30m");
        let config = SchedulerConfig::from_blacklist_config_source(&source).unwrap();

        assert!(config.blacklist_enabled);
        assert_eq!(config.blacklist.max_failures_per_exec, 5);
        assert_eq!(config.blacklist.max_failed_exec_per_node, 3);
        assert_eq!(config.blacklist.timeout_ms, 1_800_000);
    }

    #[test]
    fn from_blacklist_config_source_rejects_malformed_max_failures_per_exec() {
        let source = MapConfigSource::new().with(CONF_MAX_FAILED_TASKS_PER_EXECUTOR, "not-a-number");

        assert!(SchedulerConfig::from_blacklist_config_source(&source).is_err());
    }

    #[test]
    fn from_blacklist_config_source_rejects_malformed_max_failed_execs_per_node() {
        let source = MapConfigSource::new().with(CONF_MAX_FAILED_EXECUTORS_PER_NODE, "not-a-number");

        assert!(SchedulerConfig::from_blacklist_config_source(&source).is_err());
    }
}
