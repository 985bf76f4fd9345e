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

//! Holds the unexpired failures attributed to one executor across
//! *successful* task sets. Kept small: executors that accumulate enough
//! failures are promoted to blacklisted and this structure is dropped for
//! them, so there is no need to optimize beyond a sorted `Vec`.

use super::ids::TaskId;
use super::task_set::ExecutorFailuresInTaskSet;

/// Failures are kept sorted ascending by expiry time. Ties are broken by
/// insertion order (Rust's `sort_by_key` is stable), matching the source's
/// stable-sort behavior.
#[derive(Debug, Clone, Default)]
pub struct ExecutorFailureList {
    failures: Vec<(TaskId, i64)>,
}

impl ExecutorFailureList {
    pub fn new() -> Self {
        Self {
            failures: Vec::new(),
        }
    }

    /// Merges the failures observed in one finished task set into this list,
    /// then re-sorts the whole sequence by expiry time ascending. New
    /// failures may interleave with old ones by wall-time, so a full re-sort
    /// is required to keep `min_expiry_time` and
    /// `drop_failures_with_timeout_before` correct.
    ///
    /// Distinct `TaskId`s are not deduplicated across calls: callers must
    /// ensure each task set is submitted at most once.
    pub fn add_failures(
        &mut self,
        stage_id: u32,
        stage_attempt_id: u32,
        failures_in_task_set: &ExecutorFailuresInTaskSet,
    ) {
        for (task_index, _count, expiry_time) in failures_in_task_set.iter() {
            let task_id = TaskId::new(stage_id, stage_attempt_id, task_index);
            self.failures.push((task_id, expiry_time));
        }

        if !self.failures.is_empty() {
            self.failures.sort_by_key(|(_, expiry)| *expiry);
        }
    }

    /// The earliest expiry time currently tracked, or `None` if this list is
    /// empty. Exposed as an optional value rather than an unchecked read of
    /// the first element, per the non-emptiness guard the source lacked.
    pub fn min_expiry_time(&self) -> Option<i64> {
        self.failures.first().map(|(_, expiry)| *expiry)
    }

    pub fn num_unique_task_failures(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Drops every entry whose expiry time is strictly before `drop_before`.
    /// No-op if the list is already empty or its minimum is at or after the
    /// cutoff.
    pub fn drop_failures_with_timeout_before(&mut self, drop_before: i64) {
        match self.min_expiry_time() {
            Some(min) if min < drop_before => {
                let first_retained = self
                    .failures
                    .partition_point(|(_, expiry)| *expiry < drop_before);
                self.failures.drain(0..first_retained);
            }
            _ => {}
        }
    }

    #[cfg(test)]
    pub(crate) fn expiry_times(&self) -> Vec<i64> {
        self.failures.iter().map(|(_, expiry)| *expiry).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::state::blacklist::ids::NodeId;

    fn task_set(node: &str, failures: &[(u32, i64)]) -> ExecutorFailuresInTaskSet {
        let mut set = ExecutorFailuresInTaskSet::new(NodeId::from(node));
        for (idx, expiry) in failures {
            set.update_with_failure(*idx, *expiry);
        }
        set
    }

    #[test]
    fn merges_and_sorts_by_expiry() {
        let mut list = ExecutorFailureList::new();
        list.add_failures(0, 0, &task_set("n", &[(0, 20)]));
        list.add_failures(1, 0, &task_set("n", &[(0, 10)]));

        assert_eq!(list.expiry_times(), vec![10, 20]);
        assert_eq!(list.min_expiry_time(), Some(10));
        assert_eq!(list.num_unique_task_failures(), 2);
    }

    #[test]
    fn drop_before_cutoff_retains_suffix() {
        let mut list = ExecutorFailureList::new();
        list.add_failures(0, 0, &task_set("n", &[(0, 10), (1, 20), (2, 30)]));

        list.drop_failures_with_timeout_before(25);
        assert_eq!(list.expiry_times(), vec![30]);
    }

    #[test]
    fn drop_before_cutoff_empties_when_all_expired() {
        let mut list = ExecutorFailureList::new();
        list.add_failures(0, 0, &task_set("n", &[(0, 10), (1, 20)]));

        list.drop_failures_with_timeout_before(100);
        assert!(list.is_empty());
        assert_eq!(list.min_expiry_time(), None);
    }

    #[test]
    fn drop_before_is_noop_when_min_not_yet_expired() {
        let mut list = ExecutorFailureList::new();
        list.add_failures(0, 0, &task_set("n", &[(0, 10), (1, 20)]));

        list.drop_failures_with_timeout_before(5);
        assert_eq!(list.expiry_times(), vec![10, 20]);
    }

    #[test]
    fn drop_before_is_noop_on_empty_list() {
        let mut list = ExecutorFailureList::new();
        list.drop_failures_with_timeout_before(100);
        assert!(list.is_empty());
    }
}
