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

//! Per-executor failure summary assembled by the outer scheduler while a
//! single task set is still running. Throwaway: it is folded into the
//! executor's [`super::failure_list::ExecutorFailureList`] once the task set
//! finishes successfully and then dropped.

use super::ids::NodeId;
use std::collections::HashMap;

/// Failures observed for one executor during one task set.
#[derive(Debug, Clone)]
pub struct ExecutorFailuresInTaskSet {
    node: NodeId,
    task_to_failure_count_and_expiry: HashMap<u32, (u32, i64)>,
}

impl ExecutorFailuresInTaskSet {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            task_to_failure_count_and_expiry: HashMap::new(),
        }
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    /// Records a failure for `task_index`, bumping its count and setting its
    /// stored expiry to `failure_expiry_time`.
    ///
    /// # Panics
    ///
    /// Panics if `failure_expiry_time` is strictly less than any previously
    /// recorded expiry for this task index: callers must present
    /// non-decreasing expiry times for the same task, and a violation is a
    /// bug in the caller rather than a recoverable runtime condition.
    pub fn update_with_failure(&mut self, task_index: u32, failure_expiry_time: i64) {
        let entry = self
            .task_to_failure_count_and_expiry
            .entry(task_index)
            .or_insert((0, failure_expiry_time));

        assert!(
            failure_expiry_time >= entry.1,
            "non-monotonic failure expiry time for task index {}: new {} < previous {}",
            task_index,
            failure_expiry_time,
            entry.1
        );

        entry.0 += 1;
        entry.1 = failure_expiry_time;
    }

    pub fn num_unique_tasks_with_failures(&self) -> usize {
        self.task_to_failure_count_and_expiry.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, i64)> + '_ {
        self.task_to_failure_count_and_expiry
            .iter()
            .map(|(&task_index, &(count, expiry))| (task_index, count, expiry))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counts_failures_per_task_index() {
        let mut failures = ExecutorFailuresInTaskSet::new(NodeId::from("node-1"));
        failures.update_with_failure(0, 10);
        failures.update_with_failure(0, 10);
        failures.update_with_failure(1, 20);

        assert_eq!(failures.num_unique_tasks_with_failures(), 2);
        let entries: HashMap<u32, (u32, i64)> = failures
            .iter()
            .map(|(idx, count, expiry)| (idx, (count, expiry)))
            .collect();
        assert_eq!(entries[&0], (2, 10));
        assert_eq!(entries[&1], (1, 20));
    }

    #[test]
    #[should_panic(expected = "non-monotonic")]
    fn rejects_non_monotonic_expiry() {
        let mut failures = ExecutorFailuresInTaskSet::new(NodeId::from("node-1"));
        failures.update_with_failure(0, 10);
        failures.update_with_failure(0, 5);
    }
}
