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

//! Orchestrates the whole blacklist: accepts finished-task-set reports, runs
//! the expiry sweep, maintains the executor and node blacklists, and
//! publishes a lock-free snapshot of the node blacklist for the
//! resource-negotiation path.
//!
//! The outer scheduler is expected to hold its own lock across every call
//! into this tracker except [`BlacklistTracker::node_blacklist`], which is
//! safe to call concurrently without it. That contract is encoded here by
//! every mutator taking `&mut self` and `node_blacklist` taking `&self` and
//! touching only the lock-free `ArcSwap` snapshot.

use super::failure_list::ExecutorFailureList;
use super::ids::{ExecutorId, NodeId};
use super::task_set::ExecutorFailuresInTaskSet;
use arc_swap::ArcSwap;
use ballista_core::clock::Clock;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Tuning knobs for a [`BlacklistTracker`], read once at construction.
#[derive(Debug, Clone, Copy)]
pub struct BlacklistConfig {
    /// Failure count at which an executor is blacklisted.
    pub max_failures_per_exec: u32,
    /// Count of currently-blacklisted executors on a node at which the node
    /// itself is blacklisted.
    pub max_failed_exec_per_node: u32,
    /// Per-blacklist-entry lifetime, in milliseconds.
    pub timeout_ms: i64,
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            max_failures_per_exec: 2,
            max_failed_exec_per_node: 2,
            timeout_ms: 3_600_000,
        }
    }
}

/// A currently blacklisted executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlacklistedExecutor {
    pub node: NodeId,
    pub expiry_time: i64,
}

/// The state of one executor as far as the tracker is concerned. Collapsing
/// "has pending failures" and "is blacklisted" into one sum type (rather than
/// two separate maps) makes their disjointness structural instead of an
/// invariant every call site has to remember to preserve.
#[derive(Debug, Clone)]
enum ExecutorState {
    HasFailures(ExecutorFailureList),
    Blacklisted(BlacklistedExecutor),
}

pub struct BlacklistTracker {
    config: BlacklistConfig,
    clock: Arc<dyn Clock>,

    executor_state: HashMap<ExecutorId, ExecutorState>,
    /// Executors that have, at some point, been blacklisted while on this
    /// node with that blacklist still active at the time they were added.
    /// Used purely to count toward node-level promotion; entries are not
    /// removed when an executor is removed from the cluster (see
    /// `handle_removed_executor`).
    node_to_failed_execs: HashMap<NodeId, HashSet<ExecutorId>>,
    node_blacklist_expiry: HashMap<NodeId, i64>,
    node_blacklist_snapshot: ArcSwap<HashSet<NodeId>>,
    /// Lower bound on every expiry time currently tracked. A shortcut so
    /// `apply_blacklist_timeout` can short-circuit cheaply when nothing has
    /// expired yet.
    next_expiry_time: i64,
}

impl BlacklistTracker {
    pub fn new(config: BlacklistConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            executor_state: HashMap::new(),
            node_to_failed_execs: HashMap::new(),
            node_blacklist_expiry: HashMap::new(),
            node_blacklist_snapshot: ArcSwap::from_pointee(HashSet::new()),
            next_expiry_time: i64::MAX,
        }
    }

    /// Folds the failures observed in one successfully-completed task set
    /// into the per-executor failure lists, promoting executors (and, in
    /// turn, nodes) to blacklisted where the configured thresholds are
    /// crossed.
    ///
    /// Only tasks whose task set ultimately succeeded are reported here;
    /// permanently-failing task sets are the responsibility of the peer
    /// per-task-set blacklisting subsystem.
    pub fn update_blacklist_for_successful_task_set(
        &mut self,
        stage_id: u32,
        stage_attempt_id: u32,
        failures_by_exec: &HashMap<ExecutorId, ExecutorFailuresInTaskSet>,
    ) {
        for (exec, failures_in_task_set) in failures_by_exec {
            let node = failures_in_task_set.node().clone();

            let state = self
                .executor_state
                .entry(exec.clone())
                .or_insert_with(|| ExecutorState::HasFailures(ExecutorFailureList::new()));

            let list = match state {
                ExecutorState::HasFailures(list) => list,
                ExecutorState::Blacklisted(_) => {
                    debug!(
                        "executor {} is already blacklisted, ignoring failures reported for stage {}.{}",
                        exec, stage_id, stage_attempt_id
                    );
                    continue;
                }
            };

            list.add_failures(stage_id, stage_attempt_id, failures_in_task_set);
            let min_expiry = list.min_expiry_time();
            let new_total = list.num_unique_task_failures();

            debug!(
                "executor {} now has {} unique task failures",
                exec, new_total
            );

            if let Some(min) = min_expiry {
                self.next_expiry_time = self.next_expiry_time.min(min);
            }

            if new_total < self.config.max_failures_per_exec as usize {
                continue;
            }

            let now = self.clock.now_millis();
            let expiry_time = now + self.config.timeout_ms;

            self.executor_state.insert(
                exec.clone(),
                ExecutorState::Blacklisted(BlacklistedExecutor {
                    node: node.clone(),
                    expiry_time,
                }),
            );
            self.next_expiry_time = self.next_expiry_time.min(expiry_time);

            info!(
                "blacklisting executor {} on node {} until {}",
                exec, node, expiry_time
            );

            let failed_execs = self
                .node_to_failed_execs
                .entry(node.clone())
                .or_insert_with(HashSet::new);
            failed_execs.insert(exec.clone());

            if failed_execs.len() >= self.config.max_failed_exec_per_node as usize {
                self.node_blacklist_expiry.insert(node.clone(), expiry_time);
                self.publish_node_blacklist_snapshot();
                info!("blacklisting node {} until {}", node, expiry_time);
            }
        }
    }

    /// Cheaply short-circuits if nothing can possibly have expired yet.
    /// Otherwise drops expired failure entries and blacklist entries for
    /// both executors and nodes, and republishes the node snapshot if it
    /// changed.
    pub fn apply_blacklist_timeout(&mut self) {
        let now = self.clock.now_millis();
        if now <= self.next_expiry_time {
            return;
        }

        let start = Instant::now();

        for state in self.executor_state.values_mut() {
            if let ExecutorState::HasFailures(list) = state {
                list.drop_failures_with_timeout_before(now);
            }
        }

        let expired_execs: Vec<(ExecutorId, NodeId)> = self
            .executor_state
            .iter()
            .filter_map(|(exec, state)| match state {
                ExecutorState::Blacklisted(b) if b.expiry_time < now => {
                    Some((exec.clone(), b.node.clone()))
                }
                _ => None,
            })
            .collect();

        for (exec, node) in &expired_execs {
            self.executor_state.remove(exec);

            if let Some(failed_execs) = self.node_to_failed_execs.get_mut(node) {
                failed_execs.remove(exec);
                if failed_execs.is_empty() {
                    self.node_to_failed_execs.remove(node);
                }
            } else {
                debug_assert!(
                    false,
                    "node {} missing from node_to_failed_execs while unblacklisting executor {}",
                    node, exec
                );
            }
        }

        // Recomputed from executor expiries only: every node expiry was
        // derived from some executor's expiry at the moment of promotion, so
        // it is never earlier than the minimum executor expiry. A future
        // sweep will discover any node-only expiry on its own.
        self.next_expiry_time = self
            .executor_state
            .values()
            .filter_map(|state| match state {
                ExecutorState::Blacklisted(b) => Some(b.expiry_time),
                ExecutorState::HasFailures(_) => None,
            })
            .min()
            .unwrap_or(i64::MAX);

        let expired_nodes: Vec<NodeId> = self
            .node_blacklist_expiry
            .iter()
            .filter(|(_, &expiry)| expiry < now)
            .map(|(node, _)| node.clone())
            .collect();

        if !expired_nodes.is_empty() {
            for node in &expired_nodes {
                self.node_blacklist_expiry.remove(node);
            }
            self.publish_node_blacklist_snapshot();
        }

        debug!(
            "blacklist sweep at {} expired {} executor(s) and {} node(s) in {:?}",
            now,
            expired_execs.len(),
            expired_nodes.len(),
            start.elapsed()
        );
    }

    pub fn is_executor_blacklisted(&self, executor: &ExecutorId) -> bool {
        matches!(
            self.executor_state.get(executor),
            Some(ExecutorState::Blacklisted(_))
        )
    }

    pub fn is_node_blacklisted(&self, node: &NodeId) -> bool {
        self.node_blacklist_expiry.contains_key(node)
    }

    /// Loads the current node-blacklist snapshot. Safe to call without the
    /// outer scheduler's lock, from any thread.
    pub fn node_blacklist(&self) -> Arc<HashSet<NodeId>> {
        self.node_blacklist_snapshot.load_full()
    }

    /// Removes any pending failure list for `executor`. Deliberately leaves
    /// `executor`'s blacklist status (if any) and its node's failed-executor
    /// count untouched, so the blacklist still expires naturally and a
    /// replacement executor on the same node still counts toward node
    /// promotion.
    pub fn handle_removed_executor(&mut self, executor: &ExecutorId) {
        if let Some(ExecutorState::HasFailures(_)) = self.executor_state.get(executor) {
            self.executor_state.remove(executor);
        }
    }

    /// The lower bound on every expiry time currently tracked. Exposed for
    /// tests and monitoring; callers should not rely on it as anything more
    /// precise than a lower bound.
    pub fn next_expiry_time(&self) -> i64 {
        self.next_expiry_time
    }

    fn publish_node_blacklist_snapshot(&self) {
        let snapshot: HashSet<NodeId> = self.node_blacklist_expiry.keys().cloned().collect();
        self.node_blacklist_snapshot.store(Arc::new(snapshot));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ballista_core::clock::ManualClock;

    fn tracker(clock: Arc<ManualClock>) -> BlacklistTracker {
        BlacklistTracker::new(
            BlacklistConfig {
                max_failures_per_exec: 2,
                max_failed_exec_per_node: 2,
                timeout_ms: 10,
            },
            clock,
        )
    }

    fn failures(node: &str, task_indices: &[u32]) -> ExecutorFailuresInTaskSet {
        let mut set = ExecutorFailuresInTaskSet::new(NodeId::from(node));
        for (i, idx) in task_indices.iter().enumerate() {
            set.update_with_failure(*idx, (i as i64 + 1) * 10);
        }
        set
    }

    #[test]
    fn executor_is_blacklisted_after_reaching_threshold() {
        let clock = Arc::new(ManualClock::new(0));
        let mut t = tracker(clock.clone());

        let mut by_exec = HashMap::new();
        by_exec.insert(ExecutorId::from("A"), failures("N", &[0, 1]));
        t.update_blacklist_for_successful_task_set(0, 0, &by_exec);

        assert!(t.is_executor_blacklisted(&ExecutorId::from("A")));
        assert!(!t.is_node_blacklisted(&NodeId::from("N")));
    }

    #[test]
    fn node_is_not_blacklisted_below_executor_threshold() {
        let clock = Arc::new(ManualClock::new(0));
        let mut t = tracker(clock.clone());

        let mut by_exec = HashMap::new();
        by_exec.insert(ExecutorId::from("A"), failures("N", &[0, 1]));
        t.update_blacklist_for_successful_task_set(0, 0, &by_exec);

        assert!(t.node_blacklist().is_empty());
    }

    #[test]
    fn sweep_is_idempotent() {
        let clock = Arc::new(ManualClock::new(0));
        let mut t = tracker(clock.clone());

        let mut by_exec = HashMap::new();
        by_exec.insert(ExecutorId::from("A"), failures("N", &[0, 1]));
        t.update_blacklist_for_successful_task_set(0, 0, &by_exec);

        clock.set(100);
        t.apply_blacklist_timeout();
        let after_first = t.is_executor_blacklisted(&ExecutorId::from("A"));
        t.apply_blacklist_timeout();
        let after_second = t.is_executor_blacklisted(&ExecutorId::from("A"));

        assert_eq!(after_first, after_second);
        assert!(!after_second);
    }

    #[test]
    fn next_expiry_time_is_a_lower_bound() {
        let clock = Arc::new(ManualClock::new(0));
        let mut t = tracker(clock.clone());

        let mut by_exec = HashMap::new();
        by_exec.insert(ExecutorId::from("A"), failures("N", &[0]));
        t.update_blacklist_for_successful_task_set(0, 0, &by_exec);

        assert!(t.next_expiry_time() <= 10);
    }

    #[test]
    fn handle_removed_executor_keeps_node_failed_exec_count() {
        let clock = Arc::new(ManualClock::new(0));
        let mut t = tracker(clock.clone());

        let mut by_exec = HashMap::new();
        by_exec.insert(ExecutorId::from("A"), failures("N", &[0, 1]));
        t.update_blacklist_for_successful_task_set(0, 0, &by_exec);
        assert!(t.is_executor_blacklisted(&ExecutorId::from("A")));

        t.handle_removed_executor(&ExecutorId::from("A"));

        // Still blacklisted: handle_removed_executor must not touch blacklist status.
        assert!(t.is_executor_blacklisted(&ExecutorId::from("A")));
        assert_eq!(t.node_to_failed_execs.get(&NodeId::from("N")).unwrap().len(), 1);
    }
}
