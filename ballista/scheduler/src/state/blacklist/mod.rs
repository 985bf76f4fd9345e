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

//! The executor/node failure blacklist: time-bounded per-executor failure
//! retention, promotion to blacklisted, node-level aggregation, the periodic
//! expiry sweep, and a lock-free snapshot of the node blacklist consumed by
//! the resource-negotiation path.

mod failure_list;
mod ids;
mod task_set;
mod tracker;

pub use failure_list::ExecutorFailureList;
pub use ids::{ExecutorId, NodeId, TaskId};
pub use task_set::ExecutorFailuresInTaskSet;
pub use tracker::{BlacklistConfig, BlacklistTracker, BlacklistedExecutor};
