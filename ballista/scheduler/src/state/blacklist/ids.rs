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

//! Identifiers used throughout the blacklist tracker.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutorId(pub String);

impl From<&str> for ExecutorId {
    fn from(s: &str) -> Self {
        ExecutorId(s.to_string())
    }
}

impl From<String> for ExecutorId {
    fn from(s: String) -> Self {
        ExecutorId(s)
    }
}

impl fmt::Display for ExecutorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Uniquely identifies a single task failure event: `(stage, stage attempt,
/// task index)`. Distinct stage attempts of the same stage are distinct
/// tasks for blacklisting purposes, since a failure in a superseded attempt
/// should not be conflated with one in the attempt that is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    pub stage_id: u32,
    pub stage_attempt_id: u32,
    pub task_index: u32,
}

impl TaskId {
    pub fn new(stage_id: u32, stage_attempt_id: u32, task_index: u32) -> Self {
        Self {
            stage_id,
            stage_attempt_id,
            task_index,
        }
    }
}
