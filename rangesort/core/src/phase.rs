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

use std::fmt::{Display, Formatter};

/// The barrier-separated stages of one sort run, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Generate,
    CreateShuffleTargets,
    Map,
    CreateResultTargets,
    Reduce,
    Cleanup,
    Verify,
    DeleteResults,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Generate => "generate",
            Phase::CreateShuffleTargets => "create-shuffle-targets",
            Phase::Map => "map",
            Phase::CreateResultTargets => "create-result-targets",
            Phase::Reduce => "reduce",
            Phase::Cleanup => "cleanup",
            Phase::Verify => "verify",
            Phase::DeleteResults => "delete-results",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
