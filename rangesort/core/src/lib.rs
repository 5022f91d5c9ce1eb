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

#![doc = include_str!("../README.md")]

/// The current version of rangesort, derived from the Cargo package version.
pub const RANGESORT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prints the current rangesort version to stdout.
pub fn print_version() {
    println!("rangesort version: {RANGESORT_VERSION}")
}

/// Equal-width key ranges and the key to bucket lookup.
pub mod bucket;
/// Configuration options of a sort run.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Event loop infrastructure for asynchronous message processing.
pub mod event_loop;
/// Synthetic input partitions.
pub mod generator;
/// The map phase.
pub mod partitioner;
/// Pipeline phases in execution order.
pub mod phase;
/// The reduce phase.
pub mod reducer;
/// Text rows and sort key parsing.
pub mod row;
/// Map to reduce row transports.
pub mod shuffle;
/// Line-oriented storage of partitions, fragments and results.
pub mod store;
/// Sorted output checks.
pub mod verifier;
