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

//! Rangesort configuration

use std::fmt::{Display, Formatter};

use serde::Deserialize;

use crate::error::{RangeSortError, Result};

/// Which shuffle transport carries rows from mappers to reducers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Default)]
#[cfg_attr(feature = "build-binary", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum ShuffleTransportKind {
    /// One fragment file per mapper per bucket, read back as a multi-fragment container.
    #[default]
    File,
    /// One shared in-process aggregator per bucket that all mappers append to.
    Aggregator,
}

impl Display for ShuffleTransportKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ShuffleTransportKind::File => f.write_str("file"),
            ShuffleTransportKind::Aggregator => f.write_str("aggregator"),
        }
    }
}

#[cfg(feature = "build-binary")]
impl std::str::FromStr for ShuffleTransportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        clap::ValueEnum::from_str(s, true)
    }
}

// an enum used to configure the log rolling policy
#[derive(Clone, Copy, Debug, Deserialize, Default)]
#[cfg_attr(feature = "build-binary", derive(clap::ValueEnum))]
pub enum LogRotationPolicy {
    Minutely,
    Hourly,
    Daily,
    #[default]
    Never,
}

impl Display for LogRotationPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogRotationPolicy::Minutely => f.write_str("minutely"),
            LogRotationPolicy::Hourly => f.write_str("hourly"),
            LogRotationPolicy::Daily => f.write_str("daily"),
            LogRotationPolicy::Never => f.write_str("never"),
        }
    }
}

#[cfg(feature = "build-binary")]
impl std::str::FromStr for LogRotationPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        clap::ValueEnum::from_str(s, true)
    }
}

/// Settings of one sort run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    /// Number of input partitions, which is also the number of buckets.
    pub worker_count: usize,
    /// Index of the field used as sort key.
    pub sort_column: usize,
    /// Rows generated per partition, and rows expected per partition when verifying.
    pub rows_per_partition: u64,
    /// Fields generated per row.
    pub columns_per_row: usize,
    /// Store path all partition, shuffle and result names are derived from.
    pub base_path: String,
    pub transport: ShuffleTransportKind,
    /// Size of the worker pool shared by all phases. Zero means `worker_count`.
    pub concurrent_tasks: usize,
    /// Generate the input partitions before sorting.
    pub generate: bool,
    /// Check the sorted output before deleting it.
    pub verify: bool,
    /// Keep the input partitions after the sort.
    pub retain_input: bool,
    /// Keep the sorted output instead of deleting it at the end of the run.
    pub retain_output: bool,
    /// Only generate and/or delete input data, skip map and reduce.
    pub skip_sort: bool,
    /// Seed for reproducible generation, partition `i` uses `seed + i`.
    pub seed: Option<u64>,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            sort_column: 0,
            rows_per_partition: 5_000_000,
            columns_per_row: 10,
            base_path: "/sort-data".to_owned(),
            transport: ShuffleTransportKind::default(),
            concurrent_tasks: 0,
            generate: false,
            verify: true,
            retain_input: false,
            retain_output: false,
            skip_sort: false,
            seed: None,
        }
    }
}

impl SortConfig {
    pub fn new(worker_count: usize, base_path: impl Into<String>) -> Self {
        Self {
            worker_count,
            base_path: base_path.into(),
            ..Default::default()
        }
    }

    pub fn with_sort_column(mut self, sort_column: usize) -> Self {
        self.sort_column = sort_column;
        self
    }

    pub fn with_generated_data(mut self, rows_per_partition: u64, columns_per_row: usize) -> Self {
        self.generate = true;
        self.rows_per_partition = rows_per_partition;
        self.columns_per_row = columns_per_row;
        self
    }

    pub fn with_rows_per_partition(mut self, rows_per_partition: u64) -> Self {
        self.rows_per_partition = rows_per_partition;
        self
    }

    pub fn with_transport(mut self, transport: ShuffleTransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_concurrent_tasks(mut self, concurrent_tasks: usize) -> Self {
        self.concurrent_tasks = concurrent_tasks;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_retain_input(mut self, retain_input: bool) -> Self {
        self.retain_input = retain_input;
        self
    }

    pub fn with_retain_output(mut self, retain_output: bool) -> Self {
        self.retain_output = retain_output;
        self
    }

    pub fn with_skip_sort(mut self, skip_sort: bool) -> Self {
        self.skip_sort = skip_sort;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(RangeSortError::Configuration(
                "worker count must be at least 1".to_owned(),
            ));
        }
        if self.columns_per_row == 0 {
            return Err(RangeSortError::Configuration(
                "columns per row must be at least 1".to_owned(),
            ));
        }
        if self.generate && self.sort_column >= self.columns_per_row {
            return Err(RangeSortError::Configuration(format!(
                "sort column {} is out of range for {} generated columns",
                self.sort_column, self.columns_per_row
            )));
        }
        if self.base_path.trim_matches('/').is_empty() {
            return Err(RangeSortError::Configuration(
                "base path must not be empty".to_owned(),
            ));
        }
        Ok(())
    }

    /// Number of tasks the shared worker pool runs at once.
    pub fn pool_size(&self) -> usize {
        if self.concurrent_tasks == 0 {
            self.worker_count
        } else {
            self.concurrent_tasks
        }
    }

    pub fn partition_path(&self, partition: usize) -> String {
        format!("{}_part{partition}", self.base_path)
    }

    pub fn shuffle_dir(&self) -> String {
        format!("{}-redu", self.base_path)
    }

    pub fn bucket_container(&self, bucket: usize) -> String {
        format!("{}-redu/group_{bucket}", self.base_path)
    }

    pub fn result_dir(&self) -> String {
        format!("{}-result", self.base_path)
    }

    pub fn result_path(&self, bucket: usize) -> String {
        format!("{}-result/r{bucket}", self.base_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() -> Result<()> {
        let config = SortConfig::default();
        config.validate()?;
        assert_eq!(config.pool_size(), 1);
        assert_eq!(config.transport, ShuffleTransportKind::File);
        Ok(())
    }

    #[test]
    fn derived_paths() {
        let config = SortConfig::new(4, "/sort-data");
        assert_eq!(config.partition_path(2), "/sort-data_part2");
        assert_eq!(config.bucket_container(3), "/sort-data-redu/group_3");
        assert_eq!(config.result_path(0), "/sort-data-result/r0");
    }

    #[test]
    fn invalid_configs() {
        assert!(SortConfig::new(0, "/data").validate().is_err());
        assert!(SortConfig::new(2, "/").validate().is_err());
        assert!(SortConfig::new(2, "/data")
            .with_generated_data(10, 3)
            .with_sort_column(3)
            .validate()
            .is_err());
        // without generation the input may have any shape
        assert!(SortConfig::new(2, "/data")
            .with_sort_column(30)
            .validate()
            .is_ok());
    }

    #[test]
    fn explicit_pool_size() {
        let config = SortConfig::new(8, "/data").with_concurrent_tasks(3);
        assert_eq!(config.pool_size(), 3);
    }
}
