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

//! Command line configuration of the `rangesort` binary.

use rangesort_core::config::{LogRotationPolicy, ShuffleTransportKind, SortConfig};
use rangesort_core::error::RangeSortError;

/// Configuration of the application
#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[arg(
        short = 'w',
        long,
        default_value_t = 1,
        help = "Number of workers: input partitions, buckets and sorted outputs. Default: 1"
    )]
    pub workers: usize,
    #[arg(
        short = 'k',
        long,
        default_value_t = 0,
        help = "Column index to use as sort key. Default: 0"
    )]
    pub column_key: usize,
    #[arg(short = 'f', long, default_value_t = String::from("/sort-data"), help = "Base path of all partition, shuffle and result names in the store. Default: /sort-data")]
    pub file: String,
    #[arg(short = 'g', long, help = "Generate the input partitions")]
    pub generate: bool,
    #[arg(
        short = 'r',
        long,
        default_value_t = 5_000_000,
        help = "Rows per generated partition, and rows expected per partition by the check. Default: 5000000"
    )]
    pub rows: u64,
    #[arg(
        short = 'c',
        long,
        default_value_t = 10,
        help = "Columns per generated row. Default: 10"
    )]
    pub columns: usize,
    #[arg(short = 'd', long, help = "Delete the input partitions after the run")]
    pub delete: bool,
    #[arg(
        short = 'x',
        long,
        help = "Skip the sort, only generate and/or delete the input partitions"
    )]
    pub exclusive: bool,
    #[arg(short = 'z', long, help = "Skip checking the sorted output")]
    pub no_check: bool,
    #[arg(long, help = "Keep the sorted output in the store after the run")]
    pub keep_output: bool,
    #[arg(
        long,
        default_value_t = ShuffleTransportKind::File,
        help = "Shuffle transport, possible values: file, aggregator. Default: file"
    )]
    pub transport: ShuffleTransportKind,
    #[arg(
        long,
        default_value_t = 0,
        help = "Tasks running at once in every phase. Default value of 0 means one per worker"
    )]
    pub concurrent_tasks: usize,
    #[arg(long, help = "Seed for reproducible generation")]
    pub seed: Option<u64>,
    #[arg(
        long,
        default_value_t = String::from("/tmp/rangesort"),
        help = "Local directory backing the store. Default: /tmp/rangesort"
    )]
    pub work_dir: String,
    #[arg(
        long,
        help = "Log dir: a path to save log. This will create a new storage directory at the specified path if it does not already exist."
    )]
    pub log_dir: Option<String>,
    #[arg(
        long,
        default_value_t = false,
        help = "Enable print thread ids and names in log file."
    )]
    pub print_thread_info: bool,
    #[arg(
        long,
        default_value_t = String::from("INFO"),
        help = "Special log level for sub mod. For example INFO,rangesort_core=DEBUG. RUST_LOG takes precedence"
    )]
    pub log_level_setting: String,
    #[arg(
        long,
        default_value_t = LogRotationPolicy::Never,
        help = "Tracing log rotation policy, possible values: minutely, hourly, daily, never. Default: never"
    )]
    pub log_rotation_policy: LogRotationPolicy,
}

impl TryFrom<Config> for SortConfig {
    type Error = RangeSortError;

    fn try_from(opt: Config) -> Result<Self, Self::Error> {
        let config = SortConfig {
            worker_count: opt.workers,
            sort_column: opt.column_key,
            rows_per_partition: opt.rows,
            columns_per_row: opt.columns,
            base_path: opt.file,
            transport: opt.transport,
            concurrent_tasks: opt.concurrent_tasks,
            generate: opt.generate,
            verify: !opt.no_check,
            retain_input: !opt.delete,
            retain_output: opt.keep_output,
            skip_sort: opt.exclusive,
            seed: opt.seed,
        };
        config.validate()?;
        Ok(config)
    }
}
