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

//! Range-partitioned sort binary.

use std::sync::Arc;
use std::{env, io};

use clap::Parser;
use rangesort_core::config::{LogRotationPolicy, SortConfig};
use rangesort_core::error::RangeSortError;
use rangesort_core::print_version;
use rangesort_core::store::{LocalFsStore, Store};
use rangesort_scheduler::config::Config;
use rangesort_scheduler::SortOrchestrator;
use tracing_subscriber::EnvFilter;

fn main() -> rangesort_core::error::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()
        .map_err(|e| RangeSortError::General(format!("Failed to start runtime: {e}")))?;

    runtime.block_on(inner())
}

async fn inner() -> rangesort_core::error::Result<()> {
    // parse options
    let opt = Config::parse();

    let rust_log = env::var(EnvFilter::DEFAULT_ENV);
    let log_filter = EnvFilter::new(rust_log.unwrap_or(opt.log_level_setting.clone()));

    let tracing = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_thread_names(opt.print_thread_info)
        .with_thread_ids(opt.print_thread_info)
        .with_writer(io::stdout)
        .with_env_filter(log_filter);

    // File layer
    if let Some(log_dir) = &opt.log_dir {
        let log_file_name_prefix = format!("rangesort_w{}", opt.workers);

        let log_file = match opt.log_rotation_policy {
            LogRotationPolicy::Minutely => {
                tracing_appender::rolling::minutely(log_dir, &log_file_name_prefix)
            }
            LogRotationPolicy::Hourly => {
                tracing_appender::rolling::hourly(log_dir, &log_file_name_prefix)
            }
            LogRotationPolicy::Daily => {
                tracing_appender::rolling::daily(log_dir, &log_file_name_prefix)
            }
            LogRotationPolicy::Never => {
                tracing_appender::rolling::never(log_dir, &log_file_name_prefix)
            }
        };

        tracing.with_writer(log_file).init();
    } else {
        tracing.init();
    }
    print_version();

    let store: Arc<dyn Store> = Arc::new(LocalFsStore::new(&opt.work_dir));
    let config: SortConfig = opt.try_into()?;

    // failed tasks only show up in the report
    let report = SortOrchestrator::try_new(config, store)?.run().await?;
    println!("{report}");

    Ok(())
}
