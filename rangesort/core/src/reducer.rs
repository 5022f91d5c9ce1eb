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

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use log::{debug, info};

use crate::config::SortConfig;
use crate::error::Result;
use crate::row::Row;
use crate::shuffle::ShuffleTransport;
use crate::store::{Store, WriteStats};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceStats {
    pub bucket: usize,
    pub path: String,
    pub output: WriteStats,
    pub elapsed: Duration,
}

/// Sorts one bucket in memory and writes it as a sorted output partition.
#[derive(Debug, Clone)]
pub struct Reducer {
    store: Arc<dyn Store>,
    transport: Arc<dyn ShuffleTransport>,
    config: SortConfig,
}

impl Reducer {
    pub fn new(
        config: &SortConfig,
        store: Arc<dyn Store>,
        transport: Arc<dyn ShuffleTransport>,
    ) -> Self {
        Self {
            store,
            transport,
            config: config.clone(),
        }
    }

    /// Drains `bucket`, sorts it by key and commits the result file.
    ///
    /// Equal keys keep no particular order. Nothing is published unless the
    /// whole bucket was read, parsed and written.
    pub async fn reduce(&self, bucket: usize) -> Result<ReduceStats> {
        let now = Instant::now();
        let mut input = self.transport.read_all(bucket).await?;

        let mut keyed: Vec<(i32, Row)> = vec![];
        while let Some(row) = input.next().await {
            let row = row?;
            keyed.push((row.sort_key(self.config.sort_column)?, row));
        }
        debug!("Bucket {bucket} collected {} rows", keyed.len());

        keyed.sort_unstable_by_key(|(key, _)| *key);

        let path = self.config.result_path(bucket);
        let mut writer = self.store.create_file(&path).await?;
        for (_, row) in &keyed {
            if let Err(e) = writer.write_row(row).await {
                writer.abort().await;
                return Err(e);
            }
        }
        let output = writer.finish().await?;

        let stats = ReduceStats {
            bucket,
            path,
            output,
            elapsed: now.elapsed(),
        };
        info!(
            "Executed reduce task for bucket {bucket} in {:?}. Statistics: {}",
            stats.elapsed, stats.output
        );
        Ok(stats)
    }
}
