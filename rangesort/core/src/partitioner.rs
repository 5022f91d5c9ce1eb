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

//! The map phase: routes every row of one input partition to the bucket that
//! owns its sort key.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use log::{debug, info};

use crate::bucket::BucketBoundaries;
use crate::config::SortConfig;
use crate::error::Result;
use crate::shuffle::{ShuffleSink, ShuffleTransport};
use crate::store::{RowStream, Store, WriteStats};

/// Outcome of one successful map task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapStats {
    pub partition: usize,
    /// Per-bucket output, indexed by bucket.
    pub buckets: Vec<WriteStats>,
    pub elapsed: Duration,
}

impl MapStats {
    pub fn total(&self) -> WriteStats {
        let mut total = WriteStats::default();
        self.buckets.iter().for_each(|s| total.merge(s));
        total
    }
}

impl Display for MapStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "partition {} -> {} buckets, {} in {:?}",
            self.partition,
            self.buckets.len(),
            self.total(),
            self.elapsed
        )
    }
}

#[derive(Debug, Clone)]
pub struct RangePartitioner {
    store: Arc<dyn Store>,
    transport: Arc<dyn ShuffleTransport>,
    boundaries: BucketBoundaries,
    sort_column: usize,
    config: SortConfig,
}

impl RangePartitioner {
    /// One bucket per shuffle target of `transport`.
    pub fn try_new(
        config: &SortConfig,
        store: Arc<dyn Store>,
        transport: Arc<dyn ShuffleTransport>,
    ) -> Result<Self> {
        let boundaries = BucketBoundaries::try_new(transport.bucket_count())?;
        Ok(Self {
            store,
            transport,
            boundaries,
            sort_column: config.sort_column,
            config: config.clone(),
        })
    }

    /// Maps input partition `partition`.
    ///
    /// Either every bucket sink is committed or all of them are aborted; a
    /// malformed row fails the task with a parse error.
    pub async fn partition(&self, partition: usize) -> Result<MapStats> {
        let now = Instant::now();
        let path = self.config.partition_path(partition);
        debug!("Mapping partition {partition} from {path}");

        let mut input = self.store.open_file(&path).await?;
        let mut sink = self.transport.open_sink(partition).await?;

        if let Err(e) = self.route_rows(&mut input, sink.as_mut()).await {
            sink.abort().await;
            return Err(e);
        }
        let buckets = sink.finish().await?;

        let stats = MapStats {
            partition,
            buckets,
            elapsed: now.elapsed(),
        };
        info!("Executed map task: {stats}");
        Ok(stats)
    }

    async fn route_rows(
        &self,
        input: &mut RowStream,
        sink: &mut dyn ShuffleSink,
    ) -> Result<()> {
        while let Some(row) = input.next().await {
            let row = row?;
            let key = row.sort_key(self.sort_column)?;
            sink.write(self.boundaries.bucket_for(key), &row).await?;
        }
        Ok(())
    }
}
