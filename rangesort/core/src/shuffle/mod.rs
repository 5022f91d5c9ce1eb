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

//! Shuffle transports carry rows from map tasks to the reduce task of their bucket.
//!
//! Mappers only see [ShuffleSink] and reducers only see
//! [ShuffleTransport::read_all], so the two transports are interchangeable:
//!
//! * [FileShuffleTransport] writes one fragment per map task per bucket into the
//!   bucket's store container. Buckets can be read any number of times.
//! * [AggregatorShuffleTransport] streams every bucket into one shared
//!   aggregator per bucket which serializes concurrent writers. Each bucket is
//!   drained exactly once.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{ShuffleTransportKind, SortConfig};
use crate::error::Result;
use crate::row::Row;
use crate::store::{RowStream, Store, WriteStats};

mod aggregator;
mod file;

pub use aggregator::AggregatorShuffleTransport;
pub use file::FileShuffleTransport;

/// The per-bucket outputs of one map task, opened and closed together.
///
/// Every sink is closed exactly once, either by [ShuffleSink::finish] or by
/// [ShuffleSink::abort].
#[async_trait]
pub trait ShuffleSink: Send {
    /// Appends one row to `bucket`. A row is never split between writes.
    async fn write(&mut self, bucket: usize, row: &Row) -> Result<()>;

    /// Flushes and publishes all buckets. Returns per-bucket statistics.
    async fn finish(self: Box<Self>) -> Result<Vec<WriteStats>>;

    /// Closes all buckets after a failure.
    async fn abort(self: Box<Self>);
}

#[async_trait]
pub trait ShuffleTransport: Debug + Send + Sync {
    fn kind(&self) -> ShuffleTransportKind;

    fn bucket_count(&self) -> usize;

    /// Prepares one target per bucket before the map phase.
    async fn create_targets(&self) -> Result<()>;

    /// Opens the sinks of map task `map_partition` for every bucket.
    async fn open_sink(&self, map_partition: usize) -> Result<Box<dyn ShuffleSink>>;

    /// Every row shuffled into `bucket`, in no particular order across map tasks.
    async fn read_all(&self, bucket: usize) -> Result<RowStream>;

    /// Releases all bucket targets after the reduce phase.
    async fn delete_targets(&self) -> Result<()>;
}

/// Builds the transport selected by `config.transport`.
pub fn create_transport(
    config: &SortConfig,
    store: Arc<dyn Store>,
) -> Arc<dyn ShuffleTransport> {
    match config.transport {
        ShuffleTransportKind::File => Arc::new(FileShuffleTransport::new(config, store)),
        ShuffleTransportKind::Aggregator => {
            Arc::new(AggregatorShuffleTransport::new(config.worker_count))
        }
    }
}
