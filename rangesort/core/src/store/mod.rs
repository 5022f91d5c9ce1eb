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

//! The storage collaborator the pipeline reads partitions from and writes
//! shuffle fragments and results to.
//!
//! A store holds two kinds of objects:
//! * files: named sequences of rows, written once through a [RowWriter]
//! * containers: directories of fragment files which read back as the
//!   concatenation of all their fragments
//!
//! Writers stage their output and only publish it on [RowWriter::finish], so a
//! reader never observes a half-written file.

use std::fmt::{self, Debug, Display, Formatter};
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;
use crate::row::Row;

mod disk;
mod memory;

pub use disk::LocalFsStore;
pub use memory::InMemoryStore;

/// Lazy, single-pass sequence of rows read from a store object.
pub type RowStream = Pin<Box<dyn Stream<Item = Result<Row>> + Send>>;

/// Boxed writer handed out by a [Store].
pub type SendableRowWriter = Box<dyn RowWriter>;

/// Row and byte counts of one committed store object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub num_rows: u64,
    pub num_bytes: u64,
}

impl WriteStats {
    pub fn record(&mut self, row: &Row) {
        self.num_rows += 1;
        self.num_bytes += row.encoded_len() as u64;
    }

    pub fn merge(&mut self, other: &WriteStats) {
        self.num_rows += other.num_rows;
        self.num_bytes += other.num_bytes;
    }
}

impl Display for WriteStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "rows={}, bytes={}", self.num_rows, self.num_bytes)
    }
}

/// Buffered, line-oriented writer for one store object.
#[async_trait]
pub trait RowWriter: Send {
    /// Appends one row followed by a newline.
    async fn write_row(&mut self, row: &Row) -> Result<()>;

    async fn write_rows(&mut self, rows: &[Row]) -> Result<()> {
        for row in rows {
            self.write_row(row).await?;
        }
        Ok(())
    }

    /// Flushes and publishes everything written so far.
    async fn finish(self: Box<Self>) -> Result<WriteStats>;

    /// Closes the writer and discards its output.
    async fn abort(self: Box<Self>);
}

#[async_trait]
pub trait Store: Debug + Send + Sync {
    /// Creates (or replaces on finish) the file at `path`.
    async fn create_file(&self, path: &str) -> Result<SendableRowWriter>;

    async fn open_file(&self, path: &str) -> Result<RowStream>;

    /// Creates an empty container. Fails if `path` already exists.
    async fn create_container(&self, path: &str) -> Result<()>;

    /// Creates fragment `name` inside an existing container.
    async fn create_fragment(&self, container: &str, name: &str)
        -> Result<SendableRowWriter>;

    /// Names of the committed fragments of `container`, sorted.
    async fn list_fragments(&self, container: &str) -> Result<Vec<String>>;

    /// Reads all fragments of `container` back to back, in [Store::list_fragments] order.
    async fn open_container(&self, container: &str) -> Result<RowStream>;

    /// Deletes a file or a container with everything in it.
    async fn delete(&self, path: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// Size in bytes of a committed file.
    async fn file_size(&self, path: &str) -> Result<u64>;
}

/// Collects a whole row stream into memory.
pub async fn collect_rows(mut stream: RowStream) -> Result<Vec<Row>> {
    use futures::StreamExt;

    let mut rows = vec![];
    while let Some(row) = stream.next().await {
        rows.push(row?);
    }
    Ok(rows)
}

/// Writes `rows` to a new file and commits it.
pub async fn write_file(store: &dyn Store, path: &str, rows: &[Row]) -> Result<WriteStats> {
    let mut writer = store.create_file(path).await?;
    if let Err(e) = writer.write_rows(rows).await {
        writer.abort().await;
        return Err(e);
    }
    writer.finish().await
}
