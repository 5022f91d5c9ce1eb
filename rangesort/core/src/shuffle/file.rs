use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

use crate::config::{ShuffleTransportKind, SortConfig};
use crate::error::{RangeSortError, Result};
use crate::row::Row;
use crate::store::{RowStream, SendableRowWriter, Store, WriteStats};

use super::{ShuffleSink, ShuffleTransport};

/// Shuffles through store containers: `{base}-redu/group_{bucket}` holds one
/// uniquely named fragment per map task.
#[derive(Debug)]
pub struct FileShuffleTransport {
    store: Arc<dyn Store>,
    config: SortConfig,
}

impl FileShuffleTransport {
    pub fn new(config: &SortConfig, store: Arc<dyn Store>) -> Self {
        Self {
            store,
            config: config.clone(),
        }
    }

    fn check_bucket(&self, bucket: usize) -> Result<()> {
        if bucket >= self.bucket_count() {
            return Err(RangeSortError::Internal(format!(
                "bucket {bucket} out of range for {} buckets",
                self.bucket_count()
            )));
        }
        Ok(())
    }
}

struct FileShuffleSink {
    map_partition: usize,
    writers: Vec<SendableRowWriter>,
}

#[async_trait]
impl ShuffleSink for FileShuffleSink {
    async fn write(&mut self, bucket: usize, row: &Row) -> Result<()> {
        let num_buckets = self.writers.len();
        let writer = self.writers.get_mut(bucket).ok_or_else(|| {
            RangeSortError::Internal(format!(
                "bucket {bucket} out of range for {num_buckets} buckets"
            ))
        })?;
        writer.write_row(row).await
    }

    async fn finish(self: Box<Self>) -> Result<Vec<WriteStats>> {
        let FileShuffleSink {
            map_partition,
            writers,
        } = *self;
        let mut stats = Vec::with_capacity(writers.len());
        let mut writers = writers.into_iter();
        while let Some(writer) = writers.next() {
            match writer.finish().await {
                Ok(s) => stats.push(s),
                Err(e) => {
                    warn!(
                        "Map task {map_partition} failed to commit bucket {}: {e}",
                        stats.len()
                    );
                    for writer in writers {
                        writer.abort().await;
                    }
                    return Err(e);
                }
            }
        }
        Ok(stats)
    }

    async fn abort(self: Box<Self>) {
        for writer in self.writers {
            writer.abort().await;
        }
    }
}

#[async_trait]
impl ShuffleTransport for FileShuffleTransport {
    fn kind(&self) -> ShuffleTransportKind {
        ShuffleTransportKind::File
    }

    fn bucket_count(&self) -> usize {
        self.config.worker_count
    }

    async fn create_targets(&self) -> Result<()> {
        self.store.create_container(&self.config.shuffle_dir()).await?;
        for bucket in 0..self.bucket_count() {
            self.store
                .create_container(&self.config.bucket_container(bucket))
                .await?;
        }
        debug!(
            "Created {} shuffle containers under {}",
            self.bucket_count(),
            self.config.shuffle_dir()
        );
        Ok(())
    }

    async fn open_sink(&self, map_partition: usize) -> Result<Box<dyn ShuffleSink>> {
        // re-running a map task adds fragments instead of replacing them
        let fragment = format!("part_{map_partition}_{}", uuid::Uuid::new_v4());

        let mut writers = Vec::with_capacity(self.bucket_count());
        for bucket in 0..self.bucket_count() {
            let container = self.config.bucket_container(bucket);
            match self.store.create_fragment(&container, &fragment).await {
                Ok(writer) => writers.push(writer),
                Err(e) => {
                    for writer in writers {
                        writer.abort().await;
                    }
                    return Err(e);
                }
            }
        }

        Ok(Box::new(FileShuffleSink {
            map_partition,
            writers,
        }))
    }

    async fn read_all(&self, bucket: usize) -> Result<RowStream> {
        self.check_bucket(bucket)?;
        self.store
            .open_container(&self.config.bucket_container(bucket))
            .await
    }

    async fn delete_targets(&self) -> Result<()> {
        self.store.delete(&self.config.shuffle_dir()).await
    }
}
