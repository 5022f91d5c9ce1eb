use std::fmt::{self, Debug, Formatter};
use std::mem;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream;
use log::{debug, error, warn};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::config::ShuffleTransportKind;
use crate::error::{RangeSortError, Result};
use crate::event_loop::{EventAction, EventLoop, EventSender};
use crate::row::Row;
use crate::store::{RowStream, WriteStats};

use super::{ShuffleSink, ShuffleTransport};

/// Rows a map task buffers per bucket before posting them, counted in bytes.
const SINK_BUFFER_BYTES: usize = 1024 * 1024;
const EVENT_BUFFER_SIZE: usize = 64;

enum AggregatorEvent {
    /// Whole rows from one writer, appended in order.
    Append(Vec<Row>),
    /// Hands every collected row to the single reader.
    Drain(oneshot::Sender<Result<Vec<Row>>>),
}

/// Collects one bucket. Its inbox orders the batches of all writers.
struct RowAggregator {
    bucket: usize,
    rows: Mutex<Vec<Row>>,
    drained: Mutex<bool>,
}

#[async_trait]
impl EventAction<AggregatorEvent> for RowAggregator {
    fn on_start(&self) {
        debug!("Aggregator for bucket {} started", self.bucket);
    }

    fn on_stop(&self) {
        debug!("Aggregator for bucket {} stopped", self.bucket);
    }

    async fn on_receive(&self, event: AggregatorEvent) -> Result<()> {
        match event {
            AggregatorEvent::Append(mut batch) => {
                if *self.drained.lock() {
                    return Err(RangeSortError::General(format!(
                        "bucket {} received {} rows after it was drained",
                        self.bucket,
                        batch.len()
                    )));
                }
                self.rows.lock().append(&mut batch);
            }
            AggregatorEvent::Drain(reply) => {
                let mut drained = self.drained.lock();
                let result = if *drained {
                    Err(RangeSortError::General(format!(
                        "bucket {} has already been drained",
                        self.bucket
                    )))
                } else {
                    *drained = true;
                    Ok(mem::take(&mut *self.rows.lock()))
                };
                if reply.send(result).is_err() {
                    warn!("Reader of bucket {} went away before the drain", self.bucket);
                }
            }
        }
        Ok(())
    }

    fn on_error(&self, error: RangeSortError) {
        error!("Aggregator for bucket {} dropped an event: {error}", self.bucket);
    }
}

/// Shuffles through one long-lived aggregator per bucket.
///
/// Map tasks write to the shared aggregators concurrently; each aggregator
/// processes its inbox sequentially, so no two writers' rows interleave within
/// a row. Rows already posted by a map task that later fails stay in the bucket.
pub struct AggregatorShuffleTransport {
    bucket_count: usize,
    aggregators: DashMap<usize, EventLoop<AggregatorEvent>>,
}

impl AggregatorShuffleTransport {
    pub fn new(bucket_count: usize) -> Self {
        Self {
            bucket_count,
            aggregators: DashMap::new(),
        }
    }

    fn sender(&self, bucket: usize) -> Result<EventSender<AggregatorEvent>> {
        self.aggregators
            .get(&bucket)
            .ok_or_else(|| {
                RangeSortError::General(format!("no aggregator for bucket {bucket}"))
            })?
            .get_sender()
    }
}

impl Debug for AggregatorShuffleTransport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregatorShuffleTransport")
            .field("bucket_count", &self.bucket_count)
            .field("active", &self.aggregators.len())
            .finish()
    }
}

struct AggregatorShuffleSink {
    senders: Vec<EventSender<AggregatorEvent>>,
    buffers: Vec<Vec<Row>>,
    buffered_bytes: Vec<usize>,
    stats: Vec<WriteStats>,
}

impl AggregatorShuffleSink {
    async fn flush(&mut self, bucket: usize) -> Result<()> {
        if self.buffers[bucket].is_empty() {
            return Ok(());
        }
        let batch = mem::take(&mut self.buffers[bucket]);
        self.buffered_bytes[bucket] = 0;
        self.senders[bucket]
            .post_event(AggregatorEvent::Append(batch))
            .await
    }
}

#[async_trait]
impl ShuffleSink for AggregatorShuffleSink {
    async fn write(&mut self, bucket: usize, row: &Row) -> Result<()> {
        if bucket >= self.senders.len() {
            return Err(RangeSortError::Internal(format!(
                "bucket {bucket} out of range for {} buckets",
                self.senders.len()
            )));
        }
        self.buffers[bucket].push(row.clone());
        self.buffered_bytes[bucket] += row.encoded_len();
        self.stats[bucket].record(row);
        if self.buffered_bytes[bucket] >= SINK_BUFFER_BYTES {
            self.flush(bucket).await?;
        }
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> Result<Vec<WriteStats>> {
        for bucket in 0..self.senders.len() {
            self.flush(bucket).await?;
        }
        Ok(self.stats)
    }

    async fn abort(self: Box<Self>) {}
}

#[async_trait]
impl ShuffleTransport for AggregatorShuffleTransport {
    fn kind(&self) -> ShuffleTransportKind {
        ShuffleTransportKind::Aggregator
    }

    fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    async fn create_targets(&self) -> Result<()> {
        if !self.aggregators.is_empty() {
            return Err(RangeSortError::General(
                "aggregators already exist".to_owned(),
            ));
        }
        for bucket in 0..self.bucket_count {
            let action = Arc::new(RowAggregator {
                bucket,
                rows: Mutex::new(vec![]),
                drained: Mutex::new(false),
            });
            let mut event_loop =
                EventLoop::new(format!("aggregator-{bucket}"), EVENT_BUFFER_SIZE, action);
            event_loop.start()?;
            self.aggregators.insert(bucket, event_loop);
        }
        Ok(())
    }

    async fn open_sink(&self, _map_partition: usize) -> Result<Box<dyn ShuffleSink>> {
        let senders = (0..self.bucket_count)
            .map(|bucket| self.sender(bucket))
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(AggregatorShuffleSink {
            senders,
            buffers: vec![vec![]; self.bucket_count],
            buffered_bytes: vec![0; self.bucket_count],
            stats: vec![WriteStats::default(); self.bucket_count],
        }))
    }

    async fn read_all(&self, bucket: usize) -> Result<RowStream> {
        let (tx, rx) = oneshot::channel();
        self.sender(bucket)?
            .post_event(AggregatorEvent::Drain(tx))
            .await?;
        let rows = rx.await.map_err(|_| {
            RangeSortError::Internal(format!("aggregator for bucket {bucket} stopped"))
        })??;
        Ok(Box::pin(stream::iter(rows.into_iter().map(Ok))))
    }

    async fn delete_targets(&self) -> Result<()> {
        for bucket in 0..self.bucket_count {
            if let Some((_, event_loop)) = self.aggregators.remove(&bucket) {
                event_loop.stop();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::collect_rows;

    #[tokio::test]
    async fn test_concurrent_writers_share_bucket() -> Result<()> {
        let transport = Arc::new(AggregatorShuffleTransport::new(2));
        transport.create_targets().await?;

        let mut handles = vec![];
        for map_partition in 0..4 {
            let transport = transport.clone();
            handles.push(tokio::spawn(async move {
                let mut sink = transport.open_sink(map_partition).await?;
                for i in 0..100 {
                    let row = Row::from(format!("{i},{map_partition}"));
                    sink.write(i % 2, &row).await?;
                }
                sink.finish().await
            }));
        }
        for handle in handles {
            let stats = handle.await??;
            assert_eq!(stats[0].num_rows, 50);
            assert_eq!(stats[1].num_rows, 50);
        }

        let rows = collect_rows(transport.read_all(0).await?).await?;
        assert_eq!(rows.len(), 200);
        assert!(rows.iter().all(|r| r.sort_key(0).unwrap() % 2 == 0));

        // single reader
        assert!(transport.read_all(0).await.is_err());

        transport.delete_targets().await?;
        assert!(transport.open_sink(0).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_unfinished_sink_is_not_delivered() -> Result<()> {
        let transport = AggregatorShuffleTransport::new(1);
        transport.create_targets().await?;

        let mut sink = transport.open_sink(0).await?;
        sink.write(0, &Row::from("1")).await?;
        sink.abort().await;

        assert!(collect_rows(transport.read_all(0).await?).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_targets_are_created_once() -> Result<()> {
        let transport = AggregatorShuffleTransport::new(1);
        transport.create_targets().await?;
        assert!(transport.create_targets().await.is_err());
        Ok(())
    }
}
