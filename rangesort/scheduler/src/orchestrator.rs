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
use std::time::Instant;

use log::{info, warn};
use rangesort_core::config::SortConfig;
use rangesort_core::error::Result;
use rangesort_core::generator::PartitionGenerator;
use rangesort_core::partitioner::RangePartitioner;
use rangesort_core::phase::Phase;
use rangesort_core::reducer::Reducer;
use rangesort_core::shuffle::{create_transport, ShuffleTransport};
use rangesort_core::store::Store;
use rangesort_core::verifier::{Verifier, VerifyReport};

use crate::report::{PhaseReport, SortReport};
use crate::task_pool::{run_inline, TaskPool};

/// Drives a sort run through its phases, each one a barrier.
///
/// Task failures are recorded in the [SortReport] and never stop the run. Only
/// an invalid configuration or a failure to create the shuffle or result
/// targets makes [SortOrchestrator::run] return an error.
#[derive(Debug)]
pub struct SortOrchestrator {
    config: SortConfig,
    store: Arc<dyn Store>,
    pool: TaskPool,
}

impl SortOrchestrator {
    pub fn try_new(config: SortConfig, store: Arc<dyn Store>) -> Result<Self> {
        config.validate()?;
        let pool = TaskPool::new(config.pool_size());
        Ok(Self {
            config,
            store,
            pool,
        })
    }

    pub async fn run(&self) -> Result<SortReport> {
        let now = Instant::now();
        let mut report = SortReport::new(self.config.clone());
        info!(
            "Starting sort of {} partitions under {} with the {} transport",
            self.config.worker_count, self.config.base_path, self.config.transport
        );

        if self.config.generate {
            report.phases.push(self.generate().await);
        }

        if self.config.skip_sort {
            if !self.config.retain_input {
                report.phases.push(self.cleanup(None).await);
            }
        } else {
            let transport = create_transport(&self.config, self.store.clone());

            report
                .phases
                .push(self.create_shuffle_targets(transport.as_ref()).await?);
            report.phases.push(self.map(transport.clone()).await?);
            report.phases.push(self.create_result_targets().await?);
            report.phases.push(self.reduce(transport.clone()).await);
            report.phases.push(self.cleanup(Some(transport)).await);

            if self.config.verify {
                let (phase, verify) = self.verify().await;
                report.phases.push(phase);
                report.verify = verify;
            }
            if !self.config.retain_output {
                report.phases.push(self.delete_results().await);
            }
        }

        report.elapsed = now.elapsed();
        for failure in report.partial_failures() {
            warn!("{failure}");
        }
        info!("Sort finished in {} ms", report.elapsed.as_millis());
        Ok(report)
    }

    async fn generate(&self) -> PhaseReport {
        let generator = PartitionGenerator::new(&self.config, self.store.clone());
        self.pool
            .run_phase(Phase::Generate, self.config.worker_count, |i| {
                let generator = generator.clone();
                async move { generator.generate(i).await }
            })
            .await
            .report
    }

    /// Removes leftovers of an earlier run so targets can be created.
    async fn delete_stale(&self, path: &str) -> Result<()> {
        if self.store.exists(path).await? {
            warn!("Deleting stale data at {path} left by a previous run");
            self.store.delete(path).await?;
        }
        Ok(())
    }

    async fn create_shuffle_targets(
        &self,
        transport: &dyn ShuffleTransport,
    ) -> Result<PhaseReport> {
        let (report, result) = run_inline(Phase::CreateShuffleTargets, async {
            info!(
                "Creating {} {} shuffle targets",
                transport.bucket_count(),
                transport.kind()
            );
            self.delete_stale(&self.config.shuffle_dir()).await?;
            transport.create_targets().await
        })
        .await;
        result.map(|_| report)
    }

    async fn map(&self, transport: Arc<dyn ShuffleTransport>) -> Result<PhaseReport> {
        let partitioner =
            RangePartitioner::try_new(&self.config, self.store.clone(), transport)?;
        let outcome = self
            .pool
            .run_phase(Phase::Map, self.config.worker_count, |i| {
                let partitioner = partitioner.clone();
                async move { partitioner.partition(i).await }
            })
            .await;

        let rows: u64 = outcome
            .results
            .iter()
            .map(|(_, stats)| stats.total().num_rows)
            .sum();
        info!("Mapped {rows} rows into {} buckets", self.config.worker_count);
        Ok(outcome.report)
    }

    async fn create_result_targets(&self) -> Result<PhaseReport> {
        let result_dir = self.config.result_dir();
        let (report, result) = run_inline(Phase::CreateResultTargets, async {
            self.delete_stale(&result_dir).await?;
            self.store.create_container(&result_dir).await
        })
        .await;
        result.map(|_| report)
    }

    async fn reduce(&self, transport: Arc<dyn ShuffleTransport>) -> PhaseReport {
        let reducer = Reducer::new(&self.config, self.store.clone(), transport);
        self.pool
            .run_phase(Phase::Reduce, self.config.worker_count, |b| {
                let reducer = reducer.clone();
                async move { reducer.reduce(b).await }
            })
            .await
            .report
    }

    /// Deletes the input partitions unless they are retained, and the shuffle
    /// targets when a transport is given. The transport is the last task.
    async fn cleanup(&self, transport: Option<Arc<dyn ShuffleTransport>>) -> PhaseReport {
        let inputs = if self.config.retain_input {
            0
        } else {
            self.config.worker_count
        };
        let tasks = inputs + usize::from(transport.is_some());

        self.pool
            .run_phase(Phase::Cleanup, tasks, |i| {
                let store = self.store.clone();
                let transport = transport.clone();
                let path = self.config.partition_path(i);
                async move {
                    match transport {
                        Some(transport) if i == inputs => transport.delete_targets().await,
                        _ => store.delete(&path).await,
                    }
                }
            })
            .await
            .report
    }

    async fn verify(&self) -> (PhaseReport, Option<VerifyReport>) {
        let verifier = Verifier::new(&self.config, self.store.clone());
        let (report, result) = run_inline(
            Phase::Verify,
            verifier.verify(self.config.worker_count, self.config.rows_per_partition),
        )
        .await;
        (report, result.ok())
    }

    async fn delete_results(&self) -> PhaseReport {
        let result_dir = self.config.result_dir();
        run_inline(Phase::DeleteResults, self.store.delete(&result_dir))
            .await
            .0
    }
}
