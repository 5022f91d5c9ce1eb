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

//! Synthetic input data: `rows_per_partition` rows of `columns_per_row` random
//! integers in every input partition.

use std::sync::Arc;

use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::SortConfig;
use crate::error::Result;
use crate::row::Row;
use crate::store::{Store, WriteStats};

#[derive(Debug, Clone)]
pub struct PartitionGenerator {
    store: Arc<dyn Store>,
    config: SortConfig,
}

impl PartitionGenerator {
    pub fn new(config: &SortConfig, store: Arc<dyn Store>) -> Self {
        Self {
            store,
            config: config.clone(),
        }
    }

    fn rng(&self, partition: usize) -> SmallRng {
        match self.config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(partition as u64)),
            None => SmallRng::from_os_rng(),
        }
    }

    /// Writes input partition `partition`, replacing any previous content.
    pub async fn generate(&self, partition: usize) -> Result<WriteStats> {
        let path = self.config.partition_path(partition);
        let mut rng = self.rng(partition);
        let mut fields = vec![0i32; self.config.columns_per_row];

        let mut writer = self.store.create_file(&path).await?;
        for _ in 0..self.config.rows_per_partition {
            fields.iter_mut().for_each(|f| *f = rng.random());
            if let Err(e) = writer.write_row(&Row::from_fields(&fields)).await {
                writer.abort().await;
                return Err(e);
            }
        }
        let stats = writer.finish().await?;

        let size = self.store.file_size(&path).await?;
        info!("Generated partition {path}: {} rows, {size} bytes", stats.num_rows);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{collect_rows, InMemoryStore, LocalFsStore};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_generate_shape() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let config = SortConfig::new(2, "/in").with_generated_data(100, 4);
        let store: Arc<dyn Store> = Arc::new(LocalFsStore::new(dir.path()));
        let generator = PartitionGenerator::new(&config, store.clone());

        let stats = generator.generate(1).await?;
        assert_eq!(stats.num_rows, 100);
        assert_eq!(store.file_size("/in_part1").await?, stats.num_bytes);

        let rows = collect_rows(store.open_file("/in_part1").await?).await?;
        assert_eq!(rows.len(), 100);
        for row in &rows {
            assert_eq!(row.as_str().split(',').count(), 4);
            row.sort_key(3)?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_seeded_generation_is_reproducible() -> Result<()> {
        let config = SortConfig::new(2, "/in")
            .with_generated_data(20, 3)
            .with_seed(42);
        let first: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let second: Arc<dyn Store> = Arc::new(InMemoryStore::new());

        for store in [&first, &second] {
            let generator = PartitionGenerator::new(&config, store.clone());
            generator.generate(0).await?;
            generator.generate(1).await?;
        }

        let a0 = collect_rows(first.open_file("/in_part0").await?).await?;
        let b0 = collect_rows(second.open_file("/in_part0").await?).await?;
        let a1 = collect_rows(first.open_file("/in_part1").await?).await?;
        assert_eq!(a0, b0);
        assert_ne!(a0, a1);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_partition() -> Result<()> {
        let config = SortConfig::new(1, "/in").with_generated_data(0, 2);
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let stats = PartitionGenerator::new(&config, store.clone())
            .generate(0)
            .await?;
        assert_eq!(stats, WriteStats::default());
        assert!(collect_rows(store.open_file("/in_part0").await?).await?.is_empty());
        Ok(())
    }
}
