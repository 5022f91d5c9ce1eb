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

use rangesort_core::config::{ShuffleTransportKind, SortConfig};
use rangesort_core::error::{RangeSortError, Result};
use rangesort_core::partitioner::RangePartitioner;
use rangesort_core::phase::Phase;
use rangesort_core::reducer::Reducer;
use rangesort_core::row::Row;
use rangesort_core::shuffle::{create_transport, ShuffleTransport};
use rangesort_core::store::{collect_rows, write_file, InMemoryStore, LocalFsStore, Store};
use rangesort_core::verifier::Verifier;
use rangesort_scheduler::SortOrchestrator;
use tempfile::TempDir;

async fn write_inputs(
    store: &dyn Store,
    config: &SortConfig,
    partitions: &[&[&str]],
) -> Result<()> {
    for (i, rows) in partitions.iter().enumerate() {
        let rows: Vec<Row> = rows.iter().map(|r| Row::from(*r)).collect();
        write_file(store, &config.partition_path(i), &rows).await?;
    }
    Ok(())
}

async fn read_output(store: &dyn Store, config: &SortConfig) -> Result<Vec<Vec<String>>> {
    let mut buckets = vec![];
    for bucket in 0..config.worker_count {
        let rows = collect_rows(store.open_file(&config.result_path(bucket)).await?).await?;
        buckets.push(rows.into_iter().map(Row::into_string).collect());
    }
    Ok(buckets)
}

async fn generated_sort(transport: ShuffleTransportKind) -> Result<()> {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn Store> = Arc::new(LocalFsStore::new(dir.path()));
    let config = SortConfig::new(4, "/sort-data")
        .with_generated_data(500, 5)
        .with_sort_column(3)
        .with_transport(transport)
        .with_concurrent_tasks(2)
        .with_seed(11);

    let report = SortOrchestrator::try_new(config, store.clone())?
        .run()
        .await?;

    assert!(report.partial_failures().is_empty(), "{report}");
    let verify = report.verify.expect("output was verified");
    assert!(verify.ok, "{report}");
    assert_eq!(verify.total_rows, 4 * 500);
    assert!(report.is_success());

    // nothing is left behind
    assert!(!store.exists("/sort-data-redu").await?);
    assert!(!store.exists("/sort-data-result").await?);
    assert!(!store.exists("/sort-data_part0").await?);
    Ok(())
}

#[tokio::test]
async fn sort_generated_data_through_files() -> Result<()> {
    generated_sort(ShuffleTransportKind::File).await
}

#[tokio::test]
async fn sort_generated_data_through_aggregators() -> Result<()> {
    generated_sort(ShuffleTransportKind::Aggregator).await
}

#[tokio::test]
async fn single_bucket_is_a_full_sort() -> Result<()> {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let config = SortConfig::new(1, "/one")
        .with_generated_data(300, 2)
        .with_seed(3)
        .with_retain_output(true);

    let report = SortOrchestrator::try_new(config.clone(), store.clone())?
        .run()
        .await?;
    assert!(report.is_success(), "{report}");

    let output = read_output(store.as_ref(), &config).await?;
    let keys: Vec<i32> = output[0]
        .iter()
        .map(|r| Row::from(r.as_str()).sort_key(0))
        .collect::<Result<_>>()?;
    assert_eq!(keys.len(), 300);
    assert!(keys.windows(2).all(|w| w[0] <= w[1]));
    Ok(())
}

#[tokio::test]
async fn small_keys_land_in_upper_bucket() -> Result<()> {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let config = SortConfig::new(2, "/scenario")
        .with_retain_input(true)
        .with_retain_output(true)
        .with_verify(false);
    write_inputs(store.as_ref(), &config, &[&["5,9", "1,2", "3,7"], &[]]).await?;

    let report = SortOrchestrator::try_new(config.clone(), store.clone())?
        .run()
        .await?;
    assert!(report.is_success(), "{report}");

    let output = read_output(store.as_ref(), &config).await?;
    assert!(output[0].is_empty());
    assert_eq!(output[1], vec!["1,2", "3,7", "5,9"]);

    // the count check expects worker_count * rows_per_partition rows
    let verify = Verifier::new(&config, store.clone()).verify(2, 0).await?;
    assert_eq!(verify.violation, None);
    assert_eq!(verify.total_rows, 3);

    assert!(store.exists(&config.partition_path(0)).await?);
    Ok(())
}

#[tokio::test]
async fn malformed_row_fails_only_its_mapper() -> Result<()> {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let config = SortConfig::new(3, "/bad")
        .with_rows_per_partition(2)
        .with_retain_output(true);
    write_inputs(
        store.as_ref(),
        &config,
        &[&["7,0", "-7,0"], &["1,0", "oops,0"], &["2000000000,0", "0,0"]],
    )
    .await?;

    let report = SortOrchestrator::try_new(config.clone(), store.clone())?
        .run()
        .await?;

    let map = report.phase(Phase::Map).expect("map phase ran");
    assert_eq!(map.failures.len(), 1);
    assert_eq!(map.failures[0].task, 1);
    assert!(map.failures[0].message.starts_with("Parse error"));
    assert!(matches!(
        report.partial_failures().as_slice(),
        [RangeSortError::PartialFailure(Phase::Map, 1, 3)]
    ));
    assert!(report.phase(Phase::Reduce).expect("reduce ran").is_success());

    // the other mappers' rows are all there and sorted
    let verify = report.verify.expect("output was verified");
    assert!(!verify.ok);
    assert_eq!(verify.violation, None);
    assert_eq!(verify.total_rows, 4);

    let output = read_output(store.as_ref(), &config).await?;
    let all: Vec<String> = output.into_iter().flatten().collect();
    assert_eq!(all, vec!["-7,0", "0,0", "7,0", "2000000000,0"]);
    Ok(())
}

#[tokio::test]
async fn remapping_gives_same_output() -> Result<()> {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let config = SortConfig::new(2, "/twice");
    write_inputs(store.as_ref(), &config, &[&["4", "-4", "9"], &["-1", "2", "4"]]).await?;

    let mut outputs = vec![];
    for order in [[0, 1], [1, 0]] {
        let transport: Arc<dyn ShuffleTransport> = create_transport(&config, store.clone());
        transport.create_targets().await?;
        store.create_container(&config.result_dir()).await?;

        let partitioner = RangePartitioner::try_new(&config, store.clone(), transport.clone())?;
        for partition in order {
            partitioner.partition(partition).await?;
        }

        let reducer = Reducer::new(&config, store.clone(), transport.clone());
        reducer.reduce(1).await?;
        reducer.reduce(0).await?;
        outputs.push(read_output(store.as_ref(), &config).await?);

        transport.delete_targets().await?;
        store.delete(&config.result_dir()).await?;
    }

    assert_eq!(outputs[0], vec![vec!["-4", "-1"], vec!["2", "4", "4", "9"]]);
    assert_eq!(outputs[0], outputs[1]);
    Ok(())
}

async fn map_every_partition_twice(transport_kind: ShuffleTransportKind) -> Result<()> {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let config = SortConfig::new(2, "/again").with_transport(transport_kind);
    write_inputs(store.as_ref(), &config, &[&["4", "-4", "9"], &["-1", "2", "4"]]).await?;

    let transport = create_transport(&config, store.clone());
    transport.create_targets().await?;
    store.create_container(&config.result_dir()).await?;

    let partitioner = RangePartitioner::try_new(&config, store.clone(), transport.clone())?;
    for partition in [0, 1, 1, 0] {
        partitioner.partition(partition).await?;
    }
    let reducer = Reducer::new(&config, store.clone(), transport.clone());
    reducer.reduce(0).await?;
    reducer.reduce(1).await?;

    assert_eq!(
        read_output(store.as_ref(), &config).await?,
        vec![
            vec!["-4", "-4", "-1", "-1"],
            vec!["2", "2", "4", "4", "4", "4", "9", "9"],
        ]
    );
    transport.delete_targets().await
}

#[tokio::test]
async fn mapping_twice_through_files_duplicates_rows() -> Result<()> {
    map_every_partition_twice(ShuffleTransportKind::File).await
}

#[tokio::test]
async fn mapping_twice_through_aggregators_duplicates_rows() -> Result<()> {
    map_every_partition_twice(ShuffleTransportKind::Aggregator).await
}

#[tokio::test]
async fn failed_tasks_do_not_fail_the_run() -> Result<()> {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let config = SortConfig::new(2, "/d").with_rows_per_partition(2);
    write_inputs(store.as_ref(), &config, &[&["1,1", "2,2"], &["oops,1"]]).await?;

    let result = SortOrchestrator::try_new(config, store)?.run().await;
    let report = result?;
    assert!(matches!(
        report.partial_failures().as_slice(),
        [RangeSortError::PartialFailure(Phase::Map, 1, 2)]
    ));
    assert!(!report.is_success());
    Ok(())
}

#[tokio::test]
async fn empty_dataset() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn Store> = Arc::new(LocalFsStore::new(dir.path()));
    let config = SortConfig::new(3, "/empty").with_generated_data(0, 1);

    let report = SortOrchestrator::try_new(config, store)?.run().await?;
    assert!(report.is_success(), "{report}");
    let verify = report.verify.expect("output was verified");
    assert!(verify.ok);
    assert_eq!(verify.total_rows, 0);
    Ok(())
}

#[tokio::test]
async fn stale_state_is_replaced() -> Result<()> {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let config = SortConfig::new(1, "/stale").with_rows_per_partition(1);
    write_inputs(store.as_ref(), &config, &[&["1"]]).await?;
    store.create_container(&config.shuffle_dir()).await?;
    store.create_container(&config.result_dir()).await?;

    let report = SortOrchestrator::try_new(config, store)?.run().await?;
    assert!(report.is_success(), "{report}");
    Ok(())
}

#[tokio::test]
async fn generate_only() -> Result<()> {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let config = SortConfig::new(2, "/gen")
        .with_generated_data(10, 3)
        .with_skip_sort(true)
        .with_retain_input(true);

    let report = SortOrchestrator::try_new(config.clone(), store.clone())?
        .run()
        .await?;
    let phases: Vec<Phase> = report.phases.iter().map(|p| p.phase).collect();
    assert_eq!(phases, vec![Phase::Generate]);
    assert!(store.exists(&config.partition_path(1)).await?);
    assert!(!store.exists(&config.result_dir()).await?);
    Ok(())
}

#[tokio::test]
async fn invalid_config_is_fatal() {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let result = SortOrchestrator::try_new(SortConfig::new(0, "/x"), store);
    assert!(matches!(result, Err(RangeSortError::Configuration(_))));
}
