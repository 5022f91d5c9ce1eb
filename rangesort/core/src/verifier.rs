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

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use futures::StreamExt;
use log::{info, warn};

use crate::config::SortConfig;
use crate::error::Result;
use crate::store::Store;

/// The first pair of rows found out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderViolation {
    pub bucket: usize,
    /// Position of the offending row within its bucket.
    pub row: u64,
    pub previous_key: i32,
    pub key: i32,
}

impl Display for OrderViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "key {} at row {} of bucket {} follows key {}",
            self.key, self.row, self.bucket, self.previous_key
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyReport {
    pub ok: bool,
    pub total_rows: u64,
    pub expected_rows: u64,
    pub violation: Option<OrderViolation>,
}

impl Display for VerifyReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (&self.violation, self.ok) {
            (Some(v), _) => write!(f, "Check FAILED: {v}"),
            (None, true) => write!(f, "Check OK: {} rows sorted", self.total_rows),
            (None, false) => write!(
                f,
                "Check FAILED: found {} rows, expected {}",
                self.total_rows, self.expected_rows
            ),
        }
    }
}

/// Read-only scan of all sorted output partitions in bucket order.
#[derive(Debug, Clone)]
pub struct Verifier {
    store: Arc<dyn Store>,
    config: SortConfig,
}

impl Verifier {
    pub fn new(config: &SortConfig, store: Arc<dyn Store>) -> Self {
        Self {
            store,
            config: config.clone(),
        }
    }

    /// Checks that keys never decrease across buckets `0..worker_count` and that
    /// `worker_count * expected_rows_per_partition` rows were written.
    ///
    /// Stops at the first violation. A missing output counts as empty.
    pub async fn verify(
        &self,
        worker_count: usize,
        expected_rows_per_partition: u64,
    ) -> Result<VerifyReport> {
        let expected_rows = worker_count as u64 * expected_rows_per_partition;
        let mut total_rows = 0u64;
        let mut previous: Option<i32> = None;

        for bucket in 0..worker_count {
            let path = self.config.result_path(bucket);
            if !self.store.exists(&path).await? {
                warn!("Sorted output {path} is missing, counting it as empty");
                continue;
            }

            let mut rows = self.store.open_file(&path).await?;
            let mut index = 0u64;
            while let Some(row) = rows.next().await {
                let key = row?.sort_key(self.config.sort_column)?;
                if let Some(previous_key) = previous.filter(|p| *p > key) {
                    let report = VerifyReport {
                        ok: false,
                        total_rows: total_rows + index,
                        expected_rows,
                        violation: Some(OrderViolation {
                            bucket,
                            row: index,
                            previous_key,
                            key,
                        }),
                    };
                    warn!("{report}");
                    return Ok(report);
                }
                previous = Some(key);
                index += 1;
            }
            total_rows += index;
        }

        let report = VerifyReport {
            ok: total_rows == expected_rows,
            total_rows,
            expected_rows,
            violation: None,
        };
        if report.ok {
            info!("{report}");
        } else {
            warn!("{report}");
        }
        Ok(report)
    }
}
