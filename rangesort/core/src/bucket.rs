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

//! Range partitioning of the signed 32-bit key domain into equal-width buckets.

use std::ops::RangeInclusive;

use crate::error::{RangeSortError, Result};

/// Size of the `[i32::MIN, i32::MAX]` key domain.
const KEY_DOMAIN: u64 = 1 << 32;

/// Splits the key domain into `count` contiguous intervals of `2^32 / count` keys.
/// The last bucket absorbs the remainder so the union is the whole domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketBoundaries {
    count: usize,
    width: u64,
}

impl BucketBoundaries {
    pub fn try_new(count: usize) -> Result<Self> {
        if count == 0 || count as u64 > KEY_DOMAIN {
            return Err(RangeSortError::Configuration(format!(
                "bucket count must be in [1, 2^32], got {count}"
            )));
        }
        Ok(Self {
            count,
            width: KEY_DOMAIN / count as u64,
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    /// Smallest key assigned to `bucket`.
    pub fn lower_bound(&self, bucket: usize) -> i64 {
        i32::MIN as i64 + (bucket as u64 * self.width) as i64
    }

    /// Largest key assigned to `bucket`, inclusive.
    pub fn upper_bound(&self, bucket: usize) -> i64 {
        if bucket + 1 >= self.count {
            i32::MAX as i64
        } else {
            self.lower_bound(bucket + 1) - 1
        }
    }

    pub fn range(&self, bucket: usize) -> RangeInclusive<i64> {
        self.lower_bound(bucket)..=self.upper_bound(bucket)
    }

    /// Highest bucket whose lower bound is `<= key`.
    pub fn bucket_for(&self, key: i32) -> usize {
        let offset = (key as i64 - i32::MIN as i64) as u64;
        ((offset / self.width) as usize).min(self.count - 1)
    }
}
