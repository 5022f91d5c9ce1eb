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

//! Rangesort error types

use std::{
    error::Error,
    fmt::{Display, Formatter},
    io, result,
};

use crate::phase::Phase;

/// Result type alias for rangesort operations.
pub type Result<T> = result::Result<T, RangeSortError>;

/// Error types raised by the sort pipeline.
#[derive(Debug)]
pub enum RangeSortError {
    /// A row's sort-key field is missing or not a valid 32-bit integer:
    /// (column index, offending row, description).
    ParseError(usize, String, String),
    /// Create/open/read/write/delete failure against the store: (path, cause).
    StoreIoError(String, io::Error),
    /// Some tasks of a phase failed while the rest succeeded:
    /// (phase, failed task count, total task count).
    PartialFailure(Phase, usize, usize),
    /// Configuration error with invalid settings.
    Configuration(String),
    /// General error with a descriptive message.
    General(String),
    /// Internal error indicating a bug or unexpected state.
    Internal(String),
    /// Tokio task join error.
    TokioError(tokio::task::JoinError),
}

#[allow(clippy::from_over_into)]
impl<T> Into<Result<T>> for RangeSortError {
    fn into(self) -> Result<T> {
        Err(self)
    }
}

impl RangeSortError {
    /// Wraps an I/O error with the store path it happened on.
    pub fn store_io(path: impl Into<String>, e: io::Error) -> Self {
        RangeSortError::StoreIoError(path.into(), e)
    }

    /// Whether this error came from parsing row data rather than from the store.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, RangeSortError::ParseError(..))
    }
}

impl From<String> for RangeSortError {
    fn from(e: String) -> Self {
        RangeSortError::General(e)
    }
}

impl From<tokio::task::JoinError> for RangeSortError {
    fn from(e: tokio::task::JoinError) -> Self {
        RangeSortError::TokioError(e)
    }
}

impl Display for RangeSortError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            RangeSortError::ParseError(column, row, desc) => {
                write!(f, "Parse error: column {column} of row '{row}': {desc}")
            }
            RangeSortError::StoreIoError(path, desc) => {
                write!(f, "Store IO error at {path}: {desc}")
            }
            RangeSortError::PartialFailure(phase, failed, total) => {
                write!(f, "Partial failure: {failed} of {total} {phase} tasks failed")
            }
            RangeSortError::Configuration(desc) => {
                write!(f, "Configuration error: {desc}")
            }
            RangeSortError::General(desc) => write!(f, "General error: {desc}"),
            RangeSortError::Internal(desc) => {
                write!(f, "Internal rangesort error: {desc}")
            }
            RangeSortError::TokioError(desc) => write!(f, "Tokio join error: {desc}"),
        }
    }
}

impl Error for RangeSortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RangeSortError::StoreIoError(_, e) => Some(e),
            RangeSortError::TokioError(e) => Some(e),
            _ => None,
        }
    }
}
