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

//! Text rows and sort-key extraction.

use std::fmt::{Display, Formatter};

use crate::error::{RangeSortError, Result};

/// Separator between the integer fields of a row.
pub const FIELD_DELIMITER: char = ',';

/// One delimited line of integer fields, stored verbatim without its newline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row(String);

impl Row {
    pub fn new(line: impl Into<String>) -> Self {
        Row(line.into())
    }

    /// Renders the given fields as one comma-separated row.
    pub fn from_fields(fields: &[i32]) -> Self {
        let mut line = String::with_capacity(fields.len() * 11);
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                line.push(FIELD_DELIMITER);
            }
            line.push_str(&field.to_string());
        }
        Row(line)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Parses the field at `column` as a signed 32-bit sort key.
    ///
    /// Fields past `column` are not inspected, so a row only needs to be
    /// well formed up to its key.
    pub fn sort_key(&self, column: usize) -> Result<i32> {
        let field = self.0.split(FIELD_DELIMITER).nth(column).ok_or_else(|| {
            RangeSortError::ParseError(
                column,
                self.0.clone(),
                format!(
                    "row has only {} fields",
                    self.0.split(FIELD_DELIMITER).count()
                ),
            )
        })?;

        field.parse::<i32>().map_err(|e| {
            RangeSortError::ParseError(column, self.0.clone(), format!("'{field}': {e}"))
        })
    }

    /// Length in bytes of the encoded row including its trailing newline.
    pub fn encoded_len(&self) -> usize {
        self.0.len() + 1
    }
}

impl Display for Row {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Row {
    fn from(line: String) -> Self {
        Row(line)
    }
}

impl From<&str> for Row {
    fn from(line: &str) -> Self {
        Row(line.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key_by_column() -> Result<()> {
        let row = Row::from("5,-9,2147483647");
        assert_eq!(row.sort_key(0)?, 5);
        assert_eq!(row.sort_key(1)?, -9);
        assert_eq!(row.sort_key(2)?, i32::MAX);
        Ok(())
    }

    #[test]
    fn test_sort_key_ignores_fields_after_key() -> Result<()> {
        let row = Row::from("-2147483648,not-a-number");
        assert_eq!(row.sort_key(0)?, i32::MIN);
        Ok(())
    }

    #[test]
    fn test_sort_key_rejects_malformed_field() {
        let err = Row::from("1,abc,3").sort_key(1).unwrap_err();
        assert!(err.is_parse_error());

        // Out of i32 range.
        let err = Row::from("2147483648").sort_key(0).unwrap_err();
        assert!(err.is_parse_error());

        let err = Row::from("").sort_key(0).unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_sort_key_rejects_missing_column() {
        match Row::from("1,2").sort_key(4) {
            Err(RangeSortError::ParseError(column, row, desc)) => {
                assert_eq!(column, 4);
                assert_eq!(row, "1,2");
                assert_eq!(desc, "row has only 2 fields");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_from_fields() {
        assert_eq!(Row::from_fields(&[1, -2, 3]).as_str(), "1,-2,3");
        assert_eq!(Row::from_fields(&[7]).as_str(), "7");
        assert_eq!(Row::from_fields(&[7]).encoded_len(), 2);
    }
}
