// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Header-checked CSV reading shared by the catalog and purchase uploads.

use crate::error::{LedgerError, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::de::DeserializeOwned;
use std::io::Read;

/// Reads every row of `input` into `T`, paired with its line number.
///
/// Uploads are all-or-nothing: the first malformed row fails the whole file,
/// so rows are collected before any of them touches the store.
pub(crate) fn read_rows<R: Read, T: DeserializeOwned>(
    input: R,
    required: &[&str],
) -> Result<Vec<(u64, T)>> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All) // " apple " and "apple" are the same product
        .has_headers(true)
        .from_reader(input);

    let headers = rdr.headers()?.clone();
    require_columns(&headers, required)?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        let row = record
            .deserialize(Some(&headers))
            .map_err(|e| LedgerError::MalformedCsv(e.to_string()).at_line(line))?;
        rows.push((line, row));
    }
    Ok(rows)
}

fn require_columns(headers: &StringRecord, required: &[&str]) -> Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(LedgerError::MissingColumns(required.join(", ")))
    }
}
