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

//! Error types for ingestion, reporting and the backing store.

use thiserror::Error;

/// Result type alias using [`LedgerError`].
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Broad classification of a [`LedgerError`].
///
/// Validation and not-found errors are recoverable at the request boundary;
/// persistence errors fail the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Persistence,
}

/// Ledger errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Purchase lists no items at all
    #[error("item list is empty")]
    EmptyItemList,

    /// Item list has an empty segment or otherwise cannot be split
    #[error("malformed item list: {0}")]
    MalformedItemList(String),

    /// The same product is referenced twice in one purchase
    #[error("product '{0}' is listed more than once")]
    DuplicateItem(String),

    /// A scalar field failed validation
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Uploaded CSV lacks required columns
    #[error("CSV must have columns: {0}")]
    MissingColumns(String),

    /// Uploaded CSV could not be read
    #[error("malformed CSV: {0}")]
    MalformedCsv(String),

    /// Upload request carried no file
    #[error("no file uploaded")]
    MissingFile,

    /// Upload request body could not be read
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    /// Explicit user creation for an id that already exists
    #[error("user '{0}' already exists")]
    DuplicateUser(String),

    /// Referenced product is not in the catalog
    #[error("product '{0}' not found")]
    ProductNotFound(String),

    /// Referenced user does not exist
    #[error("user '{0}' not found")]
    UserNotFound(String),

    /// Store-level failure (snapshot I/O, id exhaustion)
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// A CSV batch row failed; the whole batch was rolled back
    #[error("line {line}: {source}")]
    Row {
        line: u64,
        #[source]
        source: Box<LedgerError>,
    },
}

impl LedgerError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        LedgerError::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Tags an error with the CSV line it came from.
    pub fn at_line(self, line: u64) -> Self {
        LedgerError::Row {
            line,
            source: Box::new(self),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::EmptyItemList
            | LedgerError::MalformedItemList(_)
            | LedgerError::DuplicateItem(_)
            | LedgerError::InvalidField { .. }
            | LedgerError::MissingColumns(_)
            | LedgerError::MalformedCsv(_)
            | LedgerError::MissingFile
            | LedgerError::InvalidUpload(_)
            | LedgerError::DuplicateUser(_) => ErrorKind::Validation,
            LedgerError::ProductNotFound(_) | LedgerError::UserNotFound(_) => ErrorKind::NotFound,
            LedgerError::Persistence(_) => ErrorKind::Persistence,
            LedgerError::Row { source, .. } => source.kind(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|pos| pos.line());
        let error = LedgerError::MalformedCsv(err.to_string());
        match line {
            Some(line) => error.at_line(line),
            None => error,
        }
    }
}
