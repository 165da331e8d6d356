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

//! # Checkout Ledger
//!
//! Purchase recording for supermarket cash registers, with a management
//! back office for catalog uploads, bulk purchase imports and reports.
//!
//! ## Core Components
//!
//! - [`Store`]: Transactional in-memory ledger, optionally persisted as a JSON snapshot
//! - [`ingest`]: Purchase recording, catalog upserts and CSV batch imports
//! - [`report`]: Loyal customers, unique customers, best sellers, recent purchase
//! - [`server`]: Cash register and management HTTP routes
//! - [`LedgerError`]: Error types for validation, lookup and persistence failures
//!
//! ## Example
//!
//! ```
//! use checkout_ledger::{PurchaseRequest, Store, ingest, report};
//! use rust_decimal_macros::dec;
//! use std::io::Cursor;
//!
//! let store = Store::in_memory();
//! let catalog = "product_name,unit_price\napple,0.50\nbanana,0.25\n";
//! ingest::import_products(&store, Cursor::new(catalog)).unwrap();
//!
//! let request = PurchaseRequest {
//!     supermarket_id: "S1".into(),
//!     user_id: "u-1".into(),
//!     items_list: "apple,banana".into(),
//!     ..Default::default()
//! };
//! let purchase = ingest::record_purchase(&store, &request).unwrap();
//! assert_eq!(purchase.total_amount, dec!(0.75));
//!
//! assert_eq!(report::unique_customers(&store), 1);
//! ```
//!
//! ## Thread Safety
//!
//! Every write runs under a single store-wide lock, so concurrent purchases
//! never lose a counter increment.

mod base;
pub mod catalog;
pub mod config;
mod csv_input;
pub mod customer;
pub mod error;
pub mod ingest;
pub mod purchase;
pub mod report;
pub mod server;
pub mod store;
pub mod telemetry;

pub use base::{ProductId, PurchaseId, StoreId, UserId};
pub use catalog::{CatalogEntry, Product};
pub use customer::{TotalUserPurchases, User};
pub use error::{ErrorKind, LedgerError, Result};
pub use purchase::{Purchase, PurchaseItem, PurchaseRequest};
pub use store::Store;
