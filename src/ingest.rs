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

//! Purchase and catalog ingestion.
//!
//! # Purchase processing
//!
//! 1. Validate the submission: ids present, item list non-empty, no repeats.
//! 2. Resolve every product reference in one catalog lookup.
//! 3. Total = sum of the resolved unit prices. The client's total is never used.
//! 4. Create the user on first sight; bump its purchase counter.
//! 5. Bump each product's sales counter once.
//! 6. Insert the purchase.
//!
//! Steps 2–6 run inside one [`Store::transaction`]; an unknown product at
//! step 2 or any later failure leaves every table untouched.
//!
//! # Batches
//!
//! CSV uploads apply every row inside a single transaction. The first bad
//! row aborts the file and nothing from it is kept.

use crate::base::UserId;
use crate::catalog::{self, CatalogEntry};
use crate::customer::{User, validate_user_id};
use crate::error::Result;
use crate::purchase::{self, Purchase, PurchaseRequest, Submission};
use crate::store::{NewPurchase, ProductChange, Store, Transaction};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Read;
use tracing::{info, warn};

/// Outcome of a catalog upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl CatalogSummary {
    /// Number of rows in the upload.
    pub fn loaded(&self) -> usize {
        self.created + self.updated + self.unchanged
    }
}

/// Outcome of a purchase upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub inserted: usize,
    pub total_amount: Decimal,
}

/// Records one purchase from the cash register.
///
/// # Errors
///
/// - Validation errors for missing ids, empty, malformed or repeated items.
/// - [`LedgerError::ProductNotFound`](crate::LedgerError::ProductNotFound) when
///   any item is not in the catalog. Nothing is written.
/// - [`LedgerError::Persistence`](crate::LedgerError::Persistence) when the
///   store cannot save the result.
pub fn record_purchase(store: &Store, request: &PurchaseRequest) -> Result<Purchase> {
    let submission = request.validate().inspect_err(|e| {
        warn!(user_id = %request.user_id, error = %e, "Rejected purchase");
    })?;
    record_submission(store, &submission)
}

/// Records an already validated submission.
pub fn record_submission(store: &Store, submission: &Submission) -> Result<Purchase> {
    let purchase = store
        .transaction(|tx| apply_submission(tx, submission))
        .inspect_err(|e| {
            warn!(user_id = %submission.user_id, error = %e, "Rejected purchase");
        })?;

    info!(
        purchase_id = %purchase.id,
        user_id = %purchase.user_id,
        total = %purchase.total_amount,
        "Purchase recorded"
    );
    Ok(purchase)
}

fn apply_submission(tx: &mut Transaction<'_>, submission: &Submission) -> Result<Purchase> {
    // Resolve every item before touching any counter
    let products = tx.resolve_products(&submission.items)?;
    let total_amount: Decimal = products.iter().map(|p| p.unit_price).sum();

    if let Some(claimed) = submission.claimed_total.filter(|c| *c != total_amount) {
        warn!(
            user_id = %submission.user_id,
            claimed = %claimed,
            computed = %total_amount,
            "Client total disagrees with catalog prices; using catalog total"
        );
    }

    // Bump the customer and product counters
    tx.get_or_insert_user(&submission.user_id)?;
    tx.increment_user_purchases(&submission.user_id)?;
    for product in &products {
        tx.increment_product_purchases(product.id)?;
    }

    // Store canonical names, whatever form the register sent
    let items_list = products
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(",");

    tx.insert_purchase(NewPurchase {
        supermarket_id: submission.store_id.clone(),
        timestamp: submission.timestamp.unwrap_or_else(Utc::now),
        user_id: submission.user_id.clone(),
        items_list,
        total_amount,
    })
}

/// Applies a `purchases.csv` upload as one transaction.
pub fn import_purchases<R: Read>(store: &Store, input: R) -> Result<BatchSummary> {
    // Parse and validate the whole file first
    let rows = purchase::read_purchases(input).inspect_err(|e| {
        warn!(error = %e, "Rejected purchases upload");
    })?;
    info!(rows = rows.len(), "Uploading purchases");

    // Apply all rows in one transaction
    let summary = store
        .transaction(|tx| {
            let mut summary = BatchSummary::default();
            for (line, submission) in &rows {
                let purchase = apply_submission(tx, submission).map_err(|e| e.at_line(*line))?;
                summary.inserted += 1;
                summary.total_amount += purchase.total_amount;
            }
            Ok(summary)
        })
        .inspect_err(|e| {
            warn!(error = %e, "Purchases upload rolled back");
        })?;

    info!(inserted = summary.inserted, "Loaded purchases");
    Ok(summary)
}

/// Applies a `products.csv` upload as one transaction.
///
/// Re-uploading the same file changes nothing: existing names keep their id
/// and only prices are overwritten.
pub fn import_products<R: Read>(store: &Store, input: R) -> Result<CatalogSummary> {
    let entries = catalog::read_catalog(input).inspect_err(|e| {
        warn!(error = %e, "Rejected products upload");
    })?;
    info!(rows = entries.len(), "Uploading products");

    let summary = store.transaction(|tx| upsert_catalog(tx, &entries))?;

    info!(
        created = summary.created,
        updated = summary.updated,
        unchanged = summary.unchanged,
        "Loaded products"
    );
    Ok(summary)
}

fn upsert_catalog(tx: &mut Transaction<'_>, entries: &[CatalogEntry]) -> Result<CatalogSummary> {
    let mut summary = CatalogSummary::default();
    for entry in entries {
        match tx.upsert_product(entry)? {
            ProductChange::Created(_) => summary.created += 1,
            ProductChange::Updated(_) => summary.updated += 1,
            ProductChange::Unchanged(_) => summary.unchanged += 1,
        }
    }
    Ok(summary)
}

/// Registers a customer ahead of their first purchase.
///
/// # Errors
///
/// [`LedgerError::DuplicateUser`](crate::LedgerError::DuplicateUser) if the id is taken.
pub fn create_user(store: &Store, user_id: &str) -> Result<User> {
    let user_id: UserId = validate_user_id(user_id)?;
    let user = store.transaction(|tx| tx.insert_user(&user_id))?;
    info!(user_id = %user.user_id, "User created");
    Ok(user)
}
