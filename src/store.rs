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

//! Transactional in-memory store backing the catalog, customer and sales ledgers.
//!
//! # Transactions
//!
//! Every write goes through [`Store::transaction`]. The closure receives a
//! [`Transaction`] holding the store's write lock; each mutation records its
//! inverse in an undo journal. When the closure fails (or panics) the journal
//! is replayed backwards and the tables are exactly as they were before.
//!
//! ```text
//!  begin ──► mutate (journal undo) ──► Ok ──► persist snapshot ──► commit
//!                    │                             │
//!                    └──────── Err ◄───────────────┘ (write failed)
//!                               │
//!                               ▼
//!                     replay journal backwards
//! ```
//!
//! # Thread Safety
//!
//! All tables sit behind one [`RwLock`]. Writers are serialised, so counter
//! increments are read-modify-write under the lock and never lose updates.
//! Reporting queries share the read lock via [`Store::read`].
//!
//! # Durability
//!
//! A store opened with [`Store::open`] writes a JSON snapshot of every table
//! after each transaction that changed something, via a temporary file and a
//! rename. If the write fails the transaction is rolled back and the caller
//! gets [`LedgerError::Persistence`].

use crate::base::{ProductId, PurchaseId, StoreId, UserId};
use crate::catalog::{CatalogEntry, Product};
use crate::customer::{TotalUserPurchases, User};
use crate::error::{LedgerError, Result};
use crate::purchase::{ProductRef, Purchase, PurchaseItem};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Write};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Last identifier handed out per table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Sequences {
    product: u32,
    user: u32,
    purchase: u64,
    purchase_item: u32,
}

fn next_u32(last: &mut u32, table: &str) -> Result<u32> {
    *last = last
        .checked_add(1)
        .ok_or_else(|| LedgerError::Persistence(format!("{table} ids exhausted")))?;
    Ok(*last)
}

/// All ledger tables.
///
/// Read access is public; mutation only happens through [`Transaction`].
#[derive(Debug, Default)]
pub struct Tables {
    products: BTreeMap<ProductId, Product>,
    product_names: HashMap<String, ProductId>,
    users: BTreeMap<UserId, User>,
    user_totals: BTreeMap<UserId, TotalUserPurchases>,
    /// Insertion order; ids are increasing.
    purchases: Vec<Purchase>,
    purchase_items: BTreeMap<ProductId, PurchaseItem>,
    sequences: Sequences,
}

impl Tables {
    /// Products ordered by id.
    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    pub fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.get(&id)
    }

    pub fn product_by_name(&self, name: &str) -> Option<&Product> {
        self.product_names
            .get(name)
            .and_then(|id| self.products.get(id))
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn user(&self, user_id: &UserId) -> Option<&User> {
        self.users.get(user_id)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn user_totals(&self) -> impl Iterator<Item = &TotalUserPurchases> {
        self.user_totals.values()
    }

    /// Purchase counter for a user, `None` when the user has no counter row.
    pub fn user_total(&self, user_id: &UserId) -> Option<u64> {
        self.user_totals.get(user_id).map(|t| t.total_purchases)
    }

    /// Purchases in commit order.
    pub fn purchases(&self) -> &[Purchase] {
        &self.purchases
    }

    pub fn purchase_items(&self) -> impl Iterator<Item = &PurchaseItem> {
        self.purchase_items.values()
    }

    pub fn purchase_item(&self, product_id: ProductId) -> Option<&PurchaseItem> {
        self.purchase_items.get(&product_id)
    }

    /// Resolves every reference in one pass over the catalog.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::ProductNotFound`] for the first unknown reference.
    /// - [`LedgerError::DuplicateItem`] when two references (say a name and an
    ///   id) land on the same product.
    ///
    /// A register token resolves by exact name and only then by id.
    pub fn resolve_products(&self, refs: &[ProductRef]) -> Result<Vec<Product>> {
        let mut seen = HashSet::with_capacity(refs.len());
        let mut resolved = Vec::with_capacity(refs.len());

        for product_ref in refs {
            // Exact name first, so all-digit names are never shadowed by ids.
            let product = self
                .product_by_name(product_ref.token())
                .or_else(|| product_ref.fallback_id().and_then(|id| self.product(id)))
                .ok_or_else(|| LedgerError::ProductNotFound(product_ref.to_string()))?;

            if !seen.insert(product.id) {
                return Err(LedgerError::DuplicateItem(product.name.clone()));
            }
            resolved.push(product.clone());
        }

        Ok(resolved)
    }
}

/// How an upsert changed the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductChange {
    Created(ProductId),
    Updated(ProductId),
    Unchanged(ProductId),
}

/// Purchase ready to be inserted; the store assigns its id.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub supermarket_id: StoreId,
    pub timestamp: DateTime<Utc>,
    pub user_id: UserId,
    pub items_list: String,
    pub total_amount: Decimal,
}

/// Inverse of one mutation.
#[derive(Debug)]
enum Undo {
    ProductInserted(ProductId),
    PriceChanged { id: ProductId, previous: Decimal },
    UserInserted(UserId),
    UserTotalIncremented(UserId),
    ItemInserted(ProductId),
    ItemIncremented(ProductId),
    PurchaseInserted,
}

/// Write access to the tables for the duration of one unit of work.
///
/// Dereferences to [`Tables`] for reads. Dropping an uncommitted transaction
/// rolls it back.
pub struct Transaction<'a> {
    tables: &'a mut Tables,
    undo: Vec<Undo>,
    sequences_at_start: Sequences,
    committed: bool,
}

impl<'a> Transaction<'a> {
    fn begin(tables: &'a mut Tables) -> Self {
        let sequences_at_start = tables.sequences;
        Self {
            tables,
            undo: Vec::new(),
            sequences_at_start,
            committed: false,
        }
    }

    fn is_dirty(&self) -> bool {
        !self.undo.is_empty()
    }

    fn commit(mut self) {
        self.undo.clear();
        self.committed = true;
    }

    fn rollback(&mut self) {
        let tables = &mut *self.tables;
        // Newest first
        for undo in self.undo.drain(..).rev() {
            match undo {
                Undo::ProductInserted(id) => {
                    if let Some(product) = tables.products.remove(&id) {
                        tables.product_names.remove(&product.name);
                    }
                }
                Undo::PriceChanged { id, previous } => {
                    if let Some(product) = tables.products.get_mut(&id) {
                        product.unit_price = previous;
                    }
                }
                Undo::UserInserted(user_id) => {
                    tables.users.remove(&user_id);
                    tables.user_totals.remove(&user_id);
                }
                Undo::UserTotalIncremented(user_id) => {
                    if let Some(total) = tables.user_totals.get_mut(&user_id) {
                        total.total_purchases -= 1;
                    }
                }
                Undo::ItemInserted(product_id) => {
                    tables.purchase_items.remove(&product_id);
                }
                Undo::ItemIncremented(product_id) => {
                    if let Some(item) = tables.purchase_items.get_mut(&product_id) {
                        item.total_purchases -= 1;
                    }
                }
                Undo::PurchaseInserted => {
                    tables.purchases.pop();
                }
            }
        }
        tables.sequences = self.sequences_at_start;
    }

    /// Inserts a product or updates the price of the product with the same name.
    pub fn upsert_product(&mut self, entry: &CatalogEntry) -> Result<ProductChange> {
        if let Some(&id) = self.tables.product_names.get(&entry.name) {
            let Some(product) = self.tables.products.get_mut(&id) else {
                return Err(LedgerError::Persistence(format!(
                    "name index points at missing product {id}"
                )));
            };
            if product.unit_price == entry.unit_price {
                return Ok(ProductChange::Unchanged(id));
            }
            debug!(product = %entry.name, from = %product.unit_price, to = %entry.unit_price, "Updating price");
            let previous = std::mem::replace(&mut product.unit_price, entry.unit_price);
            self.undo.push(Undo::PriceChanged { id, previous });
            return Ok(ProductChange::Updated(id));
        }

        // New name
        let id = ProductId(next_u32(&mut self.tables.sequences.product, "product")?);
        self.tables.products.insert(
            id,
            Product {
                id,
                name: entry.name.clone(),
                unit_price: entry.unit_price,
            },
        );
        self.tables.product_names.insert(entry.name.clone(), id);
        self.undo.push(Undo::ProductInserted(id));
        Ok(ProductChange::Created(id))
    }

    /// Inserts a user together with a zeroed purchase counter.
    ///
    /// # Errors
    ///
    /// [`LedgerError::DuplicateUser`] if the user already exists.
    pub fn insert_user(&mut self, user_id: &UserId) -> Result<User> {
        if self.tables.users.contains_key(user_id) {
            return Err(LedgerError::DuplicateUser(user_id.to_string()));
        }
        let user = User {
            id: next_u32(&mut self.tables.sequences.user, "user")?,
            user_id: user_id.clone(),
        };
        self.tables.users.insert(user_id.clone(), user.clone());
        self.tables.user_totals.insert(
            user_id.clone(),
            TotalUserPurchases {
                user_id: user_id.clone(),
                total_purchases: 0,
            },
        );
        self.undo.push(Undo::UserInserted(user_id.clone()));
        Ok(user)
    }

    /// Returns the user, creating it (with a zeroed counter) on first sight.
    pub fn get_or_insert_user(&mut self, user_id: &UserId) -> Result<User> {
        match self.tables.users.get(user_id) {
            Some(user) => Ok(user.clone()),
            None => self.insert_user(user_id),
        }
    }

    /// Adds one to the user's purchase counter and returns the new value.
    ///
    /// A user without a counter row gets one created at 1.
    pub fn increment_user_purchases(&mut self, user_id: &UserId) -> Result<u64> {
        if !self.tables.users.contains_key(user_id) {
            return Err(LedgerError::UserNotFound(user_id.to_string()));
        }
        let total = self
            .tables
            .user_totals
            .entry(user_id.clone())
            .or_insert_with(|| TotalUserPurchases {
                user_id: user_id.clone(),
                total_purchases: 0,
            });
        total.total_purchases += 1;
        let count = total.total_purchases;
        self.undo.push(Undo::UserTotalIncremented(user_id.clone()));
        Ok(count)
    }

    /// Adds one to the product's sales counter, creating the row at 1 on first sale.
    pub fn increment_product_purchases(&mut self, product_id: ProductId) -> Result<u64> {
        if !self.tables.products.contains_key(&product_id) {
            return Err(LedgerError::ProductNotFound(product_id.to_string()));
        }
        if let Some(item) = self.tables.purchase_items.get_mut(&product_id) {
            item.total_purchases += 1;
            let count = item.total_purchases;
            self.undo.push(Undo::ItemIncremented(product_id));
            return Ok(count);
        }

        // First sale of this product
        let id = next_u32(&mut self.tables.sequences.purchase_item, "purchase item")?;
        self.tables.purchase_items.insert(
            product_id,
            PurchaseItem {
                id,
                product_id,
                total_purchases: 1,
            },
        );
        self.undo.push(Undo::ItemInserted(product_id));
        Ok(1)
    }

    pub fn insert_purchase(&mut self, purchase: NewPurchase) -> Result<Purchase> {
        let sequence = &mut self.tables.sequences.purchase;
        *sequence = sequence
            .checked_add(1)
            .ok_or_else(|| LedgerError::Persistence("purchase ids exhausted".into()))?;

        let purchase = Purchase {
            id: PurchaseId(*sequence),
            supermarket_id: purchase.supermarket_id,
            timestamp: purchase.timestamp,
            user_id: purchase.user_id,
            items_list: purchase.items_list,
            total_amount: purchase.total_amount,
        };
        self.tables.purchases.push(purchase.clone());
        self.undo.push(Undo::PurchaseInserted);
        Ok(purchase)
    }
}

impl Deref for Transaction<'_> {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        &*self.tables
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}

/// Shared handle to the ledger tables.
///
/// Pass it explicitly (`&Store`, or `Arc<Store>` across handlers) to the
/// ingestion and reporting functions.
#[derive(Debug, Default)]
pub struct Store {
    tables: RwLock<Tables>,
    snapshot_path: Option<PathBuf>,
}

impl Store {
    /// Creates an empty store that keeps nothing on disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens a store persisted at `path`, loading the snapshot if one exists.
    ///
    /// A missing file is an empty store; it is created on the first commit.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| {
                LedgerError::Persistence(format!("reading {}: {e}", path.display()))
            })?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
                LedgerError::Persistence(format!("decoding {}: {e}", path.display()))
            })?;
            let tables = snapshot.into_tables()?;
            info!(
                path = %path.display(),
                products = tables.products.len(),
                users = tables.users.len(),
                purchases = tables.purchases.len(),
                "Loaded ledger snapshot"
            );
            tables
        } else {
            info!(path = %path.display(), "Starting with an empty ledger");
            Tables::default()
        };

        Ok(Self {
            tables: RwLock::new(tables),
            snapshot_path: Some(path),
        })
    }

    /// Runs `work` as one atomic unit.
    ///
    /// Either every mutation made by `work` is kept (and persisted, for
    /// file-backed stores) or none is.
    pub fn transaction<T>(&self, work: impl FnOnce(&mut Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut tables = self.tables.write();
        let mut tx = Transaction::begin(&mut *tables);

        // Persist only when something changed
        let result = match work(&mut tx) {
            Ok(value) if tx.is_dirty() => self.persist(&tx).map(|()| value),
            other => other,
        };

        match result {
            Ok(value) => {
                tx.commit();
                Ok(value)
            }
            Err(err) => {
                // Dropping `tx` replays the undo journal.
                drop(tx);
                Err(err)
            }
        }
    }

    /// Runs a read-only query against a consistent view of the tables.
    pub fn read<T>(&self, query: impl FnOnce(&Tables) -> T) -> T {
        query(&self.tables.read())
    }

    fn persist(&self, tables: &Tables) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let bytes = serde_json::to_vec(&SnapshotRef::from(tables))
            .map_err(|e| LedgerError::Persistence(format!("encoding snapshot: {e}")))?;

        let tmp = tmp_path(path);

        // Flush the new snapshot fully before it replaces the old one.
        let written = write_synced(&tmp, &bytes).and_then(|()| fs::rename(&tmp, path));
        if let Err(e) = written {
            // The rename never happened, so the old snapshot is intact.
            if let Err(cleanup) = fs::remove_file(&tmp) {
                debug!(path = %tmp.display(), error = %cleanup, "No temporary snapshot to remove");
            }
            return Err(LedgerError::Persistence(format!(
                "writing {}: {e}",
                path.display()
            )));
        }
        Ok(())
    }
}

/// Sibling file the snapshot is staged in before the rename.
fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// On-disk form of the tables, one array per table.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    products: Vec<&'a Product>,
    users: Vec<&'a User>,
    user_totals: Vec<&'a TotalUserPurchases>,
    purchases: &'a [Purchase],
    purchase_items: Vec<&'a PurchaseItem>,
    sequences: Sequences,
}

impl<'a> From<&'a Tables> for SnapshotRef<'a> {
    fn from(tables: &'a Tables) -> Self {
        Self {
            products: tables.products.values().collect(),
            users: tables.users.values().collect(),
            user_totals: tables.user_totals.values().collect(),
            purchases: &tables.purchases,
            purchase_items: tables.purchase_items.values().collect(),
            sequences: tables.sequences,
        }
    }
}

#[derive(Deserialize)]
struct Snapshot {
    products: Vec<Product>,
    users: Vec<User>,
    user_totals: Vec<TotalUserPurchases>,
    purchases: Vec<Purchase>,
    purchase_items: Vec<PurchaseItem>,
    sequences: Sequences,
}

impl Snapshot {
    /// Rebuilds the tables and their indexes, rejecting rows that break uniqueness.
    fn into_tables(self) -> Result<Tables> {
        let corrupt = |what: String| LedgerError::Persistence(format!("corrupt snapshot: {what}"));
        let mut tables = Tables {
            sequences: self.sequences,
            ..Tables::default()
        };

        for product in self.products {
            if tables.product_names.insert(product.name.clone(), product.id).is_some() {
                return Err(corrupt(format!("duplicate product name '{}'", product.name)));
            }
            tables.products.insert(product.id, product);
        }
        for user in self.users {
            if tables.users.insert(user.user_id.clone(), user).is_some() {
                return Err(corrupt("duplicate user".into()));
            }
        }
        for total in self.user_totals {
            tables.user_totals.insert(total.user_id.clone(), total);
        }
        for item in self.purchase_items {
            if tables.purchase_items.insert(item.product_id, item).is_some() {
                return Err(corrupt("duplicate purchase item".into()));
            }
        }
        tables.purchases = self.purchases;

        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(name: &str, price: Decimal) -> CatalogEntry {
        CatalogEntry {
            name: name.into(),
            unit_price: price,
        }
    }

    #[test]
    fn upsert_creates_then_updates() {
        let store = Store::in_memory();
        let change = store
            .transaction(|tx| tx.upsert_product(&entry("apple", dec!(1.00))))
            .unwrap();
        assert_eq!(change, ProductChange::Created(ProductId(1)));

        let change = store
            .transaction(|tx| tx.upsert_product(&entry("apple", dec!(1.20))))
            .unwrap();
        assert_eq!(change, ProductChange::Updated(ProductId(1)));

        let change = store
            .transaction(|tx| tx.upsert_product(&entry("apple", dec!(1.20))))
            .unwrap();
        assert_eq!(change, ProductChange::Unchanged(ProductId(1)));

        store.read(|t| {
            assert_eq!(t.products().count(), 1);
            assert_eq!(t.product_by_name("apple").unwrap().unit_price, dec!(1.20));
        });
    }

    #[test]
    fn failed_transaction_rolls_back_every_table() {
        let store = Store::in_memory();
        store
            .transaction(|tx| tx.upsert_product(&entry("apple", dec!(1.00))))
            .unwrap();

        let result: Result<()> = store.transaction(|tx| {
            tx.upsert_product(&entry("apple", dec!(9.99)))?;
            tx.upsert_product(&entry("pear", dec!(0.50)))?;
            let user = UserId("u-1".into());
            tx.get_or_insert_user(&user)?;
            tx.increment_user_purchases(&user)?;
            tx.increment_product_purchases(ProductId(1))?;
            tx.insert_purchase(NewPurchase {
                supermarket_id: StoreId("S1".into()),
                timestamp: Utc::now(),
                user_id: user.clone(),
                items_list: "apple".into(),
                total_amount: dec!(9.99),
            })?;
            Err(LedgerError::ProductNotFound("kiwi".into()))
        });
        assert_eq!(result, Err(LedgerError::ProductNotFound("kiwi".into())));

        store.read(|t| {
            assert_eq!(t.products().count(), 1);
            assert_eq!(t.product_by_name("apple").unwrap().unit_price, dec!(1.00));
            assert!(t.product_by_name("pear").is_none());
            assert_eq!(t.user_count(), 0);
            assert_eq!(t.user_totals().count(), 0);
            assert_eq!(t.purchase_items().count(), 0);
            assert!(t.purchases().is_empty());
            assert_eq!(t.sequences, Sequences { product: 1, ..Sequences::default() });
        });
    }

    #[test]
    fn rolled_back_ids_are_reused() {
        let store = Store::in_memory();
        let _ = store.transaction(|tx| {
            tx.upsert_product(&entry("ghost", dec!(1)))?;
            Err::<(), _>(LedgerError::MissingFile)
        });
        let change = store
            .transaction(|tx| tx.upsert_product(&entry("apple", dec!(1))))
            .unwrap();
        assert_eq!(change, ProductChange::Created(ProductId(1)));
    }

    #[test]
    fn counters_increment_in_place() {
        let store = Store::in_memory();
        let user = UserId("u-1".into());
        let counts = store
            .transaction(|tx| {
                let id = match tx.upsert_product(&entry("apple", dec!(1)))? {
                    ProductChange::Created(id) => id,
                    other => panic!("unexpected {other:?}"),
                };
                tx.insert_user(&user)?;
                let a = tx.increment_user_purchases(&user)?;
                let b = tx.increment_user_purchases(&user)?;
                let c = tx.increment_product_purchases(id)?;
                let d = tx.increment_product_purchases(id)?;
                Ok((a, b, c, d))
            })
            .unwrap();
        assert_eq!(counts, (1, 2, 1, 2));
        store.read(|t| {
            assert_eq!(t.user_total(&user), Some(2));
            assert_eq!(t.purchase_items().count(), 1);
        });
    }

    #[test]
    fn duplicate_user_insert_is_rejected() {
        let store = Store::in_memory();
        let user = UserId("u-1".into());
        store.transaction(|tx| tx.insert_user(&user)).unwrap();
        let result = store.transaction(|tx| tx.insert_user(&user));
        assert_eq!(result, Err(LedgerError::DuplicateUser("u-1".into())));
    }

    #[test]
    fn increments_require_existing_rows() {
        let store = Store::in_memory();
        assert_eq!(
            store.transaction(|tx| tx.increment_user_purchases(&UserId("nobody".into()))),
            Err(LedgerError::UserNotFound("nobody".into()))
        );
        assert_eq!(
            store.transaction(|tx| tx.increment_product_purchases(ProductId(42))),
            Err(LedgerError::ProductNotFound("42".into()))
        );
    }

    #[test]
    fn resolve_rejects_aliases_of_the_same_product() {
        let store = Store::in_memory();
        store
            .transaction(|tx| tx.upsert_product(&entry("apple", dec!(1))))
            .unwrap();
        let refs = vec![ProductRef::parse("apple"), ProductRef::parse("1")];
        let result = store.read(|t| t.resolve_products(&refs));
        assert_eq!(result, Err(LedgerError::DuplicateItem("apple".into())));
    }

    #[test]
    fn resolve_prefers_exact_name_over_id() {
        let store = Store::in_memory();
        store
            .transaction(|tx| {
                tx.upsert_product(&entry("apple", dec!(1)))?;
                tx.upsert_product(&entry("1", dec!(9)))
            })
            .unwrap();

        let names = |token: &str| {
            store.read(|t| {
                t.resolve_products(&[ProductRef::parse(token)])
                    .map(|products| products[0].name.clone())
            })
        };
        assert_eq!(names("1"), Ok("1".to_string()));
        assert_eq!(names("2"), Ok("1".to_string()));
        assert_eq!(names("+1"), Err(LedgerError::ProductNotFound("+1".into())));

        // Batch names never fall back to ids.
        let refs = [ProductRef::Name("2".into())];
        assert_eq!(
            store.read(|t| t.resolve_products(&refs)),
            Err(LedgerError::ProductNotFound("2".into()))
        );
    }

    #[test]
    fn resolve_reports_first_missing_reference() {
        let store = Store::in_memory();
        let refs = vec![ProductRef::parse("9"), ProductRef::Name("kiwi".into())];
        let result = store.read(|t| t.resolve_products(&refs));
        assert_eq!(result, Err(LedgerError::ProductNotFound("9".into())));
    }

    #[test]
    #[allow(unreachable_code)]
    fn panicking_work_is_rolled_back() {
        let store = Store::in_memory();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = store.transaction(|tx| {
                tx.upsert_product(&entry("apple", dec!(1)))?;
                panic!("boom");
                Ok(())
            });
        }));
        assert!(outcome.is_err());
        store.read(|t| assert_eq!(t.products().count(), 0));
    }
}
