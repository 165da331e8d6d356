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

//! Read-only reports over the ledgers.

use crate::base::{ProductId, UserId};
use crate::catalog::Product;
use crate::purchase::Purchase;
use crate::store::Store;
use serde::Serialize;
use std::cmp::Reverse;
use tracing::info;

/// Purchases a customer needs before counting as loyal.
pub const LOYALTY_THRESHOLD: u64 = 3;

/// Distinct sales counts the best-seller report keeps.
pub const BEST_SELLER_TIERS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoyalCustomer {
    pub user_id: UserId,
    pub total_purchases: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BestSeller {
    pub product_id: ProductId,
    pub product_name: String,
    pub total_purchases: u64,
}

/// Customers with at least `threshold` purchases, most purchases first.
pub fn loyal_customers(store: &Store, threshold: u64) -> Vec<LoyalCustomer> {
    let mut loyal: Vec<LoyalCustomer> = store.read(|t| {
        t.user_totals()
            .filter(|total| total.total_purchases >= threshold)
            .map(|total| LoyalCustomer {
                user_id: total.user_id.clone(),
                total_purchases: total.total_purchases,
            })
            .collect()
    });
    // Counter rows iterate in user-id order; the stable sort keeps it for ties.
    loyal.sort_by_key(|c| Reverse(c.total_purchases));

    info!(count = loyal.len(), threshold, "Loyal customers");
    loyal
}

/// Number of distinct customers.
pub fn unique_customers(store: &Store) -> usize {
    let count = store.read(|t| t.user_count());
    info!(count, "Unique customers");
    count
}

/// Products holding the `tiers` highest distinct sales counts.
///
/// Every product tied at a retained count is included, so the result may
/// have more than `tiers` rows. Ties are listed by product id.
///
/// ```text
/// counts: a=9 b=7 c=7 d=5 e=2   tiers=3  =>  a, b, c, d
/// ```
pub fn best_sellers(store: &Store, tiers: usize) -> Vec<BestSeller> {
    let mut ranked: Vec<BestSeller> = store.read(|t| {
        t.purchase_items()
            .filter_map(|item| {
                t.product(item.product_id).map(|product| BestSeller {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    total_purchases: item.total_purchases,
                })
            })
            .collect()
    });
    ranked.sort_by_key(|s| Reverse(s.total_purchases));

    let mut distinct = 0;
    let mut last = None;
    let cutoff = ranked
        .iter()
        .position(|seller| {
            if last != Some(seller.total_purchases) {
                last = Some(seller.total_purchases);
                distinct += 1;
            }
            distinct > tiers
        })
        .unwrap_or(ranked.len());
    ranked.truncate(cutoff);

    info!(count = ranked.len(), tiers, "Top selling products");
    ranked
}

/// Purchase with the latest timestamp; the later commit wins a tie.
pub fn recent_purchase(store: &Store) -> Option<Purchase> {
    store.read(|t| {
        t.purchases()
            .iter()
            .max_by_key(|p| (p.timestamp, p.id))
            .cloned()
    })
}

/// The catalog, ordered by product id.
pub fn products(store: &Store) -> Vec<Product> {
    store.read(|t| t.products().cloned().collect())
}
