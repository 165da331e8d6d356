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

//! Reports over a ledger populated through the public API.

use checkout_ledger::ingest::{create_user, import_products, import_purchases, record_purchase};
use checkout_ledger::report::{
    BEST_SELLER_TIERS, LOYALTY_THRESHOLD, best_sellers, loyal_customers, products,
    recent_purchase, unique_customers,
};
use checkout_ledger::{ProductId, PurchaseRequest, Store};
use rust_decimal_macros::dec;
use std::io::Cursor;

fn seeded(names: &[&str]) -> Store {
    let mut csv = String::from("product_name,unit_price\n");
    for name in names {
        csv.push_str(&format!("{name},1.00\n"));
    }
    let store = Store::in_memory();
    import_products(&store, Cursor::new(csv)).unwrap();
    store
}

fn buy(store: &Store, user: &str, items: &str) {
    record_purchase(
        store,
        &PurchaseRequest {
            supermarket_id: "S1".into(),
            user_id: user.into(),
            items_list: items.into(),
            ..Default::default()
        },
    )
    .unwrap();
}

#[test]
fn apple_and_banana_example() {
    let store = Store::in_memory();
    import_products(
        &store,
        Cursor::new("product_name,unit_price\napple,1.00\nbanana,2.00\n"),
    )
    .unwrap();

    let purchase = record_purchase(
        &store,
        &PurchaseRequest {
            supermarket_id: "S1".into(),
            user_id: "u-1".into(),
            items_list: "apple,banana".into(),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(purchase.total_amount, dec!(3.00));

    let sellers = best_sellers(&store, BEST_SELLER_TIERS);
    assert_eq!(sellers.len(), 2);
    assert!(sellers.iter().all(|s| s.total_purchases == 1));
    assert_eq!(sellers[0].product_id, ProductId(1));
    assert_eq!(sellers[1].product_id, ProductId(2));
}

#[test]
fn best_sellers_can_exceed_three_rows() {
    let store = seeded(&["a", "b", "c", "d", "e", "f"]);
    for _ in 0..3 {
        buy(&store, "u", "a,b");
    }
    for _ in 0..2 {
        buy(&store, "u", "c,d");
    }
    buy(&store, "u", "e");
    // f never sells and has no counter row.

    let sellers = best_sellers(&store, BEST_SELLER_TIERS);
    let names: Vec<_> = sellers.iter().map(|s| s.product_name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
}

#[test]
fn fourth_tier_is_dropped() {
    let store = seeded(&["a", "b", "c", "d"]);
    for (items, times) in [("a", 4), ("b", 3), ("c", 2), ("d", 1)] {
        for _ in 0..times {
            buy(&store, "u", items);
        }
    }

    let counts: Vec<_> = best_sellers(&store, BEST_SELLER_TIERS)
        .into_iter()
        .map(|s| s.total_purchases)
        .collect();
    assert_eq!(counts, vec![4, 3, 2]);
}

#[test]
fn loyal_customers_ties_by_user_id() {
    let store = seeded(&["a"]);
    for user in ["zoe", "adam", "mia"] {
        for _ in 0..LOYALTY_THRESHOLD {
            buy(&store, user, "a");
        }
    }
    buy(&store, "mia", "a");
    buy(&store, "once", "a");
    create_user(&store, "never").unwrap();

    let loyal: Vec<_> = loyal_customers(&store, LOYALTY_THRESHOLD)
        .into_iter()
        .map(|c| (c.user_id.0, c.total_purchases))
        .collect();
    assert_eq!(
        loyal,
        vec![
            ("mia".to_string(), 4),
            ("adam".to_string(), 3),
            ("zoe".to_string(), 3),
        ]
    );
    assert_eq!(unique_customers(&store), 5);
}

#[test]
fn recent_purchase_ties_go_to_later_commit() {
    let store = seeded(&["a"]);
    let csv = "supermarket_id,timestamp,user_id,items_list,total_amount\n\
               S1,2024-05-01T10:00:00Z,first,a,1.00\n\
               S1,2024-05-01T10:00:00Z,second,a,1.00\n\
               S1,2024-04-01T10:00:00Z,older,a,1.00\n";
    import_purchases(&store, Cursor::new(csv)).unwrap();

    assert_eq!(recent_purchase(&store).unwrap().user_id.as_str(), "second");
}

#[test]
fn products_listing_in_id_order() {
    let store = seeded(&["milk", "apple", "bread"]);
    let names: Vec<_> = products(&store).into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["milk", "apple", "bread"]);
}
