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

//! Product catalog records and the `products.csv` schema.
//!
//! # Example
//!
//! ```
//! use checkout_ledger::catalog::CatalogEntry;
//! use rust_decimal::Decimal;
//!
//! let entry = CatalogEntry::new(" apple ", "1.25").unwrap();
//! assert_eq!(entry.name, "apple");
//! assert_eq!(entry.unit_price, Decimal::new(125, 2));
//! ```

use crate::base::ProductId;
use crate::csv_input;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::str::FromStr;

/// Columns `products.csv` must carry.
pub const CATALOG_COLUMNS: [&str; 2] = ["product_name", "unit_price"];

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
}

/// A validated name/price pair, ready to be upserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub unit_price: Decimal,
}

impl CatalogEntry {
    pub fn new(name: &str, unit_price: &str) -> Result<Self> {
        Ok(Self {
            name: validate_name(name)?,
            unit_price: parse_price(unit_price)?,
        })
    }
}

/// Trims and checks a product name.
///
/// Names cannot contain commas: a purchase's `items_list` joins names with
/// commas, and a comma inside a name would split into two references.
pub fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LedgerError::invalid("product_name", "must not be empty"));
    }
    if name.contains(',') {
        return Err(LedgerError::invalid(
            "product_name",
            format!("'{name}' must not contain a comma"),
        ));
    }
    Ok(name.to_string())
}

fn parse_price(raw: &str) -> Result<Decimal> {
    let raw = raw.trim();
    let price = Decimal::from_str(raw)
        .map_err(|_| LedgerError::invalid("unit_price", format!("'{raw}' is not a decimal")))?;
    if price.is_sign_negative() && !price.is_zero() {
        return Err(LedgerError::invalid(
            "unit_price",
            format!("'{raw}' must not be negative"),
        ));
    }
    Ok(price)
}

#[derive(Debug, Deserialize)]
struct CatalogRecord {
    product_name: String,
    unit_price: String,
}

/// Reads and validates a `products.csv` upload.
///
/// Fails on the first invalid row, tagged with its line number.
///
/// # CSV Format
///
/// ```csv
/// product_name,unit_price
/// apple,1.00
/// banana,2.00
/// ```
pub fn read_catalog<R: Read>(input: R) -> Result<Vec<CatalogEntry>> {
    csv_input::read_rows::<_, CatalogRecord>(input, &CATALOG_COLUMNS)?
        .into_iter()
        .map(|(line, record)| {
            CatalogEntry::new(&record.product_name, &record.unit_price).map_err(|e| e.at_line(line))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    #[test]
    fn parse_simple_catalog() {
        let csv = "product_name,unit_price\napple,1.00\nbanana,2.50\n";
        let entries = read_catalog(Cursor::new(csv)).unwrap();
        assert_eq!(
            entries,
            vec![
                CatalogEntry {
                    name: "apple".into(),
                    unit_price: dec!(1.00)
                },
                CatalogEntry {
                    name: "banana".into(),
                    unit_price: dec!(2.50)
                },
            ]
        );
    }

    #[test]
    fn zero_price_is_allowed() {
        let entry = CatalogEntry::new("sample", "0").unwrap();
        assert_eq!(entry.unit_price, Decimal::ZERO);
    }

    #[test]
    fn negative_price_is_rejected() {
        let csv = "product_name,unit_price\napple,1.00\nbanana,-2\n";
        let err = read_catalog(Cursor::new(csv)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::invalid("unit_price", "'-2' must not be negative").at_line(3)
        );
    }

    #[test]
    fn unparsable_price_is_rejected() {
        let err = CatalogEntry::new("apple", "one dollar").unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidField {
                field: "unit_price",
                ..
            }
        ));
    }

    #[test]
    fn names_with_commas_are_rejected() {
        let csv = "product_name,unit_price\n\"salt, coarse\",0.80\n";
        let err = read_catalog(Cursor::new(csv)).unwrap_err();
        assert!(matches!(err, LedgerError::Row { line: 2, .. }));
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(CatalogEntry::new("   ", "1.00").is_err());
    }

    #[test]
    fn missing_price_column() {
        let csv = "product_name,price\napple,1.00\n";
        let err = read_catalog(Cursor::new(csv)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::MissingColumns("product_name, unit_price".into())
        );
    }
}
