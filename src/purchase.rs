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

//! Purchase submissions, sales records and the `purchases.csv` schema.
//!
//! A submission goes through two shapes before it reaches the store:
//! - [`PurchaseRequest`] / the CSV row: raw strings as the client sent them.
//! - [`Submission`]: trimmed ids, parsed product references, optional timestamp.

use crate::base::{ProductId, PurchaseId, StoreId, UserId};
use crate::customer::validate_user_id;
use crate::csv_input;
use crate::error::{LedgerError, Result};
use chrono::format::{Parsed, StrftimeItems};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::str::FromStr;
use tracing::warn;

/// Columns `purchases.csv` must carry.
pub const PURCHASE_COLUMNS: [&str; 5] = [
    "supermarket_id",
    "timestamp",
    "user_id",
    "items_list",
    "total_amount",
];

/// A committed purchase. Never modified after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub supermarket_id: StoreId,
    pub timestamp: DateTime<Utc>,
    pub user_id: UserId,
    /// Resolved product names joined with `,`, in submission order.
    pub items_list: String,
    pub total_amount: Decimal,
}

/// Number of purchases that contained a product.
///
/// Counts transactions, not units: a purchase bumps each of its products by one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub id: u32,
    pub product_id: ProductId,
    pub total_purchases: u64,
}

/// Reference to a catalog product inside an item list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProductRef {
    /// Exact product name.
    Name(String),
    /// Register input: an exact name match wins, otherwise an all-digit
    /// token falls back to the product id.
    NameOrId(String),
}

impl ProductRef {
    pub fn parse(token: &str) -> Self {
        ProductRef::NameOrId(token.to_string())
    }

    /// The token as written.
    pub fn token(&self) -> &str {
        match self {
            ProductRef::Name(token) | ProductRef::NameOrId(token) => token,
        }
    }

    /// Id to try when no product has this exact name.
    ///
    /// Only plain ASCII digits qualify, so `+7` or ` 7` stay names.
    pub fn fallback_id(&self) -> Option<ProductId> {
        match self {
            ProductRef::NameOrId(token)
                if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) =>
            {
                token.parse().ok().map(ProductId)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ProductRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Splits an interactive item list; tokens are names, or ids when no name matches.
pub fn parse_item_list(input: &str) -> Result<Vec<ProductRef>> {
    split_items(input, ProductRef::parse)
}

/// Splits a batch item list; every token is a product name.
pub fn parse_item_names(input: &str) -> Result<Vec<ProductRef>> {
    split_items(input, |token| ProductRef::Name(token.to_string()))
}

fn split_items(input: &str, to_ref: impl Fn(&str) -> ProductRef) -> Result<Vec<ProductRef>> {
    if input.trim().is_empty() {
        return Err(LedgerError::EmptyItemList);
    }

    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for (position, token) in input.split(',').enumerate() {
        let token = token.trim();
        if token.is_empty() {
            return Err(LedgerError::MalformedItemList(format!(
                "entry {} is empty",
                position + 1
            )));
        }
        let item = to_ref(token);
        if !seen.insert(item.clone()) {
            return Err(LedgerError::DuplicateItem(token.to_string()));
        }
        items.push(item);
    }
    Ok(items)
}

/// Extended and basic ISO-8601 forms carrying an offset.
const ZONED_FORMATS: [&str; 7] = [
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y-%m-%dT%H%#z",
    "%Y%m%dT%H%M%S%.f%#z",
    "%Y%m%dT%H%M%#z",
    "%Y%m%dT%H%#z",
];

/// The same forms without an offset; read as UTC.
const NAIVE_FORMATS: [&str; 8] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M",
    "%Y%m%dT%H",
];

/// Parses an ISO-8601 timestamp. Offset-less timestamps are read as UTC.
///
/// Returns `None` for anything unparsable; callers fall back to the current time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    // A trailing `Z` is the zero offset.
    let zoned = raw
        .strip_suffix(|c: char| c == 'Z' || c == 'z')
        .map(|local| format!("{local}+00:00"));
    let with_offset = zoned.as_deref().unwrap_or(raw);
    for format in ZONED_FORMATS {
        if let Some(ts) = parse_parts(with_offset, format).and_then(|p| p.to_datetime().ok()) {
            return Some(ts.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Some(naive) =
            parse_parts(raw, format).and_then(|p| p.to_naive_datetime_with_offset(0).ok())
        {
            return Some(naive.and_utc());
        }
    }

    ["%Y-%m-%d", "%Y%m%d"].into_iter().find_map(|format| {
        NaiveDate::parse_from_str(raw, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

fn parse_parts(raw: &str, format: &str) -> Option<Parsed> {
    let mut parsed = Parsed::new();
    chrono::format::parse(&mut parsed, raw, StrftimeItems::new(format)).ok()?;
    // Hour-only times leave the minute unset; this is a no-op when it is set.
    let _ = parsed.set_minute(0);
    Some(parsed)
}

fn client_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let parsed = parse_timestamp(raw);
    if parsed.is_none() && !raw.trim().is_empty() {
        warn!(timestamp = raw, "Unparsable timestamp, using the current time");
    }
    parsed
}

/// Validated purchase, not yet resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub store_id: StoreId,
    pub user_id: UserId,
    pub items: Vec<ProductRef>,
    /// `None` when the client sent no timestamp or an unparsable one.
    pub timestamp: Option<DateTime<Utc>>,
    /// Total the client claimed. Only used to log disagreements.
    pub claimed_total: Option<Decimal>,
}

/// Purchase as submitted from the cash register form.
///
/// Missing form fields deserialize as empty and are reported by [`validate`](Self::validate).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PurchaseRequest {
    pub supermarket_id: String,
    pub user_id: String,
    pub items_list: String,
    pub timestamp: Option<String>,
    pub total_amount: Option<String>,
}

impl PurchaseRequest {
    pub fn validate(&self) -> Result<Submission> {
        Ok(Submission {
            store_id: validate_store_id(&self.supermarket_id)?,
            user_id: validate_user_id(&self.user_id)?,
            items: parse_item_list(&self.items_list)?,
            timestamp: self.timestamp.as_deref().and_then(client_timestamp),
            // The register recomputes the total; a garbled claim is just dropped.
            claimed_total: self
                .total_amount
                .as_deref()
                .and_then(|raw| Decimal::from_str(raw.trim()).ok()),
        })
    }
}

fn validate_store_id(raw: &str) -> Result<StoreId> {
    let store_id = StoreId::from(raw);
    if store_id.as_str().is_empty() {
        return Err(LedgerError::invalid("supermarket_id", "must not be empty"));
    }
    Ok(store_id)
}

/// Raw `purchases.csv` row.
#[derive(Debug, Deserialize)]
struct PurchaseRecord {
    supermarket_id: String,
    timestamp: String,
    user_id: String,
    items_list: String,
    total_amount: String,
}

impl PurchaseRecord {
    fn validate(&self) -> Result<Submission> {
        let total = self.total_amount.trim();
        let claimed_total = Decimal::from_str(total)
            .map_err(|_| LedgerError::invalid("total_amount", format!("'{total}' is not a decimal")))?;

        Ok(Submission {
            store_id: validate_store_id(&self.supermarket_id)?,
            user_id: validate_user_id(&self.user_id)?,
            items: parse_item_names(&self.items_list)?,
            timestamp: client_timestamp(&self.timestamp),
            claimed_total: Some(claimed_total),
        })
    }
}

/// Reads and validates a `purchases.csv` upload.
///
/// Returns each submission with its line number so later failures (unknown
/// products) can still point at the offending row.
///
/// # CSV Format
///
/// ```csv
/// supermarket_id,timestamp,user_id,items_list,total_amount
/// S1,2024-05-01T10:00:00Z,u-1,"apple,banana",3.00
/// ```
pub fn read_purchases<R: Read>(input: R) -> Result<Vec<(u64, Submission)>> {
    csv_input::read_rows::<_, PurchaseRecord>(input, &PURCHASE_COLUMNS)?
        .into_iter()
        .map(|(line, record)| {
            record
                .validate()
                .map(|submission| (line, submission))
                .map_err(|e| e.at_line(line))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    fn name(n: &str) -> ProductRef {
        ProductRef::Name(n.into())
    }

    fn token(t: &str) -> ProductRef {
        ProductRef::NameOrId(t.into())
    }

    #[test]
    fn item_list_keeps_trimmed_tokens() {
        let items = parse_item_list("apple, 7 ,banana").unwrap();
        assert_eq!(items, vec![token("apple"), token("7"), token("banana")]);
    }

    #[test]
    fn only_plain_digits_fall_back_to_ids() {
        assert_eq!(token("7").fallback_id(), Some(ProductId(7)));
        assert_eq!(token("0042").fallback_id(), Some(ProductId(42)));
        assert_eq!(token("+7").fallback_id(), None);
        assert_eq!(token("7a").fallback_id(), None);
        assert_eq!(token("99999999999").fallback_id(), None);
        assert_eq!(name("7").fallback_id(), None);
    }

    #[test]
    fn item_names_never_become_ids() {
        let items = parse_item_names("7,apple").unwrap();
        assert_eq!(items, vec![name("7"), name("apple")]);
    }

    #[test]
    fn empty_item_list_is_rejected() {
        assert_eq!(parse_item_list("  "), Err(LedgerError::EmptyItemList));
    }

    #[test]
    fn empty_segment_is_malformed() {
        assert_eq!(
            parse_item_list("apple,,banana"),
            Err(LedgerError::MalformedItemList("entry 2 is empty".into()))
        );
        assert!(matches!(
            parse_item_list("apple,"),
            Err(LedgerError::MalformedItemList(_))
        ));
    }

    #[test]
    fn duplicate_items_are_rejected() {
        assert_eq!(
            parse_item_list("apple, apple"),
            Err(LedgerError::DuplicateItem("apple".into()))
        );
        assert_eq!(
            parse_item_list("3,3"),
            Err(LedgerError::DuplicateItem("3".into()))
        );
    }

    #[test]
    fn timestamps_accept_common_iso_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T10:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:30"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 10:30"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-05-01"),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn timestamps_accept_offsets_without_seconds() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T12:30+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:30Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T08:30-0200"), Some(expected));
    }

    #[test]
    fn timestamps_accept_basic_format() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("20240501T103000Z"), Some(expected));
        assert_eq!(parse_timestamp("20240501T123000+0200"), Some(expected));
        assert_eq!(parse_timestamp("20240501T1030"), Some(expected));
        assert_eq!(
            parse_timestamp("20240501"),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn timestamps_accept_hour_only() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T10Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12+02"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10"), Some(expected));
    }

    #[test]
    fn garbage_timestamps_are_none() {
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("garbage"), None);
        assert_eq!(parse_timestamp("2024-13-01T10:00Z"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn request_validation_trims_and_ignores_bad_totals() {
        let request = PurchaseRequest {
            supermarket_id: " S1 ".into(),
            user_id: "u-1".into(),
            items_list: "apple".into(),
            timestamp: Some("not a time".into()),
            total_amount: Some("lots".into()),
        };
        let submission = request.validate().unwrap();
        assert_eq!(submission.store_id, StoreId("S1".into()));
        assert_eq!(submission.timestamp, None);
        assert_eq!(submission.claimed_total, None);
    }

    #[test]
    fn request_requires_store_id() {
        let request = PurchaseRequest {
            user_id: "u-1".into(),
            items_list: "apple".into(),
            ..Default::default()
        };
        assert_eq!(
            request.validate().unwrap_err(),
            LedgerError::invalid("supermarket_id", "must not be empty")
        );
    }

    #[test]
    fn read_purchases_parses_quoted_item_lists() {
        let csv = "supermarket_id,timestamp,user_id,items_list,total_amount\n\
                   S1,2024-05-01T10:00:00Z,u-1,\"apple, banana\",3.00\n";
        let rows = read_purchases(Cursor::new(csv)).unwrap();
        assert_eq!(rows.len(), 1);
        let (line, submission) = &rows[0];
        assert_eq!(*line, 2);
        assert_eq!(submission.items, vec![name("apple"), name("banana")]);
        assert_eq!(submission.claimed_total, Some(dec!(3.00)));
    }

    #[test]
    fn read_purchases_requires_decimal_total() {
        let csv = "supermarket_id,timestamp,user_id,items_list,total_amount\n\
                   S1,2024-05-01T10:00:00Z,u-1,apple,\n";
        let err = read_purchases(Cursor::new(csv)).unwrap_err();
        assert!(matches!(err, LedgerError::Row { line: 2, .. }));
    }

    #[test]
    fn read_purchases_reports_duplicate_rows_by_line() {
        let csv = "supermarket_id,timestamp,user_id,items_list,total_amount\n\
                   S1,2024-05-01T10:00:00Z,u-1,apple,1.00\n\
                   S1,2024-05-01T11:00:00Z,u-2,\"apple,apple\",2.00\n";
        let err = read_purchases(Cursor::new(csv)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::DuplicateItem("apple".into()).at_line(3)
        );
    }
}
