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

//! Customer ledger records.

use crate::base::UserId;
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub user_id: UserId,
}

/// Per-user purchase counter.
///
/// `total_purchases` always equals the number of committed purchases for
/// `user_id`; it starts at 0 for explicitly created users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalUserPurchases {
    pub user_id: UserId,
    pub total_purchases: u64,
}

/// Trims and checks an externally supplied user id.
pub fn validate_user_id(raw: &str) -> Result<UserId> {
    let user_id = UserId::from(raw);
    if user_id.as_str().is_empty() {
        return Err(LedgerError::invalid("user_id", "must not be empty"));
    }
    Ok(user_id)
}
