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

//! Command-line and environment configuration.
//!
//! Every option can be given as a flag or through the environment variable
//! named next to it.

use crate::error::Result;
use crate::report::{BEST_SELLER_TIERS, LOYALTY_THRESHOLD};
use crate::store::Store;
use crate::telemetry::TracingConfig;
use clap::{Args, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Where the ledger lives.
#[derive(Args, Debug, Clone, Default)]
pub struct StoreConfig {
    /// JSON snapshot file; the ledger is kept in memory only when omitted
    #[arg(long, env = "LEDGER_DATA_FILE", value_name = "FILE", global = true)]
    pub data_file: Option<PathBuf>,
}

impl StoreConfig {
    pub fn open(&self) -> Result<Store> {
        match &self.data_file {
            Some(path) => Store::open(path),
            None => Ok(Store::in_memory()),
        }
    }
}

/// Logging options.
#[derive(Args, Debug, Clone)]
pub struct LogConfig {
    /// Log filter directives
    #[arg(long = "log", env = "RUST_LOG", default_value = "info", global = true)]
    pub filter: String,

    /// Emit JSON log lines
    #[arg(long, env = "LOG_JSON", global = true)]
    pub log_json: bool,
}

impl LogConfig {
    pub fn tracing(&self) -> TracingConfig {
        TracingConfig::default()
            .with_filter(self.filter.clone())
            .with_json(self.log_json)
    }
}

/// Thresholds used by the reports.
#[derive(Args, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportConfig {
    /// Purchases needed to count as a loyal customer
    #[arg(long, env = "LEDGER_LOYALTY_THRESHOLD", default_value_t = LOYALTY_THRESHOLD)]
    pub loyalty_threshold: u64,

    /// Distinct sales counts kept by the best-seller report
    #[arg(long, env = "LEDGER_BEST_SELLER_TIERS", default_value_t = BEST_SELLER_TIERS)]
    pub best_seller_tiers: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            loyalty_threshold: LOYALTY_THRESHOLD,
            best_seller_tiers: BEST_SELLER_TIERS,
        }
    }
}

/// Which routes a server exposes.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppKind {
    /// Purchase entry only
    CashRegister,
    /// Uploads and reports only
    Management,
    /// Both surfaces on one listener
    #[default]
    Combined,
}

impl AppKind {
    pub fn has_cash_register(self) -> bool {
        matches!(self, AppKind::CashRegister | AppKind::Combined)
    }

    pub fn has_management(self) -> bool {
        matches!(self, AppKind::Management | AppKind::Combined)
    }
}

/// HTTP server options.
#[derive(Args, Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "LEDGER_BIND", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// Routes to serve
    #[arg(long, env = "LEDGER_APP", value_enum, default_value_t = AppKind::Combined)]
    pub app: AppKind,

    #[command(flatten)]
    pub reports: ReportConfig,
}
