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

use checkout_ledger::config::{LogConfig, ReportConfig, ServerConfig, StoreConfig};
use checkout_ledger::report;
use checkout_ledger::telemetry::init_tracing;
use checkout_ledger::{Store, ingest, server};
use clap::{Parser, Subcommand, ValueEnum};
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Checkout Ledger - Cash register purchases and back-office reports
///
/// Records purchases against a product catalog, imports catalog and purchase
/// CSV files, and reports on customers and best-selling products.
#[derive(Parser, Debug)]
#[command(name = "checkout-ledger")]
#[command(about = "Cash register purchase ledger with management reports", long_about = None)]
struct Cli {
    #[command(flatten)]
    store: StoreConfig,

    #[command(flatten)]
    log: LogConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve(ServerConfig),

    /// Upsert products from a CSV file
    ///
    /// Expected format: product_name,unit_price
    ImportProducts {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Import purchases from a CSV file as one batch
    ///
    /// Expected format: supermarket_id,timestamp,user_id,items_list,total_amount
    ImportPurchases {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Write a report as CSV to stdout
    Report {
        #[arg(value_enum)]
        kind: ReportKind,

        #[command(flatten)]
        reports: ReportConfig,
    },
}

impl Command {
    /// One-shot commands whose work is lost without a snapshot file.
    fn needs_data_file(&self) -> bool {
        !matches!(self, Command::Serve(_))
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ReportKind {
    LoyalCustomers,
    UniqueCustomers,
    BestSellers,
    Recent,
}

fn main() {
    // Parse command line arguments
    let cli = Cli::parse();
    init_tracing(&cli.log.tracing());

    if cli.command.needs_data_file() && cli.store.data_file.is_none() {
        warn!("No --data-file or LEDGER_DATA_FILE set; this command runs against an empty in-memory ledger and keeps nothing");
    }

    // Open or create the ledger
    let store = match cli.store.open() {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "Failed to open ledger");
            process::exit(1);
        }
    };

    if let Err(e) = run(cli.command, store) {
        error!(error = %e, "Command failed");
        process::exit(1);
    }
}

fn run(command: Command, store: Store) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Serve(config) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(&config, Arc::new(store)))?;
        }
        Command::ImportProducts { input } => {
            let summary = ingest::import_products(&store, open(&input)?)?;
            info!(
                loaded = summary.loaded(),
                created = summary.created,
                updated = summary.updated,
                "Catalog imported"
            );
        }
        Command::ImportPurchases { input } => {
            let summary = ingest::import_purchases(&store, open(&input)?)?;
            info!(
                inserted = summary.inserted,
                total_amount = %summary.total_amount,
                "Purchases imported"
            );
        }
        Command::Report { kind, reports } => {
            // Write results to stdout
            let stdout = std::io::stdout();
            match kind {
                ReportKind::LoyalCustomers => {
                    write_rows(report::loyal_customers(&store, reports.loyalty_threshold), stdout.lock())?
                }
                ReportKind::UniqueCustomers => {
                    #[derive(Serialize)]
                    struct Row {
                        unique_customers: usize,
                    }
                    let row = Row {
                        unique_customers: report::unique_customers(&store),
                    };
                    write_rows([row], stdout.lock())?
                }
                ReportKind::BestSellers => {
                    write_rows(report::best_sellers(&store, reports.best_seller_tiers), stdout.lock())?
                }
                ReportKind::Recent => write_rows(report::recent_purchase(&store), stdout.lock())?,
            }
        }
    }
    Ok(())
}

fn open(path: &Path) -> Result<BufReader<File>, String> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| format!("opening '{}': {e}", path.display()))
}

/// Writes report rows as CSV with a header line.
fn write_rows<T, W>(rows: impl IntoIterator<Item = T>, writer: W) -> Result<(), csv::Error>
where
    T: Serialize,
    W: Write,
{
    let mut wtr = Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
