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

//! HTTP surface for the cash register and the management back office.
//!
//! ## Cash register
//!
//! - `POST /create` - Record a purchase (form: `supermarket_id`, `user_id`,
//!   `items_list`, optional `timestamp`, ignored `total_amount`)
//! - `POST /users` - Register a customer (form: `user_id`)
//!
//! ## Management
//!
//! - `POST /upload_products` - Multipart `file` with `products.csv`
//! - `POST /upload_purchases` - Multipart `file` with `purchases.csv`
//! - `GET /recent` - Most recent purchase
//! - `GET /products` - Catalog
//! - `GET /loyal_customers`, `GET /unique_customers`, `GET /best_sellers`
//!
//! Form and upload endpoints answer with `303 See Other` back to `/`, carrying
//! the outcome in a `flash` query parameter that the index page displays.
//!
//! ## Example Usage
//!
//! ```bash
//! curl -i -X POST http://localhost:5000/upload_products -F file=@products.csv
//! curl -i -X POST http://localhost:5000/create \
//!   -d supermarket_id=S1 -d user_id=u-1 -d items_list=apple,banana
//! curl http://localhost:5000/best_sellers
//! ```

use crate::catalog::Product;
use crate::config::{AppKind, ReportConfig, ServerConfig};
use crate::error::{ErrorKind, LedgerError};
use crate::ingest;
use crate::purchase::{Purchase, PurchaseRequest};
use crate::report::{self, BestSeller, LoyalCustomer};
use crate::store::Store;
use axum::{
    Form, Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Largest accepted CSV upload.
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

// === Application State ===

/// Shared application state containing the ledger store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub app: AppKind,
    pub reports: ReportConfig,
}

impl AppState {
    pub fn new(store: Arc<Store>, app: AppKind) -> Self {
        Self {
            store,
            app,
            reports: ReportConfig::default(),
        }
    }
}

// === Error Handling ===

/// Response body for errors and empty reports.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Wrapper for converting `LedgerError` into HTTP responses.
///
/// Validation and lookup failures go back to the index page as a flash
/// message. Persistence failures fail the request.
pub struct AppError(LedgerError);

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self.0.kind() {
            ErrorKind::Validation | ErrorKind::NotFound => flash(&self.0.to_string()),
            ErrorKind::Persistence => {
                error!(error = %self.0, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: self.0.to_string(),
                        code: "PERSISTENCE_FAILURE".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

/// Redirects to the index page with `message` shown as a flash.
fn flash(message: &str) -> Response {
    let location = serde_urlencoded::to_string([("flash", message)])
        .map(|query| format!("/?{query}"))
        .unwrap_or_else(|_| "/".to_string());
    Redirect::to(&location).into_response()
}

fn not_found(message: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(MessageResponse {
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// Runs ledger work off the async executor; store calls take a blocking lock.
async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> crate::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError(LedgerError::Persistence(format!("ledger worker failed: {e}"))))?
        .map_err(AppError)
}

// === Index ===

#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    flash: Option<String>,
}

/// GET / - Forms for the enabled surfaces, plus the last flash message.
async fn index(State(state): State<AppState>, Query(query): Query<IndexQuery>) -> Html<String> {
    let mut body = String::new();

    if let Some(message) = query.flash.as_deref().filter(|m| !m.is_empty()) {
        body.push_str(&format!(
            "<div class=\"flash\">{}</div>\n",
            escape_html(message)
        ));
    }

    if state.app.has_cash_register() {
        body.push_str(CASH_REGISTER_FORMS);
    }
    if state.app.has_management() {
        body.push_str(MANAGEMENT_FORMS);
    }

    Html(format!(
        "<!doctype html>\n<html>\n<head><title>Checkout Ledger</title></head>\n<body>\n{body}</body>\n</html>\n"
    ))
}

const CASH_REGISTER_FORMS: &str = r#"<h2>Cash Register</h2>
<form method="post" action="/create">
  <input name="supermarket_id" placeholder="Supermarket" required>
  <input name="user_id" placeholder="Customer" required>
  <input name="items_list" placeholder="apple,banana" required>
  <input name="timestamp" placeholder="2024-05-01T10:00:00Z">
  <button>Record purchase</button>
</form>
<form method="post" action="/users">
  <input name="user_id" placeholder="Customer" required>
  <button>Register customer</button>
</form>
"#;

const MANAGEMENT_FORMS: &str = r#"<h2>Management</h2>
<form method="post" action="/upload_products" enctype="multipart/form-data">
  <label>Upload products.csv</label>
  <input type="file" name="file" accept=".csv" required>
  <button>Upload</button>
</form>
<form method="post" action="/upload_purchases" enctype="multipart/form-data">
  <label>Upload purchases.csv</label>
  <input type="file" name="file" accept=".csv" required>
  <button>Upload</button>
</form>
<ul>
  <li><a href="/recent">Most recent purchase</a></li>
  <li><a href="/products">Catalog</a></li>
  <li><a href="/loyal_customers">Loyal customers</a></li>
  <li><a href="/unique_customers">Unique customers</a></li>
  <li><a href="/best_sellers">Best sellers</a></li>
</ul>
"#;

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

// === Cash Register Handlers ===

/// POST /create - Record a purchase.
async fn create_purchase(
    State(state): State<AppState>,
    Form(request): Form<PurchaseRequest>,
) -> Result<Response, AppError> {
    let store = Arc::clone(&state.store);
    let purchase = blocking(move || ingest::record_purchase(&store, &request)).await?;
    Ok(flash(&format!(
        "Purchase created with ID {} (total {})",
        purchase.id, purchase.total_amount
    )))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewUserForm {
    user_id: String,
}

/// POST /users - Register a customer.
async fn create_user(
    State(state): State<AppState>,
    Form(form): Form<NewUserForm>,
) -> Result<Response, AppError> {
    let store = Arc::clone(&state.store);
    let user = blocking(move || ingest::create_user(&store, &form.user_id)).await?;
    Ok(flash(&format!("User {} created", user.user_id)))
}

// === Management Handlers ===

/// Pulls the `file` part out of a multipart upload.
async fn read_upload(mut multipart: Multipart) -> Result<Bytes, AppError> {
    let invalid = |e: axum::extract::multipart::MultipartError| {
        AppError(LedgerError::InvalidUpload(e.body_text()))
    };

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        if field.name() != Some("file") {
            continue;
        }
        let bytes = field.bytes().await.map_err(invalid)?;
        // Browsers send an empty part when no file was chosen.
        if bytes.is_empty() {
            break;
        }
        return Ok(bytes);
    }
    Err(AppError(LedgerError::MissingFile))
}

/// POST /upload_products - Upsert the catalog from `products.csv`.
async fn upload_products(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let bytes = read_upload(multipart).await?;
    let store = Arc::clone(&state.store);
    let summary = blocking(move || ingest::import_products(&store, Cursor::new(bytes))).await?;
    Ok(flash(&format!(
        "Loaded {} products ({} new, {} updated).",
        summary.loaded(),
        summary.created,
        summary.updated
    )))
}

/// POST /upload_purchases - Ingest `purchases.csv` as one batch.
async fn upload_purchases(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let bytes = read_upload(multipart).await?;
    let store = Arc::clone(&state.store);
    let summary = blocking(move || ingest::import_purchases(&store, Cursor::new(bytes))).await?;
    Ok(flash(&format!(
        "Loaded {} purchases successfully.",
        summary.inserted
    )))
}

/// GET /recent - Most recent purchase by timestamp.
async fn recent_purchase(State(state): State<AppState>) -> Result<Response, AppError> {
    let store = Arc::clone(&state.store);
    let recent: Option<Purchase> = blocking(move || Ok(report::recent_purchase(&store))).await?;
    Ok(match recent {
        Some(purchase) => Json(purchase).into_response(),
        None => not_found("no purchases"),
    })
}

/// GET /products - The catalog.
async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    let store = Arc::clone(&state.store);
    Ok(Json(blocking(move || Ok(report::products(&store))).await?))
}

/// GET /loyal_customers - Customers at or above the loyalty threshold.
async fn loyal_customers(
    State(state): State<AppState>,
) -> Result<Json<Vec<LoyalCustomer>>, AppError> {
    let store = Arc::clone(&state.store);
    let threshold = state.reports.loyalty_threshold;
    Ok(Json(
        blocking(move || Ok(report::loyal_customers(&store, threshold))).await?,
    ))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UniqueCustomersResponse {
    pub unique_customers: usize,
}

/// GET /unique_customers - Number of distinct customers.
async fn unique_customers(
    State(state): State<AppState>,
) -> Result<Json<UniqueCustomersResponse>, AppError> {
    let store = Arc::clone(&state.store);
    let unique_customers = blocking(move || Ok(report::unique_customers(&store))).await?;
    Ok(Json(UniqueCustomersResponse { unique_customers }))
}

/// GET /best_sellers - Products in the top sales tiers.
async fn best_sellers(State(state): State<AppState>) -> Result<Response, AppError> {
    let store = Arc::clone(&state.store);
    let tiers = state.reports.best_seller_tiers;
    let sellers: Vec<BestSeller> = blocking(move || Ok(report::best_sellers(&store, tiers))).await?;
    Ok(if sellers.is_empty() {
        not_found("no sales")
    } else {
        Json(sellers).into_response()
    })
}

// === Router ===

fn cash_register_routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_purchase))
        .route("/users", post(create_user))
}

fn management_routes() -> Router<AppState> {
    Router::new()
        .route("/upload_products", post(upload_products))
        .route("/upload_purchases", post(upload_purchases))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .route("/recent", get(recent_purchase))
        .route("/products", get(list_products))
        .route("/loyal_customers", get(loyal_customers))
        .route("/unique_customers", get(unique_customers))
        .route("/best_sellers", get(best_sellers))
}

/// Builds the router for the surfaces selected by `state.app`.
pub fn router(state: AppState) -> Router {
    let mut router = Router::new().route("/", get(index));
    if state.app.has_cash_register() {
        router = router.merge(cash_register_routes());
    }
    if state.app.has_management() {
        router = router.merge(management_routes());
    }
    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Serves until Ctrl-C.
pub async fn serve(config: &ServerConfig, store: Arc<Store>) -> std::io::Result<()> {
    let state = AppState {
        store,
        app: config.app,
        reports: config.reports,
    };

    let listener = TcpListener::bind(config.bind).await?;
    info!(addr = %listener.local_addr()?, app = ?config.app, "Ledger server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
        })
        .await
}
