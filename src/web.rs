//! Web server for the household pantry UI
//!
//! Provides REST API endpoints for the compiled grocery list, staging
//! mutations, trip commits, pantry item CRUD, and household create/join.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use crate::error::PantryError;
use crate::household::{self, Household};
use crate::list::compile_household;
use crate::models::{InventoryItem, ListLine};
use crate::resolver::{self, LineTarget, ManualAdd};
use crate::trip::{self, TripResult};
use crate::{database, database::NewItem};

/// Shared application state (thread-safe database connection)
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

/// API response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self { success: true, data: Some(data), error: None })
    }
}

/// Map a core error to an HTTP status, logging the storage failures
fn status_for(err: &PantryError) -> StatusCode {
    match err {
        PantryError::Unauthorized(_) => StatusCode::FORBIDDEN,
        PantryError::NotFound(_) => StatusCode::NOT_FOUND,
        PantryError::AlreadyMember => StatusCode::CONFLICT,
        PantryError::Database(e) => {
            log::error!("Database error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn db_status(err: rusqlite::Error) -> StatusCode {
    log::error!("Database error: {}", err);
    StatusCode::INTERNAL_SERVER_ERROR
}

// ── Grocery list ───────────────────────────────────────────────────────────

/// GET /api/households/{id}/grocery-list
async fn list_handler(
    State(state): State<AppState>,
    Path(household_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<ListLine>>>, StatusCode> {
    let conn = state.db.lock().unwrap();
    let lines = compile_household(&conn, household_id).map_err(db_status)?;
    Ok(ApiResponse::ok(lines))
}

/// POST /api/households/{id}/grocery-list/manual
async fn manual_add_handler(
    State(state): State<AppState>,
    Path(household_id): Path<i64>,
    Json(req): Json<ManualAdd>,
) -> Result<Json<ApiResponse<()>>, StatusCode> {
    let conn = state.db.lock().unwrap();
    resolver::add_manual_entry(&conn, household_id, &req).map_err(|e| status_for(&e))?;
    Ok(ApiResponse::ok(()))
}

/// POST /api/households/{id}/grocery-list/toggle
async fn toggle_handler(
    State(state): State<AppState>,
    Path(household_id): Path<i64>,
    Json(line): Json<LineTarget>,
) -> Result<Json<ApiResponse<()>>, StatusCode> {
    let conn = state.db.lock().unwrap();
    resolver::toggle_check(&conn, household_id, &line).map_err(|e| status_for(&e))?;
    Ok(ApiResponse::ok(()))
}

/// Quantity-edit request: the acting user, the line they saw, the new value
#[derive(Deserialize)]
struct QuantityRequest {
    user_id: i64,
    #[serde(flatten)]
    line: LineTarget,
    new_quantity: i64,
}

/// POST /api/households/{id}/grocery-list/quantity
async fn quantity_handler(
    State(state): State<AppState>,
    Path(household_id): Path<i64>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<ApiResponse<()>>, StatusCode> {
    let conn = state.db.lock().unwrap();
    resolver::set_quantity(&conn, household_id, req.user_id, &req.line, req.new_quantity)
        .map_err(|e| status_for(&e))?;
    Ok(ApiResponse::ok(()))
}

#[derive(Deserialize)]
struct CommitRequest {
    #[serde(default)]
    user_id: Option<i64>,
}

/// POST /api/households/{id}/grocery-list/commit
async fn commit_handler(
    State(state): State<AppState>,
    Path(household_id): Path<i64>,
    Json(req): Json<CommitRequest>,
) -> Result<Json<ApiResponse<TripResult>>, StatusCode> {
    let mut conn = state.db.lock().unwrap();
    let result =
        trip::commit_trip(&mut conn, household_id, req.user_id).map_err(|e| status_for(&e))?;
    Ok(ApiResponse::ok(result))
}

// ── Pantry items ───────────────────────────────────────────────────────────

/// GET /api/households/{id}/items
async fn items_handler(
    State(state): State<AppState>,
    Path(household_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<InventoryItem>>>, StatusCode> {
    let conn = state.db.lock().unwrap();
    let items = database::get_inventory(&conn, household_id).map_err(db_status)?;
    Ok(ApiResponse::ok(items))
}

#[derive(Deserialize)]
struct AddItemRequest {
    name: String,
    #[serde(default = "default_item_quantity")]
    quantity: i64,
    #[serde(default)]
    threshold_quantity: i64,
    #[serde(default)]
    default_buy_qty: Option<i64>,
    #[serde(default = "default_units")]
    units: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    user_id: Option<i64>,
}

fn default_item_quantity() -> i64 {
    1
}

fn default_units() -> String {
    "units".to_string()
}

/// POST /api/households/{id}/items
async fn add_item_handler(
    State(state): State<AppState>,
    Path(household_id): Path<i64>,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<ApiResponse<i64>>, StatusCode> {
    if req.name.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let conn = state.db.lock().unwrap();
    let id = database::insert_item(
        &conn,
        &NewItem {
            household_id,
            name: req.name.trim().to_string(),
            quantity: req.quantity.max(0),
            threshold_quantity: req.threshold_quantity.max(0),
            default_buy_qty: req.default_buy_qty,
            units: req.units,
            category: req.category,
            last_updated_by: req.user_id,
        },
    )
    .map_err(db_status)?;
    Ok(ApiResponse::ok(id))
}

/// DELETE /api/households/{id}/items/{item_id}
async fn delete_item_handler(
    State(state): State<AppState>,
    Path((household_id, item_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<()>>, StatusCode> {
    let conn = state.db.lock().unwrap();
    let deleted = database::delete_item(&conn, item_id, household_id).map_err(db_status)?;
    if deleted == 0 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(ApiResponse::ok(()))
}

/// Handles both relative adjustments (increment/decrement) and absolute
/// overrides from manual input.
#[derive(Deserialize)]
struct AdjustQuantityRequest {
    value: i64,
    #[serde(default)]
    is_relative: bool,
}

/// POST /api/households/{id}/items/{item_id}/quantity
async fn adjust_quantity_handler(
    State(state): State<AppState>,
    Path((household_id, item_id)): Path<(i64, i64)>,
    Json(req): Json<AdjustQuantityRequest>,
) -> Result<Json<ApiResponse<()>>, StatusCode> {
    let conn = state.db.lock().unwrap();
    let touched =
        database::adjust_item_quantity(&conn, item_id, household_id, req.value, req.is_relative)
            .map_err(db_status)?;
    if touched == 0 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(ApiResponse::ok(()))
}

// ── Households ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateHouseholdRequest {
    name: String,
    user_id: i64,
}

/// POST /api/households
async fn create_household_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateHouseholdRequest>,
) -> Result<Json<ApiResponse<Household>>, StatusCode> {
    let mut conn = state.db.lock().unwrap();
    let house = household::create_household(&mut conn, &req.name, req.user_id)
        .map_err(|e| status_for(&e))?;
    Ok(ApiResponse::ok(house))
}

#[derive(Deserialize)]
struct JoinHouseholdRequest {
    room_code: String,
    user_id: i64,
}

#[derive(Serialize)]
struct JoinedHousehold {
    household_id: i64,
}

/// POST /api/households/join
async fn join_household_handler(
    State(state): State<AppState>,
    Json(req): Json<JoinHouseholdRequest>,
) -> Result<Json<ApiResponse<JoinedHousehold>>, StatusCode> {
    let conn = state.db.lock().unwrap();
    let household_id = household::join_household(&conn, &req.room_code, req.user_id)
        .map_err(|e| status_for(&e))?;
    Ok(ApiResponse::ok(JoinedHousehold { household_id }))
}

/// Build the web server router
pub fn create_router(db: Arc<Mutex<Connection>>) -> Router {
    let state = AppState { db };

    Router::new()
        .route("/api/households", post(create_household_handler))
        .route("/api/households/join", post(join_household_handler))
        .route("/api/households/{id}/grocery-list", get(list_handler))
        .route("/api/households/{id}/grocery-list/manual", post(manual_add_handler))
        .route("/api/households/{id}/grocery-list/toggle", post(toggle_handler))
        .route("/api/households/{id}/grocery-list/quantity", post(quantity_handler))
        .route("/api/households/{id}/grocery-list/commit", post(commit_handler))
        .route("/api/households/{id}/items", get(items_handler).post(add_item_handler))
        .route("/api/households/{id}/items/{item_id}", delete(delete_item_handler))
        .route("/api/households/{id}/items/{item_id}/quantity", post(adjust_quantity_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web server (async)
///
/// Binds to 0.0.0.0 (all interfaces) to work with Docker port mapping.
/// When running locally, use firewall rules to restrict access.
pub async fn serve(
    db: Arc<Mutex<Connection>>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(db);
    let addr = format!("0.0.0.0:{}", port);

    log::info!("Pantry API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
