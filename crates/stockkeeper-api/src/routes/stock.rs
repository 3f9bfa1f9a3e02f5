//! Routes for the stock context.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use stockkeeper_inventory::application::command_handlers::{
    StockCommandResult, handle_create_stock, handle_decrease_stock,
};
use stockkeeper_inventory::application::query_handlers::{StockView, get_stock_by_id};
use stockkeeper_inventory::domain::commands::{CreateStock, DecreaseStock};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Body of `POST /api/v1/stock`.
#[derive(Debug, Deserialize)]
pub struct CreateStockRequest {
    /// Caller-chosen id. A fresh one is generated when absent.
    #[serde(default)]
    pub stock_id: Option<Uuid>,
    /// The product the counter tracks.
    pub product_id: Uuid,
    /// Initial quantity.
    pub quantity: i64,
}

/// Body of `POST /api/v1/stock/{stock_id}/decrease`.
#[derive(Debug, Deserialize)]
pub struct DecreaseStockRequest {
    /// Units to remove.
    pub amount: i64,
}

/// Response to a successful command.
#[derive(Debug, Serialize)]
pub struct StockCommandResponse {
    /// The stock record affected.
    pub stock_id: Uuid,
    /// Units on hand after the command.
    pub quantity: i64,
    /// Revision after the command.
    pub revision: i64,
}

impl From<StockCommandResult> for StockCommandResponse {
    fn from(result: StockCommandResult) -> Self {
        Self {
            stock_id: result.stock_id,
            quantity: result.quantity,
            revision: result.revision,
        }
    }
}

/// POST /api/v1/stock
async fn create_stock(
    State(state): State<AppState>,
    Json(body): Json<CreateStockRequest>,
) -> Result<(StatusCode, Json<StockCommandResponse>), ApiError> {
    let command = CreateStock {
        correlation_id: Uuid::new_v4(),
        stock_id: body.stock_id.unwrap_or_else(Uuid::new_v4),
        product_id: body.product_id,
        quantity: body.quantity,
    };
    let result = handle_create_stock(&command, state.store.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(result.into())))
}

/// GET /api/v1/stock/{stock_id}
async fn get_stock(
    State(state): State<AppState>,
    Path(stock_id): Path<Uuid>,
) -> Result<Json<StockView>, ApiError> {
    let view = get_stock_by_id(stock_id, state.store.as_ref()).await?;
    Ok(Json(view))
}

/// POST /api/v1/stock/{stock_id}/decrease
async fn decrease_stock(
    State(state): State<AppState>,
    Path(stock_id): Path<Uuid>,
    Json(body): Json<DecreaseStockRequest>,
) -> Result<Json<StockCommandResponse>, ApiError> {
    let command = DecreaseStock {
        correlation_id: Uuid::new_v4(),
        stock_id,
        amount: body.amount,
    };
    let result = handle_decrease_stock(&command, state.strategy.as_ref(), &state.store).await?;
    Ok(Json(result.into()))
}

/// Returns the router for the stock context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_stock))
        .route("/{stock_id}", get(get_stock))
        .route("/{stock_id}/decrease", post(decrease_stock))
}
