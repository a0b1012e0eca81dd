use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, instrument};

use crate::{error::ApiError, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/createProduct", post(create_product))
}

/// Pushes the body into the products collection as-is. Product shape belongs
/// to the clients.
#[instrument(skip(state, data))]
pub async fn create_product(
    State(state): State<AppState>,
    Json(data): Json<serde_json::Value>,
) -> Result<&'static str, ApiError> {
    let id = state.store.insert_product(data).await?;
    info!(product_id = %id, "product created");
    Ok("New Product Created")
}
