use axum::{Json, Router, routing::get};
use utoipa::OpenApi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Serve the aggregated OpenAPI document.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Configure the documentation routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/docs/openapi.json", get(openapi_json))
}
