use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    catalog::{CatalogGame, CategorySummary},
    dto::{
        common::Envelope,
        room::{ReactionRequest, StartGameRequest},
    },
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Game selection, reactions, and catalog listing.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games/start", post(start_game))
        .route("/games/reaction", post(reaction))
        .route("/catalog/categories", get(list_categories))
}

#[utoipa::path(
    post,
    path = "/games/start",
    tag = "games",
    request_body = StartGameRequest,
    responses((status = 200, description = "Game started"))
)]
/// Move the room to `playing` with the chosen game.
pub async fn start_game(
    State(state): State<SharedState>,
    Json(payload): Json<StartGameRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    room_service::start_game(&state, &payload.room_id, payload.game_code).await?;
    Ok(Envelope::empty())
}

#[utoipa::path(
    post,
    path = "/games/reaction",
    tag = "games",
    request_body = ReactionRequest,
    responses((status = 200, description = "Reaction relayed"))
)]
/// Relay a player reaction to the host screen.
pub async fn reaction(
    State(state): State<SharedState>,
    Json(payload): Json<ReactionRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    room_service::relay_reaction(&state, payload).await?;
    Ok(Envelope::empty())
}

#[derive(Debug, Deserialize)]
pub struct CategoriesQuery {
    pub game: CatalogGame,
}

#[utoipa::path(
    get,
    path = "/catalog/categories",
    tag = "games",
    params(("game" = String, Query, description = "Game family: quiz, liar, or marble")),
    responses((status = 200, description = "Seed categories for the game"))
)]
/// List the seed categories available to a game.
pub async fn list_categories(
    State(state): State<SharedState>,
    Query(query): Query<CategoriesQuery>,
) -> Json<Envelope<Vec<CategorySummary>>> {
    Envelope::ok(state.catalog().list_categories(query.game))
}
