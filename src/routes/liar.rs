use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    dto::{
        common::Envelope,
        liar::{
            GuessRequest, LiarPublicStateView, LiarRoleView, MoreRoundVoteRequest,
            PointingVoteRequest, StartLiarRequest,
        },
    },
    error::AppError,
    services::liar_service,
    state::SharedState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceQuery {
    pub room_id: String,
    pub device_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomQuery {
    pub room_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomOnlyRequest {
    pub room_id: String,
}

/// Liar command endpoints, nested under `/games/liar`.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/start", post(start))
        .route("/role", get(role))
        .route("/vote-more-round", post(vote_more_round))
        .route("/pointing/start", post(start_pointing_vote))
        .route("/pointing/vote", post(pointing_vote))
        .route("/guess", post(guess))
        .route("/state", get(state_view))
}

/// Draw a keyword, pick the liar, and start the role reveal.
pub async fn start(
    State(state): State<SharedState>,
    Json(payload): Json<StartLiarRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    liar_service::initialize(&state, &payload.room_id, payload.category_id).await?;
    Ok(Envelope::empty())
}

/// Per-device role fetch; the liar receives no keyword.
pub async fn role(
    State(state): State<SharedState>,
    Query(query): Query<DeviceQuery>,
) -> Result<Json<Envelope<LiarRoleView>>, AppError> {
    let view = liar_service::role_of(&state, &query.room_id, &query.device_id).await?;
    Ok(Envelope::ok(view))
}

/// Vote on whether to run a second explanation round.
pub async fn vote_more_round(
    State(state): State<SharedState>,
    Json(payload): Json<MoreRoundVoteRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    liar_service::vote_more_round(
        &state,
        &payload.room_id,
        &payload.device_id,
        payload.want_more,
    )
    .await?;
    Ok(Envelope::empty())
}

/// Host opens the pointing vote.
pub async fn start_pointing_vote(
    State(state): State<SharedState>,
    Json(payload): Json<RoomOnlyRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    liar_service::start_pointing_vote(&state, &payload.room_id).await?;
    Ok(Envelope::empty())
}

/// Point at the suspected liar.
pub async fn pointing_vote(
    State(state): State<SharedState>,
    Json(payload): Json<PointingVoteRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    liar_service::pointing_vote(
        &state,
        &payload.room_id,
        &payload.device_id,
        &payload.target_device_id,
    )
    .await?;
    Ok(Envelope::empty())
}

/// The cornered liar guesses the keyword or passes.
pub async fn guess(
    State(state): State<SharedState>,
    Json(payload): Json<GuessRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    liar_service::guess(
        &state,
        &payload.room_id,
        &payload.device_id,
        payload.guess,
        payload.pass,
    )
    .await?;
    Ok(Envelope::empty())
}

/// Public state for reconnecting clients.
pub async fn state_view(
    State(state): State<SharedState>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<Envelope<LiarPublicStateView>>, AppError> {
    let view = liar_service::public_state(&state, &query.room_id).await?;
    Ok(Envelope::ok(view))
}
