use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    dto::{
        common::Envelope,
        marble::{
            DiceRolledEvent, MarbleStateView, PenaltyView, RollRequest, RoomOnlyRequest,
            SelectModeRequest, SelectedPenaltiesView, SubmitPenaltyRequest, ToggleVoteRequest,
        },
    },
    error::AppError,
    services::marble_service,
    state::SharedState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomQuery {
    pub room_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteDoneRequest {
    pub room_id: String,
    pub device_id: String,
}

/// Marble command endpoints, nested under `/games/marble`.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/penalty", post(submit_penalty))
        .route("/penalties", get(list_penalties))
        .route("/vote", post(toggle_vote))
        .route("/vote/done", post(vote_done))
        .route("/vote/close", post(close_voting))
        .route("/mode", post(select_mode))
        .route("/roll", post(roll))
        .route("/end", post(end_game))
        .route("/state", get(state_view))
}

/// Submit one penalty suggestion (two per device at most).
pub async fn submit_penalty(
    State(state): State<SharedState>,
    Json(payload): Json<SubmitPenaltyRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    payload.validate()?;
    marble_service::submit_penalty(&state, &payload.room_id, &payload.device_id, payload.text)
        .await?;
    Ok(Envelope::empty())
}

/// List every submitted penalty for the voting screen.
pub async fn list_penalties(
    State(state): State<SharedState>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<Envelope<Vec<PenaltyView>>>, AppError> {
    let penalties = marble_service::list_penalties(&state, &query.room_id).await?;
    Ok(Envelope::ok(penalties))
}

/// Toggle a vote on a penalty.
pub async fn toggle_vote(
    State(state): State<SharedState>,
    Json(payload): Json<ToggleVoteRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    marble_service::toggle_vote(&state, &payload.room_id, &payload.device_id, &payload.penalty_id)
        .await?;
    Ok(Envelope::empty())
}

/// Mark a device as done voting.
pub async fn vote_done(
    State(state): State<SharedState>,
    Json(payload): Json<VoteDoneRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    marble_service::vote_done(&state, &payload.room_id, &payload.device_id).await?;
    Ok(Envelope::empty())
}

/// Host closes voting; the top 26 penalties are selected.
pub async fn close_voting(
    State(state): State<SharedState>,
    Json(payload): Json<RoomOnlyRequest>,
) -> Result<Json<Envelope<SelectedPenaltiesView>>, AppError> {
    let selected = marble_service::close_voting(&state, &payload.room_id).await?;
    Ok(Envelope::ok(selected))
}

/// Host picks team or solo mode; the board is generated here.
pub async fn select_mode(
    State(state): State<SharedState>,
    Json(payload): Json<SelectModeRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    marble_service::select_mode(&state, &payload.room_id, payload.mode).await?;
    Ok(Envelope::empty())
}

/// Roll the die for the current turn holder.
pub async fn roll(
    State(state): State<SharedState>,
    Json(payload): Json<RollRequest>,
) -> Result<Json<Envelope<DiceRolledEvent>>, AppError> {
    let rolled = marble_service::roll(&state, &payload.room_id, &payload.device_id).await?;
    Ok(Envelope::ok(rolled))
}

/// Host ends the marble game and purges its state.
pub async fn end_game(
    State(state): State<SharedState>,
    Json(payload): Json<RoomOnlyRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    marble_service::end_game(&state, &payload.room_id).await?;
    Ok(Envelope::empty())
}

/// Reconnect read of the marble state.
pub async fn state_view(
    State(state): State<SharedState>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<Envelope<MarbleStateView>>, AppError> {
    let view = marble_service::view(&state, &query.room_id).await?;
    Ok(Envelope::ok(view))
}
