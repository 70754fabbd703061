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
        mafia::{
            ChatMessage, ChatPostRequest, FinalVoteRequest, ForcePhaseRequest, InvestigateResponse,
            MafiaPublicStateView, MafiaRoleView, MafiaVoteRequest, NightActionRequest,
            StartMafiaRequest,
        },
    },
    error::AppError,
    services::mafia_service,
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

/// Mafia command endpoints, nested under `/games/mafia`.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/start", post(start))
        .route("/role", get(role))
        .route("/night/kill", post(night_kill))
        .route("/night/save", post(night_save))
        .route("/night/investigate", post(night_investigate))
        .route("/vote", post(vote))
        .route("/final-vote", post(final_vote))
        .route("/chat", post(chat_post).get(chat_list))
        .route("/force-phase", post(force_phase))
        .route("/state", get(state_view))
}

/// Deal roles and open the first night.
pub async fn start(
    State(state): State<SharedState>,
    Json(payload): Json<StartMafiaRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    mafia_service::initialize(&state, &payload.room_id).await?;
    Ok(Envelope::empty())
}

/// Private role fetch for one device.
pub async fn role(
    State(state): State<SharedState>,
    Query(query): Query<DeviceQuery>,
) -> Result<Json<Envelope<MafiaRoleView>>, AppError> {
    let view = mafia_service::role_of(&state, &query.room_id, &query.device_id).await?;
    Ok(Envelope::ok(view))
}

/// Mafia choose tonight's victim.
pub async fn night_kill(
    State(state): State<SharedState>,
    Json(payload): Json<NightActionRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    mafia_service::mafia_kill(
        &state,
        &payload.room_id,
        &payload.device_id,
        &payload.target_device_id,
    )
    .await?;
    Ok(Envelope::empty())
}

/// The doctor shields a player for the night.
pub async fn night_save(
    State(state): State<SharedState>,
    Json(payload): Json<NightActionRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    mafia_service::doctor_save(
        &state,
        &payload.room_id,
        &payload.device_id,
        &payload.target_device_id,
    )
    .await?;
    Ok(Envelope::empty())
}

/// The policeman checks a player; the verdict returns only in this response.
pub async fn night_investigate(
    State(state): State<SharedState>,
    Json(payload): Json<NightActionRequest>,
) -> Result<Json<Envelope<InvestigateResponse>>, AppError> {
    let report = mafia_service::police_investigate(
        &state,
        &payload.room_id,
        &payload.device_id,
        &payload.target_device_id,
    )
    .await?;
    Ok(Envelope::ok(report))
}

/// Day-vote ballot, last write wins per voter.
pub async fn vote(
    State(state): State<SharedState>,
    Json(payload): Json<MafiaVoteRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    mafia_service::vote(
        &state,
        &payload.room_id,
        &payload.device_id,
        &payload.target_device_id,
    )
    .await?;
    Ok(Envelope::empty())
}

/// Kill-or-save ballot on the accused.
pub async fn final_vote(
    State(state): State<SharedState>,
    Json(payload): Json<FinalVoteRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    mafia_service::final_vote(&state, &payload.room_id, &payload.device_id, payload.kill).await?;
    Ok(Envelope::empty())
}

/// Post to the mafia-only chat.
pub async fn chat_post(
    State(state): State<SharedState>,
    Json(payload): Json<ChatPostRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    payload.validate()?;
    mafia_service::chat_post(&state, &payload.room_id, &payload.device_id, payload.message)
        .await?;
    Ok(Envelope::empty())
}

/// Read the mafia-only chat log.
pub async fn chat_list(
    State(state): State<SharedState>,
    Query(query): Query<DeviceQuery>,
) -> Result<Json<Envelope<Vec<ChatMessage>>>, AppError> {
    let log = mafia_service::chat_list(&state, &query.room_id, &query.device_id).await?;
    Ok(Envelope::ok(log))
}

/// Debug-only phase override; skips winner checks by design.
pub async fn force_phase(
    State(state): State<SharedState>,
    Json(payload): Json<ForcePhaseRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    mafia_service::force_phase(&state, &payload.room_id, payload.phase).await?;
    Ok(Envelope::empty())
}

/// Public state projection for reconnecting clients.
pub async fn state_view(
    State(state): State<SharedState>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<Envelope<MafiaPublicStateView>>, AppError> {
    let view = mafia_service::public_state(&state, &query.room_id).await?;
    Ok(Envelope::ok(view))
}
