use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        common::Envelope,
        team::{RandomTeamsRequest, ResetTeamsRequest, SelectTeamRequest, TeamStatusView},
    },
    error::AppError,
    services::team_service,
    state::SharedState,
};

/// Team management endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/teams/random", post(random_teams))
        .route("/teams/select", post(select_team))
        .route("/teams/reset", post(reset_teams))
        .route("/teams/status/{room_id}", get(team_status))
}

#[utoipa::path(
    post,
    path = "/teams/random",
    tag = "teams",
    request_body = RandomTeamsRequest,
    responses((status = 200, description = "Teams assigned", body = TeamStatusView))
)]
/// Shuffle the roster into evenly sized teams.
pub async fn random_teams(
    State(state): State<SharedState>,
    Json(payload): Json<RandomTeamsRequest>,
) -> Result<Json<Envelope<TeamStatusView>>, AppError> {
    payload.validate()?;
    let status =
        team_service::assign_random(&state, &payload.room_id, payload.team_count).await?;
    Ok(Envelope::ok(status))
}

#[utoipa::path(
    post,
    path = "/teams/select",
    tag = "teams",
    request_body = SelectTeamRequest,
    responses((status = 200, description = "Team selected"))
)]
/// Player-side opt-in to a team bucket.
pub async fn select_team(
    State(state): State<SharedState>,
    Json(payload): Json<SelectTeamRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    payload.validate()?;
    team_service::select_team(
        &state,
        &payload.room_id,
        &payload.device_id,
        &payload.team,
        payload.team_count,
    )
    .await?;
    Ok(Envelope::empty())
}

#[utoipa::path(
    post,
    path = "/teams/reset",
    tag = "teams",
    request_body = ResetTeamsRequest,
    responses((status = 200, description = "Teams cleared"))
)]
/// Clear team tags and announce manual picking.
pub async fn reset_teams(
    State(state): State<SharedState>,
    Json(payload): Json<ResetTeamsRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    payload.validate()?;
    team_service::reset_teams(&state, &payload.room_id, payload.team_count).await?;
    Ok(Envelope::empty())
}

#[utoipa::path(
    get,
    path = "/teams/status/{room_id}",
    tag = "teams",
    params(("room_id" = String, Path, description = "Room code")),
    responses((status = 200, description = "Team status", body = TeamStatusView))
)]
/// Current tag -> members mapping.
pub async fn team_status(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<Envelope<TeamStatusView>>, AppError> {
    let status = team_service::status(&state, &room_id).await?;
    Ok(Envelope::ok(status))
}
