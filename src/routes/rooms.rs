use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        common::Envelope,
        room::{CreateRoomResponse, JoinRoomRequest, JoinRoomResponse, RoomView},
    },
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Room lifecycle endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/join", post(join_room))
        .route("/rooms/{room_id}", get(room_info))
}

#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    responses((status = 200, description = "Room created", body = CreateRoomResponse))
)]
/// Create a room and mint the host session token.
pub async fn create_room(
    State(state): State<SharedState>,
) -> Result<Json<Envelope<CreateRoomResponse>>, AppError> {
    let created = room_service::create_room(&state).await?;
    Ok(Envelope::ok(created))
}

#[utoipa::path(
    post,
    path = "/rooms/join",
    tag = "rooms",
    request_body = JoinRoomRequest,
    responses((status = 200, description = "Joined", body = JoinRoomResponse))
)]
/// Join a room with a unique nickname.
pub async fn join_room(
    State(state): State<SharedState>,
    Json(payload): Json<JoinRoomRequest>,
) -> Result<Json<Envelope<JoinRoomResponse>>, AppError> {
    payload.validate()?;
    let joined = room_service::join(&state, payload).await?;
    Ok(Envelope::ok(joined))
}

#[utoipa::path(
    get,
    path = "/rooms/{room_id}",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Room code")),
    responses((status = 200, description = "Room info", body = RoomView))
)]
/// Read the full room document (roles stripped).
pub async fn room_info(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<Envelope<RoomView>>, AppError> {
    let view = room_service::info(&state, &room_id).await?;
    Ok(Envelope::ok(view))
}
