use std::convert::Infallible;

use axum::{
    Router,
    extract::{Query, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use serde::Deserialize;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConnectQuery {
    pub room_id: String,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerConnectQuery {
    pub room_id: String,
    pub device_id: String,
}

#[utoipa::path(
    get,
    path = "/sse/connect",
    tag = "sse",
    params(
        ("roomId" = String, Query, description = "Room code"),
        ("sessionId" = String, Query, description = "Host session token"),
    ),
    responses((status = 200, description = "Host event stream", content_type = "text/event-stream", body = String))
)]
/// Open the host event stream for a room.
pub async fn host_stream(
    State(state): State<SharedState>,
    Query(query): Query<HostConnectQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let stream = sse_service::open_host(state, query.room_id, query.session_id).await?;
    Ok(stream)
}

#[utoipa::path(
    get,
    path = "/sse/player/connect",
    tag = "sse",
    params(
        ("roomId" = String, Query, description = "Room code"),
        ("deviceId" = String, Query, description = "Player device id"),
    ),
    responses((status = 200, description = "Player event stream", content_type = "text/event-stream", body = String))
)]
/// Open a player event stream for a joined device.
pub async fn player_stream(
    State(state): State<SharedState>,
    Query(query): Query<PlayerConnectQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let stream = sse_service::open_player(state, query.room_id, query.device_id).await?;
    Ok(stream)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/connect", get(host_stream))
        .route("/sse/player/connect", get(player_stream))
}
