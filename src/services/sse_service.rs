use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::{
    sync::mpsc,
    time::{Duration, timeout},
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;
use uuid::Uuid;

use crate::{
    dto::sse::ServerEvent, error::ServiceError, services::room_service, state::SharedState,
};

/// Identifies the stream so teardown can deregister exactly what it owns.
enum StreamKind {
    Host {
        room_id: String,
    },
    Player {
        room_id: String,
        device_id: String,
    },
}

/// Open the host event stream, validating the session token first.
pub async fn open_host(
    state: SharedState,
    room_id: String,
    session_id: String,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServiceError> {
    let room = room_service::load_room(&state, &room_id).await?;
    if room.host_session_token != session_id {
        return Err(ServiceError::Unauthorized(
            "host session token mismatch".into(),
        ));
    }
    let (stream_id, receiver) = state.bus().register_host(&room_id);
    info!(%room_id, "host stream connected");
    Ok(to_sse_stream(
        state,
        StreamKind::Host { room_id },
        stream_id,
        receiver,
    ))
}

/// Open a player event stream; the device must be in the roster.
pub async fn open_player(
    state: SharedState,
    room_id: String,
    device_id: String,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServiceError> {
    let room = room_service::load_room(&state, &room_id).await?;
    if room.player(&device_id).is_none() {
        return Err(ServiceError::NotFound(format!(
            "device `{device_id}` is not in room `{room_id}`"
        )));
    }
    let (stream_id, receiver) = state.bus().register_player(&room_id, &device_id);
    info!(%room_id, %device_id, "player stream connected");
    Ok(to_sse_stream(
        state,
        StreamKind::Player { room_id, device_id },
        stream_id,
        receiver,
    ))
}

/// Forward bus events into an SSE response until the client disconnects,
/// the bus replaces the stream, or it sits idle past the configured limit.
fn to_sse_stream(
    state: SharedState,
    kind: StreamKind,
    stream_id: Uuid,
    mut receiver: mpsc::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let idle_timeout = state.config().stream_idle_timeout;
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                received = timeout(idle_timeout, receiver.recv()) => match received {
                    Ok(Some(payload)) => {
                        let event = Event::default().event(payload.event).data(payload.data);
                        if tx.send(Ok(event)).await.is_err() {
                            break;
                        }
                    }
                    // Sender side dropped: the bus pruned or replaced us.
                    Ok(None) => break,
                    Err(_) => {
                        info!("event stream idle too long; retiring");
                        break;
                    }
                },
            }
        }

        match &kind {
            StreamKind::Host { room_id } => {
                state.bus().unregister_host(room_id, stream_id);
                info!(%room_id, "host stream disconnected");
            }
            StreamKind::Player { room_id, device_id } => {
                state.bus().unregister_player(room_id, device_id, stream_id);
                info!(%room_id, %device_id, "player stream disconnected");
            }
        }
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
