//! Room registry: creation, joins, info reads, game start, reactions.

use rand::Rng;
use tracing::info;

use crate::{
    dto::room::{
        CreateRoomResponse, GameStartedEvent, JoinRoomRequest, JoinRoomResponse, PlayerJoinedEvent,
        ReactionEvent, ReactionRequest, RoomView,
    },
    error::ServiceError,
    games::GameKind,
    state::{
        SharedState,
        room::{Player, RoomInfo, RoomStatus},
    },
    store::keys,
};

/// Ambiguity-free room code alphabet: A-Z and 0-9 minus 0, O, 1, I.
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ROOM_CODE_LEN: usize = 4;
/// Collision bound; the 32^4 key space makes exhaustion a config error.
const MAX_CODE_ATTEMPTS: usize = 1_000;

const EVENT_PLAYER_JOINED: &str = "PLAYER_JOINED";
const EVENT_GAME_STARTED: &str = "GAME_STARTED";
const EVENT_REACTION: &str = "REACTION";

/// Read the room document or surface `notFound`, the uniform answer for
/// absent and TTL-expired rooms alike.
pub async fn load_room(state: &SharedState, room_id: &str) -> Result<RoomInfo, ServiceError> {
    state
        .store()
        .read_json(&keys::room_info(room_id))
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}` not found")))
}

pub async fn save_room(state: &SharedState, room: &RoomInfo) -> Result<(), ServiceError> {
    state
        .store()
        .write_json(&keys::room_info(&room.room_id), room)
        .await?;
    Ok(())
}

/// Create a room and mint the host session token.
pub async fn create_room(state: &SharedState) -> Result<CreateRoomResponse, ServiceError> {
    let room_id = generate_room_code(state).await?;
    let room = RoomInfo::new(room_id.clone());
    save_room(state, &room).await?;
    info!(%room_id, "room created");
    Ok(CreateRoomResponse {
        room_id,
        host_session_token: room.host_session_token,
    })
}

/// Rejection-sample a fresh code against live room keys.
async fn generate_room_code(state: &SharedState) -> Result<String, ServiceError> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = random_room_code();
        if !state.store().exists(&keys::room_info(&code)).await? {
            return Ok(code);
        }
    }
    Err(ServiceError::Conflict(
        "room code space exhausted".to_string(),
    ))
}

fn random_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| {
            let index = rng.random_range(0..ROOM_CODE_ALPHABET.len());
            ROOM_CODE_ALPHABET[index] as char
        })
        .collect()
}

/// Admit a player: unique nickname, fresh device id, `PLAYER_JOINED` to the
/// host.
pub async fn join(
    state: &SharedState,
    request: JoinRoomRequest,
) -> Result<JoinRoomResponse, ServiceError> {
    let mut room = load_room(state, &request.room_id).await?;
    if room.status != RoomStatus::Waiting {
        return Err(ServiceError::InvalidState(
            "room is no longer accepting players".into(),
        ));
    }
    if room.has_nickname(&request.nickname) {
        return Err(ServiceError::Conflict(format!(
            "nickname `{}` is already taken",
            request.nickname
        )));
    }

    let player = Player::new(request.nickname.clone(), request.profile);
    let response = JoinRoomResponse {
        device_id: player.device_id.clone(),
        nickname: player.nickname.clone(),
    };
    room.players.push(player);
    save_room(state, &room).await?;

    state.bus().broadcast_host(
        &room.room_id,
        EVENT_PLAYER_JOINED,
        &PlayerJoinedEvent {
            device_id: response.device_id.clone(),
            nickname: response.nickname.clone(),
            total: room.players.len(),
        },
    );
    info!(room_id = %room.room_id, nickname = %response.nickname, "player joined");
    Ok(response)
}

pub async fn info(state: &SharedState, room_id: &str) -> Result<RoomView, ServiceError> {
    let room = load_room(state, room_id).await?;
    Ok(RoomView::from(&room))
}

/// Move the room into `playing` with the chosen game. Any state left over
/// from a previous game is replaced wholesale: its keys and timers go away
/// before the new game's `initialize` runs.
pub async fn start_game(
    state: &SharedState,
    room_id: &str,
    game: GameKind,
) -> Result<(), ServiceError> {
    let mut room = load_room(state, room_id).await?;
    room.status = RoomStatus::Playing;
    room.current_game = Some(game);
    // Mafia roles are game-scoped; a switch wipes them along with liveness.
    for player in &mut room.players {
        player.role = None;
        player.alive = true;
    }
    save_room(state, &room).await?;

    state.scheduler().cleanup(room_id);
    for key in [
        keys::marble_state(room_id),
        keys::marble_penalties(room_id),
        keys::marble_votes(room_id),
        keys::marble_selected(room_id),
        keys::marble_vote_done(room_id),
        keys::mafia_state(room_id),
        keys::mafia_chat(room_id),
        keys::liar_state(room_id),
        keys::quiz_state(room_id),
        keys::truth_state(room_id),
    ] {
        state.store().delete(&key).await?;
    }
    state
        .bus()
        .broadcast_all(room_id, EVENT_GAME_STARTED, &GameStartedEvent { game });
    info!(%room_id, game = game.as_str(), "game started");
    Ok(())
}

/// Relay a player reaction to the host screen.
pub async fn relay_reaction(
    state: &SharedState,
    request: ReactionRequest,
) -> Result<(), ServiceError> {
    let room = load_room(state, &request.room_id).await?;
    let player = room.player(&request.device_id).ok_or_else(|| {
        ServiceError::NotFound(format!("device `{}` is not in the room", request.device_id))
    })?;
    state.bus().broadcast_host(
        &request.room_id,
        EVENT_REACTION,
        &ReactionEvent {
            device_id: player.device_id.clone(),
            nickname: player.nickname.clone(),
            kind: request.kind,
        },
    );
    Ok(())
}
