use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    games::GameKind,
    state::room::{Player, RoomInfo, RoomStatus},
};

/// Issued to the host on room creation.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: String,
    pub host_session_token: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub room_id: String,
    /// Display name, unique within the room.
    #[validate(length(min = 1, max = 8, message = "nickname must be 1-8 characters"))]
    pub nickname: String,
    #[serde(default)]
    pub profile: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomResponse {
    pub device_id: String,
    pub nickname: String,
}

/// Public projection of a roster entry. Mafia roles never appear here.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub device_id: String,
    pub nickname: String,
    pub team: Option<String>,
    pub alive: bool,
    pub profile: Option<String>,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            device_id: player.device_id.clone(),
            nickname: player.nickname.clone(),
            team: player.team.clone(),
            alive: player.alive,
            profile: player.profile.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub room_id: String,
    pub status: RoomStatus,
    pub current_game: Option<GameKind>,
    pub players: Vec<PlayerView>,
}

impl From<&RoomInfo> for RoomView {
    fn from(room: &RoomInfo) -> Self {
        Self {
            room_id: room.room_id.clone(),
            status: room.status,
            current_game: room.current_game,
            players: room.players.iter().map(PlayerView::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartGameRequest {
    pub room_id: String,
    pub game_code: GameKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Firework,
    Boo,
    Laugh,
    Angry,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequest {
    pub room_id: String,
    pub device_id: String,
    #[serde(rename = "type")]
    pub kind: ReactionKind,
}

/// `PLAYER_JOINED`, delivered to the host stream.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoinedEvent {
    pub device_id: String,
    pub nickname: String,
    pub total: usize,
}

/// `GAME_STARTED`, delivered to everyone.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameStartedEvent {
    pub game: GameKind,
}

/// `REACTION`, relayed to the host stream.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReactionEvent {
    pub device_id: String,
    pub nickname: String,
    #[serde(rename = "type")]
    pub kind: ReactionKind,
}
