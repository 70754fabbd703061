//! Room and roster model persisted under `room:{id}:info`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::games::{GameKind, mafia::MafiaRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Ended,
}

/// One participant phone. `role` is only populated while a mafia game is
/// live and must never reach public room reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub device_id: String,
    pub nickname: String,
    pub team: Option<String>,
    pub role: Option<MafiaRole>,
    pub alive: bool,
    pub profile: Option<String>,
}

impl Player {
    pub fn new(nickname: String, profile: Option<String>) -> Self {
        Self {
            device_id: Uuid::new_v4().simple().to_string(),
            nickname,
            team: None,
            role: None,
            alive: true,
            profile,
        }
    }
}

/// Authoritative room document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: String,
    pub host_session_token: String,
    pub status: RoomStatus,
    pub current_game: Option<GameKind>,
    pub players: Vec<Player>,
}

impl RoomInfo {
    pub fn new(room_id: String) -> Self {
        Self {
            room_id,
            host_session_token: Uuid::new_v4().simple().to_string(),
            status: RoomStatus::Waiting,
            current_game: None,
            players: Vec::new(),
        }
    }

    pub fn player(&self, device_id: &str) -> Option<&Player> {
        self.players
            .iter()
            .find(|player| player.device_id == device_id)
    }

    pub fn player_mut(&mut self, device_id: &str) -> Option<&mut Player> {
        self.players
            .iter_mut()
            .find(|player| player.device_id == device_id)
    }

    pub fn has_nickname(&self, nickname: &str) -> bool {
        self.players.iter().any(|player| player.nickname == nickname)
    }

    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|player| player.alive)
    }

    /// Distinct team tags in roster order.
    pub fn team_tags(&self) -> Vec<String> {
        let mut tags = Vec::new();
        for player in &self.players {
            if let Some(tag) = &player.team {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_tags_preserve_roster_order() {
        let mut room = RoomInfo::new("AB7Q".into());
        for (nickname, team) in [("a", "B"), ("b", "A"), ("c", "B"), ("d", "A")] {
            let mut player = Player::new(nickname.into(), None);
            player.team = Some(team.into());
            room.players.push(player);
        }
        assert_eq!(room.team_tags(), vec!["B".to_string(), "A".to_string()]);
    }

    #[test]
    fn lookup_by_device_id() {
        let mut room = RoomInfo::new("AB7Q".into());
        let player = Player::new("alice".into(), None);
        let device_id = player.device_id.clone();
        room.players.push(player);
        assert!(room.player(&device_id).is_some());
        assert!(room.player("missing").is_none());
    }
}
