use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::room::PlayerView;

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RandomTeamsRequest {
    pub room_id: String,
    #[validate(range(min = 2, max = 8, message = "teamCount must be between 2 and 8"))]
    pub team_count: usize,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SelectTeamRequest {
    pub room_id: String,
    pub device_id: String,
    pub team: String,
    #[validate(range(min = 2, max = 8, message = "teamCount must be between 2 and 8"))]
    pub team_count: usize,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetTeamsRequest {
    pub room_id: String,
    #[validate(range(min = 2, max = 8, message = "teamCount must be between 2 and 8"))]
    pub team_count: usize,
}

/// Tag -> members mapping plus anyone still without a team.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamStatusView {
    pub teams: IndexMap<String, Vec<PlayerView>>,
    pub unassigned: Vec<PlayerView>,
}

/// `PLAYER_TEAM_SELECTED`, sent to host and players after an opt-in.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerTeamSelectedEvent {
    pub device_id: String,
    pub nickname: String,
    pub team: String,
}

/// `TEAM_MANUAL_START`, sent when the host clears teams for manual picking.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamManualStartEvent {
    pub team_count: usize,
}
