use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::games::mafia::{MafiaPhase, MafiaRole, MafiaState, MafiaWinner};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartMafiaRequest {
    pub room_id: String,
}

/// Private role disclosure, fetched per device.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MafiaRoleView {
    pub role: MafiaRole,
    /// Fellow mafia nicknames; empty for every other role.
    pub mates: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NightActionRequest {
    pub room_id: String,
    pub device_id: String,
    pub target_device_id: String,
}

/// Returned synchronously to the policeman only.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvestigateResponse {
    pub target_device_id: String,
    pub target_nickname: String,
    pub is_mafia: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MafiaVoteRequest {
    pub room_id: String,
    pub device_id: String,
    pub target_device_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinalVoteRequest {
    pub room_id: String,
    pub device_id: String,
    /// `true` votes to execute.
    pub kill: bool,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatPostRequest {
    pub room_id: String,
    pub device_id: String,
    #[validate(length(min = 1, max = 200, message = "message must be 1-200 characters"))]
    pub message: String,
}

/// Append-only mafia chat entry; also the `MAFIA_CHAT` event payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub device_id: String,
    pub nickname: String,
    pub message: String,
    pub timestamp: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForcePhaseRequest {
    pub room_id: String,
    pub phase: MafiaPhase,
}

/// `MAFIA_PHASE_CHANGED`, broadcast on every transition.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MafiaPhaseChangedEvent {
    pub phase: MafiaPhase,
    pub day_count: u32,
    pub timer_sec: u64,
}

/// `MAFIA_DAY_ANNOUNCEMENT`, the resolved night narrative.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DayAnnouncementEvent {
    pub killed_device_id: Option<String>,
    pub killed_nickname: Option<String>,
    pub was_saved: bool,
    pub day_count: u32,
}

/// `MAFIA_VOTE_STATUS`, ballot progress without revealing targets.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatusEvent {
    pub voted: usize,
    pub total: usize,
}

/// `MAFIA_VOTE_RESULT`, broadcast when the day vote closes.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteResultEvent {
    /// Nickname -> ballot count.
    pub tally: IndexMap<String, usize>,
    pub execution_target: Option<String>,
    pub execution_nickname: Option<String>,
}

/// `MAFIA_FINAL_VOTE_RESULT`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinalVoteResultEvent {
    pub kill_votes: usize,
    pub save_votes: usize,
    pub executed: bool,
    pub target_device_id: String,
    pub target_nickname: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MafiaRevealEntry {
    pub device_id: String,
    pub nickname: String,
    pub role: MafiaRole,
    pub alive: bool,
}

/// `MAFIA_GAME_END`, publishing every role.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MafiaGameEndEvent {
    pub winner: MafiaWinner,
    pub players: Vec<MafiaRevealEntry>,
}

/// Public state projection: night targets and ballots stay private.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MafiaPublicStateView {
    pub phase: MafiaPhase,
    pub day_count: u32,
    pub timer_sec: u64,
    pub dead_players: Vec<String>,
    pub execution_target: Option<String>,
    pub winner: Option<MafiaWinner>,
}

impl From<&MafiaState> for MafiaPublicStateView {
    fn from(state: &MafiaState) -> Self {
        Self {
            phase: state.phase,
            day_count: state.day_count,
            timer_sec: state.timer_sec,
            dead_players: state.dead_players.clone(),
            execution_target: state.execution_target.clone(),
            winner: state.winner,
        }
    }
}
