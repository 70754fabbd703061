use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::games::liar::{LiarPhase, LiarState, LiarWinner};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartLiarRequest {
    pub room_id: String,
    pub category_id: u32,
}

/// Per-device role disclosure. The liar never sees the keyword.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiarRoleView {
    pub is_liar: bool,
    pub keyword: Option<String>,
    pub category_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoreRoundVoteRequest {
    pub room_id: String,
    pub device_id: String,
    pub want_more: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PointingVoteRequest {
    pub room_id: String,
    pub device_id: String,
    pub target_device_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuessRequest {
    pub room_id: String,
    pub device_id: String,
    #[serde(default)]
    pub guess: Option<String>,
    /// Give up instead of guessing.
    #[serde(default)]
    pub pass: bool,
}

/// `LIAR_INIT`, sent to the host with the keyword withheld.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiarInitEvent {
    pub category_name: String,
    /// Speaker nicknames in explanation order.
    pub explanation_order: Vec<String>,
    pub player_count: usize,
}

/// `LIAR_PHASE_CHANGED`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiarPhaseChangedEvent {
    pub phase: LiarPhase,
    pub timer_sec: u64,
}

/// `LIAR_EXPLANATION_TURN`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationTurnEvent {
    pub device_id: String,
    pub nickname: String,
    pub index: usize,
    pub round_count: u32,
}

/// `LIAR_MORE_ROUND_RESULT`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoreRoundResultEvent {
    pub more: usize,
    pub stop: usize,
    pub second_round: bool,
}

/// `LIAR_POINTING_VOTE_STATUS`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PointingVoteStatusEvent {
    pub voted: usize,
    pub total: usize,
}

/// `LIAR_POINTING_RESULT`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PointingResultEvent {
    pub pointed_device_id: String,
    pub pointed_nickname: String,
    pub is_liar_caught: bool,
}

/// `LIAR_GAME_END`, revealing everything.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiarGameEndEvent {
    pub keyword: String,
    pub liar_device_id: String,
    pub liar_nickname: String,
    pub pointed_device_id: Option<String>,
    pub liar_guess: Option<String>,
    pub is_guess_correct: bool,
    pub winner: LiarWinner,
}

/// Reconnect view; the keyword and liar identity stay hidden until the end.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LiarPublicStateView {
    pub phase: LiarPhase,
    pub category_name: String,
    pub explanation_order: Vec<String>,
    pub current_explainer_index: usize,
    pub round_count: u32,
    pub pointed_device_id: Option<String>,
    pub keyword: Option<String>,
    pub liar_device_id: Option<String>,
    pub winner: Option<LiarWinner>,
}

impl From<&LiarState> for LiarPublicStateView {
    fn from(state: &LiarState) -> Self {
        let finished = state.phase == LiarPhase::GameEnd;
        Self {
            phase: state.phase,
            category_name: state.category_name.clone(),
            explanation_order: state.explanation_order.clone(),
            current_explainer_index: state.current_explainer_index,
            round_count: state.round_count,
            pointed_device_id: state.pointed_device_id.clone(),
            keyword: finished.then(|| state.keyword.clone()),
            liar_device_id: finished.then(|| state.liar_device_id.clone()),
            winner: state.winner,
        }
    }
}
