use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::games::marble::{BoardCell, MarbleMode, MarbleState};

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPenaltyRequest {
    pub room_id: String,
    pub device_id: String,
    #[validate(length(min = 1, max = 60, message = "penalty must be 1-60 characters"))]
    pub text: String,
}

/// `MARBLE_PENALTY_PROGRESS`, broadcast after every submission.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyProgressEvent {
    pub total_count: usize,
    pub expected_count: usize,
    pub is_all_submitted: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyView {
    pub penalty_id: String,
    pub text: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToggleVoteRequest {
    pub room_id: String,
    pub device_id: String,
    pub penalty_id: String,
}

/// One row of the `MARBLE_VOTE_STATUS` snapshot, sorted by count descending.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatusEntry {
    pub penalty_id: String,
    pub text: String,
    pub count: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomOnlyRequest {
    pub room_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectedPenaltiesView {
    pub penalties: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectModeRequest {
    pub room_id: String,
    pub mode: MarbleMode,
}

/// `MARBLE_GAME_STARTED`, carrying the generated board and turn order.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarbleStartedEvent {
    pub mode: MarbleMode,
    pub board: Vec<BoardCell>,
    pub turn_order: Vec<String>,
    pub first_turn: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RollRequest {
    pub room_id: String,
    pub device_id: String,
}

/// `MARBLE_DICE_ROLLED`, broadcast to everyone after a roll.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiceRolledEvent {
    pub dice: u8,
    /// Team tag in team mode, device id in solo mode.
    pub mover: String,
    pub mover_nickname: String,
    pub position: usize,
    pub cell: BoardCell,
    pub next_turn: String,
}

/// `MARBLE_TURN_CHANGE`, telling controllers whose dice button is live.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TurnChangeEvent {
    pub turn: String,
    pub turn_device_ids: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarbleStateView {
    pub mode: MarbleMode,
    pub board: Vec<BoardCell>,
    pub positions: Vec<PositionRow>,
    pub turn: Option<String>,
    pub last_dice: Option<u8>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PositionRow {
    pub holder: String,
    pub position: usize,
}

impl From<&MarbleState> for MarbleStateView {
    fn from(state: &MarbleState) -> Self {
        Self {
            mode: state.mode,
            board: state.board.clone(),
            positions: state
                .positions
                .iter()
                .map(|(holder, position)| PositionRow {
                    holder: holder.clone(),
                    position: *position,
                })
                .collect(),
            turn: state.current_turn().cloned(),
            last_dice: state.last_dice,
        }
    }
}
