use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::games::truth::{FaceTrackingSample, LieAnalysis, TruthPhase, TruthState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartTruthRequest {
    pub room_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectAnswererRequest {
    pub room_id: String,
    /// Absent means the server picks a random player.
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuestionRequest {
    pub room_id: String,
    pub device_id: String,
    #[validate(length(min = 1, max = 100, message = "question must be 1-100 characters"))]
    pub text: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TruthCommandRequest {
    pub room_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionVoteRequest {
    pub room_id: String,
    pub device_id: String,
    pub question_index: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteDoneRequest {
    pub room_id: String,
    pub device_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FaceDataRequest {
    pub room_id: String,
    pub device_id: String,
    pub sample: FaceTrackingSample,
}

/// `TRUTH_PHASE_CHANGED`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TruthPhaseChangedEvent {
    pub phase: TruthPhase,
    pub round: u32,
}

/// `TRUTH_ANSWERER_SELECTED`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswererSelectedEvent {
    pub device_id: String,
    pub nickname: String,
    pub round: u32,
}

/// `TRUTH_QUESTION_PROGRESS`, host stream only.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionProgressEvent {
    pub count: usize,
}

/// `TRUTH_QUESTION_SELECTED`, the host's reroll candidate.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSelectedEvent {
    pub index: usize,
    pub text: String,
}

/// `TRUTH_QUESTION_CONFIRMED`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionConfirmedEvent {
    pub text: String,
}

/// `TRUTH_QUESTION_VOTE_STATUS`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionVoteStatusEvent {
    pub done: usize,
    pub total: usize,
}

/// `TRUTH_FACE_DATA`, forwarded to the host for the live overlay.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FaceDataEvent {
    pub sample: FaceTrackingSample,
}

/// `TRUTH_RESULT`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TruthResultEvent {
    pub answerer_device_id: String,
    pub answerer_nickname: String,
    pub question: Option<String>,
    pub analysis: LieAnalysis,
}

/// Reconnect view; raw samples are summarized, not replayed.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TruthStateView {
    pub phase: TruthPhase,
    pub round: u32,
    pub current_answerer: Option<String>,
    pub current_question: Option<String>,
    pub question_count: usize,
    pub sample_count: usize,
    pub last_result: Option<LieAnalysis>,
}

impl From<&TruthState> for TruthStateView {
    fn from(state: &TruthState) -> Self {
        Self {
            phase: state.phase,
            round: state.round,
            current_answerer: state.current_answerer.clone(),
            current_question: state
                .current_question
                .as_ref()
                .map(|question| question.text.clone()),
            question_count: state.submitted_questions.len(),
            sample_count: state.face_tracking_data.len(),
            last_result: state.last_result.clone(),
        }
    }
}
