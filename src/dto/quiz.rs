use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::games::quiz::{QuizPhase, QuizState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartQuizRequest {
    pub room_id: String,
    pub category_id: u32,
    #[serde(default)]
    pub round_time_seconds: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizCommandRequest {
    pub room_id: String,
}

/// `QUIZ_GAME_STARTED`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizStartedEvent {
    pub teams: Vec<String>,
    pub first_team: String,
    pub round_time_seconds: u64,
    pub category_name: String,
}

/// `QUIZ_ROUND_START`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoundStartEvent {
    pub team: String,
    pub round_time_seconds: u64,
}

/// `QUIZ_WORD`, host stream only; the host device shows the word.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WordEvent {
    pub word: Option<String>,
}

/// `QUIZ_SCORE`, live score of the playing team.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEvent {
    pub team: String,
    pub score: u32,
}

/// `QUIZ_ROUND_END`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoundEndEvent {
    pub team: String,
    pub score: u32,
    pub team_scores: IndexMap<String, u32>,
}

/// `QUIZ_TEAM_CHANGED`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamChangedEvent {
    pub team: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamScoreRow {
    pub team: String,
    pub score: u32,
}

/// Final ranking; also the `QUIZ_FINAL_RESULT` payload.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizResultView {
    pub ranking: Vec<TeamScoreRow>,
    pub is_complete: bool,
}

impl From<&QuizState> for QuizResultView {
    fn from(state: &QuizState) -> Self {
        Self {
            ranking: state
                .ranking()
                .into_iter()
                .map(|(team, score)| TeamScoreRow { team, score })
                .collect(),
            is_complete: state.is_complete(),
        }
    }
}

/// Reconnect view; the word queue stays hidden.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizStateView {
    pub phase: QuizPhase,
    pub teams: Vec<String>,
    pub current_team: Option<String>,
    pub round_time_seconds: u64,
    pub remaining_time: u64,
    pub team_scores: IndexMap<String, u32>,
    pub completed_teams: Vec<String>,
    pub current_round_score: u32,
    pub current_word: Option<String>,
}

impl From<&QuizState> for QuizStateView {
    fn from(state: &QuizState) -> Self {
        Self {
            phase: state.phase,
            teams: state.teams.clone(),
            current_team: state.current_team().cloned(),
            round_time_seconds: state.round_time_seconds,
            remaining_time: state.remaining_time,
            team_scores: state.team_scores.clone(),
            completed_teams: state.completed_teams.clone(),
            current_round_score: state.current_round_score,
            current_word: state.current_word.clone(),
        }
    }
}
