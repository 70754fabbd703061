use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    dto::{
        common::Envelope,
        quiz::{QuizCommandRequest, QuizResultView, QuizStateView, StartQuizRequest},
    },
    error::AppError,
    services::quiz_service,
    state::SharedState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomQuery {
    pub room_id: String,
}

/// Quiz command endpoints, nested under `/games/quiz`.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/start", post(start))
        .route("/round/start", post(start_round))
        .route("/correct", post(correct))
        .route("/pass", post(pass))
        .route("/next-team", post(next_team))
        .route("/result", get(result))
        .route("/state", get(state_view))
}

/// Create the quiz from the room's teams and the chosen category.
pub async fn start(
    State(state): State<SharedState>,
    Json(payload): Json<StartQuizRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    quiz_service::initialize(
        &state,
        &payload.room_id,
        payload.category_id,
        payload.round_time_seconds,
    )
    .await?;
    Ok(Envelope::empty())
}

/// Start the current team's round and its countdown.
pub async fn start_round(
    State(state): State<SharedState>,
    Json(payload): Json<QuizCommandRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    quiz_service::start_round(&state, &payload.room_id).await?;
    Ok(Envelope::empty())
}

/// Host marks the current word as guessed.
pub async fn correct(
    State(state): State<SharedState>,
    Json(payload): Json<QuizCommandRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    quiz_service::correct(&state, &payload.room_id).await?;
    Ok(Envelope::empty())
}

/// Host skips the current word.
pub async fn pass(
    State(state): State<SharedState>,
    Json(payload): Json<QuizCommandRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    quiz_service::pass(&state, &payload.room_id).await?;
    Ok(Envelope::empty())
}

/// Hand the turn to the next team that has not played yet.
pub async fn next_team(
    State(state): State<SharedState>,
    Json(payload): Json<QuizCommandRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    quiz_service::next_team(&state, &payload.room_id).await?;
    Ok(Envelope::empty())
}

/// Current ranking; complete once every team has played.
pub async fn result(
    State(state): State<SharedState>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<Envelope<QuizResultView>>, AppError> {
    let view = quiz_service::result(&state, &query.room_id).await?;
    Ok(Envelope::ok(view))
}

/// Reconnect read of the quiz state (word queue withheld).
pub async fn state_view(
    State(state): State<SharedState>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<Envelope<QuizStateView>>, AppError> {
    let view = quiz_service::view(&state, &query.room_id).await?;
    Ok(Envelope::ok(view))
}
