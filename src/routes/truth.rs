use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    dto::{
        common::Envelope,
        truth::{
            FaceDataRequest, QuestionSelectedEvent, QuestionVoteRequest, SelectAnswererRequest,
            StartTruthRequest, SubmitQuestionRequest, TruthCommandRequest, TruthStateView,
            VoteDoneRequest,
        },
    },
    error::AppError,
    services::truth_service,
    state::SharedState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomQuery {
    pub room_id: String,
}

/// Truth command endpoints, nested under `/games/truth`.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/start", post(start))
        .route("/answerer", post(select_answerer))
        .route("/question", post(submit_question))
        .route("/question/finish", post(finish_submission))
        .route("/question/random", post(select_random_question))
        .route("/question/confirm", post(confirm_question))
        .route("/question/vote", post(question_vote))
        .route("/question/vote/done", post(question_vote_done))
        .route("/question/vote/finish", post(finish_question_vote))
        .route("/face-data", post(face_data))
        .route("/answer/finish", post(finish_answering))
        .route("/state", get(state_view))
}

/// Open the interrogation game.
pub async fn start(
    State(state): State<SharedState>,
    Json(payload): Json<StartTruthRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    truth_service::initialize(&state, &payload.room_id).await?;
    Ok(Envelope::empty())
}

/// Put a player on the chair, named or random.
pub async fn select_answerer(
    State(state): State<SharedState>,
    Json(payload): Json<SelectAnswererRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    truth_service::select_answerer(&state, &payload.room_id, payload.device_id).await?;
    Ok(Envelope::empty())
}

/// Submit a question for the answerer.
pub async fn submit_question(
    State(state): State<SharedState>,
    Json(payload): Json<SubmitQuestionRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    payload.validate()?;
    truth_service::submit_question(&state, &payload.room_id, &payload.device_id, payload.text)
        .await?;
    Ok(Envelope::empty())
}

/// Snapshot the submitted questions and open selection.
pub async fn finish_submission(
    State(state): State<SharedState>,
    Json(payload): Json<TruthCommandRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    truth_service::finish_submission(&state, &payload.room_id).await?;
    Ok(Envelope::empty())
}

/// Host rerolls a random unused question.
pub async fn select_random_question(
    State(state): State<SharedState>,
    Json(payload): Json<TruthCommandRequest>,
) -> Result<Json<Envelope<QuestionSelectedEvent>>, AppError> {
    let proposed = truth_service::select_random_question(&state, &payload.room_id).await?;
    Ok(Envelope::ok(proposed))
}

/// Confirm the proposed question and start answering.
pub async fn confirm_question(
    State(state): State<SharedState>,
    Json(payload): Json<TruthCommandRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    truth_service::confirm_question(&state, &payload.room_id).await?;
    Ok(Envelope::empty())
}

/// Toggle a vote on a question index.
pub async fn question_vote(
    State(state): State<SharedState>,
    Json(payload): Json<QuestionVoteRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    truth_service::question_vote(
        &state,
        &payload.room_id,
        &payload.device_id,
        payload.question_index,
    )
    .await?;
    Ok(Envelope::empty())
}

/// A voter declares their question votes final.
pub async fn question_vote_done(
    State(state): State<SharedState>,
    Json(payload): Json<VoteDoneRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    truth_service::question_vote_done(&state, &payload.room_id, &payload.device_id).await?;
    Ok(Envelope::empty())
}

/// Close the question vote: plurality with random tiebreak.
pub async fn finish_question_vote(
    State(state): State<SharedState>,
    Json(payload): Json<TruthCommandRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    truth_service::finish_question_vote(&state, &payload.room_id).await?;
    Ok(Envelope::empty())
}

/// Append a face-tracking sample from the answerer's phone.
pub async fn face_data(
    State(state): State<SharedState>,
    Json(payload): Json<FaceDataRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    truth_service::push_face_data(&state, &payload.room_id, &payload.device_id, payload.sample)
        .await?;
    Ok(Envelope::empty())
}

/// Run the lie detector over the collected samples.
pub async fn finish_answering(
    State(state): State<SharedState>,
    Json(payload): Json<TruthCommandRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    truth_service::finish_answering(&state, &payload.room_id).await?;
    Ok(Envelope::empty())
}

/// Reconnect read of the truth state.
pub async fn state_view(
    State(state): State<SharedState>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<Envelope<TruthStateView>>, AppError> {
    let view = truth_service::view(&state, &query.room_id).await?;
    Ok(Envelope::ok(view))
}
