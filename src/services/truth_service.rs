//! Truth orchestration: answerer selection, question collection and
//! selection, face-tracking capture, and the verdict.

use rand::seq::IndexedRandom;
use tracing::info;

use crate::{
    dto::truth::{
        AnswererSelectedEvent, FaceDataEvent, QuestionConfirmedEvent, QuestionProgressEvent,
        QuestionSelectedEvent, QuestionVoteStatusEvent, TruthPhaseChangedEvent, TruthResultEvent,
        TruthStateView,
    },
    error::ServiceError,
    games::{
        GameKind,
        truth::{FaceTrackingSample, SubmittedQuestion, TruthPhase, TruthState, analyze},
    },
    state::SharedState,
    store::keys,
};

const EVENT_PHASE_CHANGED: &str = "TRUTH_PHASE_CHANGED";
const EVENT_ANSWERER_SELECTED: &str = "TRUTH_ANSWERER_SELECTED";
const EVENT_QUESTION_PROGRESS: &str = "TRUTH_QUESTION_PROGRESS";
const EVENT_QUESTION_SELECTED: &str = "TRUTH_QUESTION_SELECTED";
const EVENT_QUESTION_CONFIRMED: &str = "TRUTH_QUESTION_CONFIRMED";
const EVENT_QUESTION_VOTE_STATUS: &str = "TRUTH_QUESTION_VOTE_STATUS";
const EVENT_FACE_DATA: &str = "TRUTH_FACE_DATA";
const EVENT_RESULT: &str = "TRUTH_RESULT";

async fn read_state(state: &SharedState, room_id: &str) -> Result<TruthState, ServiceError> {
    state
        .store()
        .read_json(&keys::truth_state(room_id))
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("no truth game in room `{room_id}`")))
}

async fn write_state(
    state: &SharedState,
    room_id: &str,
    game: &TruthState,
) -> Result<(), ServiceError> {
    state
        .store()
        .write_json(&keys::truth_state(room_id), game)
        .await?;
    Ok(())
}

fn broadcast_phase(state: &SharedState, room_id: &str, game: &TruthState) {
    state.bus().broadcast_all(
        room_id,
        EVENT_PHASE_CHANGED,
        &TruthPhaseChangedEvent {
            phase: game.phase,
            round: game.round,
        },
    );
}

pub async fn initialize(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    if room.current_game != Some(GameKind::Truth) {
        return Err(ServiceError::InvalidState(
            "room is not set to the truth game".into(),
        ));
    }
    if room.players.is_empty() {
        return Err(ServiceError::InvalidState("the room has no players".into()));
    }

    let game = TruthState::new();
    write_state(state, room_id, &game).await?;
    broadcast_phase(state, room_id, &game);
    info!(%room_id, "truth game initialized");
    Ok(())
}

/// Put a player on the chair, named or randomly picked. Valid from the
/// initial phase and again from `result` to open the next round.
pub async fn select_answerer(
    state: &SharedState,
    room_id: &str,
    device_id: Option<String>,
) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    let mut game = read_state(state, room_id).await?;
    if !matches!(game.phase, TruthPhase::SelectAnswerer | TruthPhase::Result) {
        return Err(ServiceError::InvalidState(
            "an answerer cannot be chosen right now".into(),
        ));
    }

    let answerer = match device_id {
        Some(device_id) => room
            .player(&device_id)
            .ok_or_else(|| {
                ServiceError::InvalidArgument(format!("unknown device `{device_id}`"))
            })?
            .device_id
            .clone(),
        None => room
            .players
            .choose(&mut rand::rng())
            .map(|player| player.device_id.clone())
            .ok_or_else(|| ServiceError::InvalidState("the room has no players".into()))?,
    };

    if game.phase == TruthPhase::Result {
        game.round += 1;
    }
    game.begin_round(answerer.clone());
    write_state(state, room_id, &game).await?;

    let nickname = room
        .player(&answerer)
        .map(|player| player.nickname.clone())
        .unwrap_or_default();
    state.bus().broadcast_all(
        room_id,
        EVENT_ANSWERER_SELECTED,
        &AnswererSelectedEvent {
            device_id: answerer,
            nickname,
            round: game.round,
        },
    );
    broadcast_phase(state, room_id, &game);
    Ok(())
}

/// Collect a question from anyone but the answerer.
pub async fn submit_question(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
    text: String,
) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    if room.player(device_id).is_none() {
        return Err(ServiceError::NotFound(format!(
            "device `{device_id}` is not in the room"
        )));
    }
    let mut game = read_state(state, room_id).await?;
    if game.phase != TruthPhase::SubmitQuestions {
        return Err(ServiceError::InvalidState(
            "questions are not being collected".into(),
        ));
    }
    if game.current_answerer.as_deref() == Some(device_id) {
        return Err(ServiceError::InvalidState(
            "the answerer cannot submit questions".into(),
        ));
    }

    game.pending_questions.push(SubmittedQuestion {
        device_id: device_id.to_string(),
        text,
        is_used: false,
    });
    write_state(state, room_id, &game).await?;
    state.bus().broadcast_host(
        room_id,
        EVENT_QUESTION_PROGRESS,
        &QuestionProgressEvent {
            count: game.pending_questions.len(),
        },
    );
    Ok(())
}

/// Snapshot the collected questions and move to selection.
pub async fn finish_submission(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let mut game = read_state(state, room_id).await?;
    if game.phase != TruthPhase::SubmitQuestions {
        return Err(ServiceError::InvalidState(
            "questions are not being collected".into(),
        ));
    }
    if game.pending_questions.is_empty() {
        return Err(ServiceError::InvalidState(
            "no questions were submitted".into(),
        ));
    }
    game.submitted_questions = game.pending_questions.clone();
    game.phase = TruthPhase::SelectQuestion;
    write_state(state, room_id, &game).await?;
    broadcast_phase(state, room_id, &game);
    Ok(())
}

/// Host reroll: propose a random unused question.
pub async fn select_random_question(
    state: &SharedState,
    room_id: &str,
) -> Result<QuestionSelectedEvent, ServiceError> {
    let mut game = read_state(state, room_id).await?;
    if game.phase != TruthPhase::SelectQuestion {
        return Err(ServiceError::InvalidState(
            "question selection is not open".into(),
        ));
    }
    let unused = game.unused_question_indices();
    let index = unused
        .choose(&mut rand::rng())
        .copied()
        .ok_or_else(|| ServiceError::InvalidState("every question has been used".into()))?;
    game.proposed_index = Some(index);
    write_state(state, room_id, &game).await?;

    let event = QuestionSelectedEvent {
        index,
        text: game.submitted_questions[index].text.clone(),
    };
    state
        .bus()
        .broadcast_host(room_id, EVENT_QUESTION_SELECTED, &event);
    Ok(event)
}

/// Lock in the proposed question and open the answering phase.
pub async fn confirm_question(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let mut game = read_state(state, room_id).await?;
    if game.phase != TruthPhase::SelectQuestion {
        return Err(ServiceError::InvalidState(
            "question selection is not open".into(),
        ));
    }
    let index = game
        .proposed_index
        .ok_or_else(|| ServiceError::InvalidState("no question has been proposed".into()))?;
    use_question(state, room_id, &mut game, index).await
}

/// Toggle a vote on a question index (non-answerers only).
pub async fn question_vote(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
    question_index: usize,
) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    if room.player(device_id).is_none() {
        return Err(ServiceError::NotFound(format!(
            "device `{device_id}` is not in the room"
        )));
    }
    let mut game = read_state(state, room_id).await?;
    if game.phase != TruthPhase::SelectQuestion {
        return Err(ServiceError::InvalidState(
            "question selection is not open".into(),
        ));
    }
    if game.current_answerer.as_deref() == Some(device_id) {
        return Err(ServiceError::InvalidState(
            "the answerer cannot vote on questions".into(),
        ));
    }
    if question_index >= game.submitted_questions.len()
        || game.submitted_questions[question_index].is_used
    {
        return Err(ServiceError::InvalidArgument(
            "that question cannot be voted on".into(),
        ));
    }

    game.toggle_question_vote(device_id, question_index);
    write_state(state, room_id, &game).await?;
    Ok(())
}

/// A voter declares they are done; progress goes to the host.
pub async fn question_vote_done(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    if room.player(device_id).is_none() {
        return Err(ServiceError::NotFound(format!(
            "device `{device_id}` is not in the room"
        )));
    }
    let mut game = read_state(state, room_id).await?;
    if game.phase != TruthPhase::SelectQuestion {
        return Err(ServiceError::InvalidState(
            "question selection is not open".into(),
        ));
    }
    if !game.vote_done_devices.iter().any(|d| d == device_id) {
        game.vote_done_devices.push(device_id.to_string());
    }
    write_state(state, room_id, &game).await?;

    state.bus().broadcast_host(
        room_id,
        EVENT_QUESTION_VOTE_STATUS,
        &QuestionVoteStatusEvent {
            done: game.vote_done_devices.len(),
            total: room.players.len().saturating_sub(1),
        },
    );
    Ok(())
}

/// Close the vote flow: plurality wins, ties and empty votes fall back to
/// random among the unused questions.
pub async fn finish_question_vote(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let mut game = read_state(state, room_id).await?;
    if game.phase != TruthPhase::SelectQuestion {
        return Err(ServiceError::InvalidState(
            "question selection is not open".into(),
        ));
    }
    let index = game
        .choose_question_by_votes()
        .ok_or_else(|| ServiceError::InvalidState("every question has been used".into()))?;
    use_question(state, room_id, &mut game, index).await
}

async fn use_question(
    state: &SharedState,
    room_id: &str,
    game: &mut TruthState,
    index: usize,
) -> Result<(), ServiceError> {
    game.submitted_questions[index].is_used = true;
    game.current_question = Some(game.submitted_questions[index].clone());
    game.proposed_index = None;
    game.face_tracking_data.clear();
    game.phase = TruthPhase::Answering;
    write_state(state, room_id, game).await?;

    state.bus().broadcast_all(
        room_id,
        EVENT_QUESTION_CONFIRMED,
        &QuestionConfirmedEvent {
            text: game.submitted_questions[index].text.clone(),
        },
    );
    broadcast_phase(state, room_id, game);
    Ok(())
}

/// Append one face-tracking sample; only the answerer's phone may feed the
/// detector. Each sample is mirrored to the host for the live overlay.
pub async fn push_face_data(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
    sample: FaceTrackingSample,
) -> Result<(), ServiceError> {
    let mut game = read_state(state, room_id).await?;
    if game.phase != TruthPhase::Answering {
        return Err(ServiceError::InvalidState(
            "no answer is being recorded".into(),
        ));
    }
    if game.current_answerer.as_deref() != Some(device_id) {
        return Err(ServiceError::Unauthorized(
            "only the answerer streams face data".into(),
        ));
    }

    game.face_tracking_data.push(sample.clone());
    write_state(state, room_id, &game).await?;
    state
        .bus()
        .broadcast_host(room_id, EVENT_FACE_DATA, &FaceDataEvent { sample });
    Ok(())
}

/// Run the detector over everything collected and publish the verdict.
pub async fn finish_answering(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    let mut game = read_state(state, room_id).await?;
    if game.phase != TruthPhase::Answering {
        return Err(ServiceError::InvalidState(
            "no answer is being recorded".into(),
        ));
    }

    let analysis = analyze(&game.face_tracking_data);
    game.last_result = Some(analysis.clone());
    game.phase = TruthPhase::Result;
    write_state(state, room_id, &game).await?;

    let answerer_device_id = game.current_answerer.clone().unwrap_or_default();
    let answerer_nickname = room
        .player(&answerer_device_id)
        .map(|player| player.nickname.clone())
        .unwrap_or_default();
    state.bus().broadcast_all(
        room_id,
        EVENT_RESULT,
        &TruthResultEvent {
            answerer_device_id,
            answerer_nickname,
            question: game
                .current_question
                .as_ref()
                .map(|question| question.text.clone()),
            analysis,
        },
    );
    broadcast_phase(state, room_id, &game);
    Ok(())
}

pub async fn view(state: &SharedState, room_id: &str) -> Result<TruthStateView, ServiceError> {
    let game = read_state(state, room_id).await?;
    Ok(TruthStateView::from(&game))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dto::room::JoinRoomRequest,
        services::room_service::{create_room, join, load_room, start_game},
        state::SharedState,
        state::test_state,
    };

    async fn truth_room(state: &SharedState) -> String {
        let created = create_room(state).await.unwrap();
        for i in 0..4 {
            join(
                state,
                JoinRoomRequest {
                    room_id: created.room_id.clone(),
                    nickname: format!("p{i}"),
                    profile: None,
                },
            )
            .await
            .unwrap();
        }
        start_game(state, &created.room_id, GameKind::Truth)
            .await
            .unwrap();
        initialize(state, &created.room_id).await.unwrap();
        created.room_id
    }

    fn nervous_sample() -> FaceTrackingSample {
        FaceTrackingSample {
            eye_blink_rate: 2.0,
            eye_movement: 0.4,
            facial_tremor: 0.3,
            nostril_movement: 0.3,
            stress_level: 70.0,
            micro_expression: Some("nervous".into()),
            timestamp: 0,
        }
    }

    async fn advance_to_answering(state: &SharedState, room_id: &str) -> (String, Vec<String>) {
        let room = load_room(state, room_id).await.unwrap();
        let answerer = room.players[0].device_id.clone();
        let others: Vec<String> = room.players[1..]
            .iter()
            .map(|player| player.device_id.clone())
            .collect();

        select_answerer(state, room_id, Some(answerer.clone()))
            .await
            .unwrap();
        for (i, device_id) in others.iter().enumerate() {
            submit_question(state, room_id, device_id, format!("질문 {i}"))
                .await
                .unwrap();
        }
        finish_submission(state, room_id).await.unwrap();
        select_random_question(state, room_id).await.unwrap();
        confirm_question(state, room_id).await.unwrap();
        (answerer, others)
    }

    #[tokio::test]
    async fn the_answerer_cannot_submit_questions() {
        let state = test_state();
        let room_id = truth_room(&state).await;
        let room = load_room(&state, &room_id).await.unwrap();
        let answerer = room.players[0].device_id.clone();
        select_answerer(&state, &room_id, Some(answerer.clone()))
            .await
            .unwrap();

        let err = submit_question(&state, &room_id, &answerer, "뭐든".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn confirmed_question_is_marked_used() {
        let state = test_state();
        let room_id = truth_room(&state).await;
        advance_to_answering(&state, &room_id).await;

        let game = read_state(&state, &room_id).await.unwrap();
        assert_eq!(game.phase, TruthPhase::Answering);
        let used = game
            .submitted_questions
            .iter()
            .filter(|question| question.is_used)
            .count();
        assert_eq!(used, 1);
        assert!(game.current_question.is_some());
    }

    #[tokio::test]
    async fn only_the_answerer_streams_face_data() {
        let state = test_state();
        let room_id = truth_room(&state).await;
        let (answerer, others) = advance_to_answering(&state, &room_id).await;

        push_face_data(&state, &room_id, &answerer, nervous_sample())
            .await
            .unwrap();
        let err = push_face_data(&state, &room_id, &others[0], nervous_sample())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn finish_answering_publishes_a_verdict() {
        let state = test_state();
        let room_id = truth_room(&state).await;
        let (answerer, _) = advance_to_answering(&state, &room_id).await;

        for _ in 0..10 {
            push_face_data(&state, &room_id, &answerer, nervous_sample())
                .await
                .unwrap();
        }
        finish_answering(&state, &room_id).await.unwrap();

        let game = read_state(&state, &room_id).await.unwrap();
        assert_eq!(game.phase, TruthPhase::Result);
        let verdict = game.last_result.unwrap();
        assert!(verdict.is_lie);
    }

    #[tokio::test]
    async fn next_round_resets_collections_and_bumps_round() {
        let state = test_state();
        let room_id = truth_room(&state).await;
        let (answerer, others) = advance_to_answering(&state, &room_id).await;
        for _ in 0..5 {
            push_face_data(&state, &room_id, &answerer, nervous_sample())
                .await
                .unwrap();
        }
        finish_answering(&state, &room_id).await.unwrap();

        select_answerer(&state, &room_id, Some(others[0].clone()))
            .await
            .unwrap();
        let game = read_state(&state, &room_id).await.unwrap();
        assert_eq!(game.round, 2);
        assert_eq!(game.phase, TruthPhase::SubmitQuestions);
        assert!(game.submitted_questions.is_empty());
        assert!(game.face_tracking_data.is_empty());
    }

    #[tokio::test]
    async fn vote_flow_picks_the_plurality_question() {
        let state = test_state();
        let room_id = truth_room(&state).await;
        let room = load_room(&state, &room_id).await.unwrap();
        let answerer = room.players[0].device_id.clone();
        let others: Vec<String> = room.players[1..]
            .iter()
            .map(|player| player.device_id.clone())
            .collect();

        select_answerer(&state, &room_id, Some(answerer.clone()))
            .await
            .unwrap();
        for (i, device_id) in others.iter().enumerate() {
            submit_question(&state, &room_id, device_id, format!("질문 {i}"))
                .await
                .unwrap();
        }
        finish_submission(&state, &room_id).await.unwrap();

        question_vote(&state, &room_id, &others[0], 1).await.unwrap();
        question_vote(&state, &room_id, &others[1], 1).await.unwrap();
        question_vote(&state, &room_id, &others[2], 0).await.unwrap();
        question_vote_done(&state, &room_id, &others[0]).await.unwrap();
        finish_question_vote(&state, &room_id).await.unwrap();

        let game = read_state(&state, &room_id).await.unwrap();
        assert_eq!(game.phase, TruthPhase::Answering);
        assert!(game.submitted_questions[1].is_used);
    }

    #[tokio::test]
    async fn random_selection_excludes_used_questions() {
        let state = test_state();
        let room_id = truth_room(&state).await;
        let room = load_room(&state, &room_id).await.unwrap();
        let answerer = room.players[0].device_id.clone();
        let asker = room.players[1].device_id.clone();

        select_answerer(&state, &room_id, Some(answerer))
            .await
            .unwrap();
        submit_question(&state, &room_id, &asker, "단 하나의 질문".into())
            .await
            .unwrap();
        finish_submission(&state, &room_id).await.unwrap();
        select_random_question(&state, &room_id).await.unwrap();
        confirm_question(&state, &room_id).await.unwrap();

        // Re-open selection with the only question already used.
        let mut game = read_state(&state, &room_id).await.unwrap();
        game.phase = TruthPhase::SelectQuestion;
        write_state(&state, &room_id, &game).await.unwrap();

        let err = select_random_question(&state, &room_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}
