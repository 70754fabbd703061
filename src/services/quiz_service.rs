//! Quiz orchestration: per-team rounds over a shuffled word queue with a
//! host-driven correct/pass flow and a round countdown.

use tracing::{info, warn};

use crate::{
    dto::{
        common::TimerTick,
        quiz::{
            QuizResultView, QuizStartedEvent, QuizStateView, RoundEndEvent, RoundStartEvent,
            ScoreEvent, TeamChangedEvent, WordEvent,
        },
    },
    error::ServiceError,
    games::{
        GameKind, GamePhase,
        quiz::{QuizPhase, QuizState, WORDS_PER_ROUND},
    },
    state::SharedState,
    store::keys,
};

const EVENT_TIMER: &str = "QUIZ_TIMER";
const EVENT_GAME_STARTED: &str = "QUIZ_GAME_STARTED";
const EVENT_ROUND_START: &str = "QUIZ_ROUND_START";
const EVENT_WORD: &str = "QUIZ_WORD";
const EVENT_SCORE: &str = "QUIZ_SCORE";
const EVENT_ROUND_END: &str = "QUIZ_ROUND_END";
const EVENT_TEAM_CHANGED: &str = "QUIZ_TEAM_CHANGED";
const EVENT_FINAL_RESULT: &str = "QUIZ_FINAL_RESULT";

async fn read_state(state: &SharedState, room_id: &str) -> Result<QuizState, ServiceError> {
    state
        .store()
        .read_json(&keys::quiz_state(room_id))
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("no quiz game in room `{room_id}`")))
}

async fn write_state(
    state: &SharedState,
    room_id: &str,
    game: &QuizState,
) -> Result<(), ServiceError> {
    state
        .store()
        .write_json(&keys::quiz_state(room_id), game)
        .await?;
    Ok(())
}

fn broadcast_word(state: &SharedState, room_id: &str, game: &QuizState) {
    // The host device is the one showing the word; players never see it.
    state.bus().broadcast_host(
        room_id,
        EVENT_WORD,
        &WordEvent {
            word: game.current_word.clone(),
        },
    );
}

/// Create the quiz state from the room's pre-assigned teams.
pub async fn initialize(
    state: &SharedState,
    room_id: &str,
    category_id: u32,
    round_time_seconds: Option<u64>,
) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    if room.current_game != Some(GameKind::Quiz) {
        return Err(ServiceError::InvalidState(
            "room is not set to the quiz game".into(),
        ));
    }
    let teams = room.team_tags();
    if teams.is_empty() {
        return Err(ServiceError::InvalidState(
            "teams must be assigned before starting the quiz".into(),
        ));
    }

    let category = state
        .catalog()
        .category(category_id)
        .ok_or_else(|| ServiceError::NotFound(format!("unknown category `{category_id}`")))?;
    let words = state
        .catalog()
        .random_words(category_id, WORDS_PER_ROUND)
        .unwrap_or_default();
    let round_time = round_time_seconds.unwrap_or(state.config().quiz_round_secs);
    if round_time == 0 {
        return Err(ServiceError::InvalidArgument(
            "round time must be at least one second".into(),
        ));
    }

    let game = QuizState::new(teams.clone(), category_id, round_time, words);
    let first_team = game.current_team().cloned().unwrap_or_default();
    write_state(state, room_id, &game).await?;

    state.bus().broadcast_all(
        room_id,
        EVENT_GAME_STARTED,
        &QuizStartedEvent {
            teams,
            first_team,
            round_time_seconds: round_time,
            category_name: category.name.clone(),
        },
    );
    info!(%room_id, category = %category.name, "quiz initialized");
    Ok(())
}

/// Begin the current team's round: fresh words, full clock.
pub async fn start_round(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let mut game = read_state(state, room_id).await?;
    if game.phase != QuizPhase::Waiting {
        return Err(ServiceError::InvalidState(
            "a round can only start while waiting".into(),
        ));
    }
    let team = game
        .current_team()
        .cloned()
        .ok_or_else(|| ServiceError::InvalidState("no team is on turn".into()))?;

    let mut words = state
        .catalog()
        .random_words(game.category_id, WORDS_PER_ROUND)
        .unwrap_or_default();
    if words.is_empty() {
        return Err(ServiceError::InvalidState(
            "the chosen category has no words".into(),
        ));
    }
    game.current_word = Some(words.remove(0));
    game.remaining_words = words;
    game.current_round_score = 0;
    game.remaining_time = game.round_time_seconds;
    game.phase = QuizPhase::Playing;
    write_state(state, room_id, &game).await?;

    state.bus().broadcast_all(
        room_id,
        EVENT_ROUND_START,
        &RoundStartEvent {
            team,
            round_time_seconds: game.round_time_seconds,
        },
    );
    broadcast_word(state, room_id, &game);
    arm_round_timer(state, room_id, game.round_time_seconds);
    Ok(())
}

fn arm_round_timer(state: &SharedState, room_id: &str, duration: u64) {
    let tick_state = state.clone();
    let tick_room = room_id.to_string();
    let done_state = state.clone();
    let done_room = room_id.to_string();
    state.scheduler().start_countdown(
        room_id,
        duration,
        Box::new(move |remaining| {
            let state = tick_state.clone();
            let room_id = tick_room.clone();
            Box::pin(async move {
                state.bus().broadcast_all(
                    &room_id,
                    EVENT_TIMER,
                    &TimerTick {
                        phase: QuizPhase::Playing.as_str(),
                        remaining,
                    },
                );
            })
        }),
        Box::new(move || {
            Box::pin(async move {
                if let Err(err) = end_round(&done_state, &done_room).await {
                    warn!(room_id = %done_room, error = %err, "quiz round end failed");
                }
            })
        }),
    );
}

/// Host marked the word as guessed.
pub async fn correct(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let mut game = read_state(state, room_id).await?;
    if game.phase != QuizPhase::Playing {
        return Err(ServiceError::InvalidState("no round is running".into()));
    }
    let words_left = game.mark_correct();
    write_state(state, room_id, &game).await?;

    if let Some(team) = game.current_team().cloned() {
        state.bus().broadcast_all(
            room_id,
            EVENT_SCORE,
            &ScoreEvent {
                team,
                score: game.current_round_score,
            },
        );
    }
    if words_left {
        broadcast_word(state, room_id, &game);
        Ok(())
    } else {
        state.scheduler().cancel_countdown(room_id);
        end_round(state, room_id).await
    }
}

/// Host skipped the word; it goes to the back of the queue.
pub async fn pass(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let mut game = read_state(state, room_id).await?;
    if game.phase != QuizPhase::Playing {
        return Err(ServiceError::InvalidState("no round is running".into()));
    }
    game.mark_pass();
    write_state(state, room_id, &game).await?;
    broadcast_word(state, room_id, &game);
    Ok(())
}

/// Close the running round: record the score, clear word state.
async fn end_round(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let mut game = read_state(state, room_id).await?;
    if game.phase != QuizPhase::Playing {
        return Ok(()); // timer lost the race to word exhaustion
    }
    let team = game.current_team().cloned().unwrap_or_default();
    let score = game.current_round_score;
    game.finish_round();
    write_state(state, room_id, &game).await?;

    state.bus().broadcast_all(
        room_id,
        EVENT_ROUND_END,
        &RoundEndEvent {
            team,
            score,
            team_scores: game.team_scores.clone(),
        },
    );
    Ok(())
}

/// Hand the turn to the next team that has not played, or finish.
pub async fn next_team(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let mut game = read_state(state, room_id).await?;
    if game.phase == QuizPhase::Playing {
        return Err(ServiceError::InvalidState(
            "finish the running round first".into(),
        ));
    }
    if game.advance_team() {
        let team = game.current_team().cloned().unwrap_or_default();
        write_state(state, room_id, &game).await?;
        state
            .bus()
            .broadcast_all(room_id, EVENT_TEAM_CHANGED, &TeamChangedEvent { team });
    } else {
        write_state(state, room_id, &game).await?;
        state.bus().broadcast_all(
            room_id,
            EVENT_FINAL_RESULT,
            &QuizResultView::from(&game),
        );
        state.scheduler().cleanup(room_id);
    }
    Ok(())
}

pub async fn result(state: &SharedState, room_id: &str) -> Result<QuizResultView, ServiceError> {
    let game = read_state(state, room_id).await?;
    Ok(QuizResultView::from(&game))
}

pub async fn view(state: &SharedState, room_id: &str) -> Result<QuizStateView, ServiceError> {
    let game = read_state(state, room_id).await?;
    Ok(QuizStateView::from(&game))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dto::room::JoinRoomRequest,
        services::{
            room_service::{create_room, join, start_game},
            team_service,
        },
        state::test_state,
    };

    const QUIZ_CATEGORY: u32 = 1;

    async fn quiz_room(state: &SharedState) -> String {
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
        team_service::assign_random(state, &created.room_id, 2)
            .await
            .unwrap();
        start_game(state, &created.room_id, GameKind::Quiz)
            .await
            .unwrap();
        initialize(state, &created.room_id, QUIZ_CATEGORY, None)
            .await
            .unwrap();
        created.room_id
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_without_teams_is_rejected() {
        let state = test_state();
        let created = create_room(&state).await.unwrap();
        join(
            &state,
            JoinRoomRequest {
                room_id: created.room_id.clone(),
                nickname: "p0".into(),
                profile: None,
            },
        )
        .await
        .unwrap();
        start_game(&state, &created.room_id, GameKind::Quiz)
            .await
            .unwrap();

        let err = initialize(&state, &created.room_id, QUIZ_CATEGORY, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn pass_and_correct_follow_the_documented_queue() {
        let state = test_state();
        let room_id = quiz_room(&state).await;
        start_round(&state, &room_id).await.unwrap();

        let mut game = read_state(&state, &room_id).await.unwrap();
        game.current_word = Some("W1".into());
        game.remaining_words = vec!["W2".into(), "W3".into()];
        write_state(&state, &room_id, &game).await.unwrap();

        pass(&state, &room_id).await.unwrap();
        let game = read_state(&state, &room_id).await.unwrap();
        assert_eq!(game.current_word.as_deref(), Some("W2"));
        assert_eq!(game.remaining_words, vec!["W3", "W1"]);

        correct(&state, &room_id).await.unwrap();
        let game = read_state(&state, &room_id).await.unwrap();
        assert_eq!(game.current_round_score, 1);
        assert_eq!(game.current_word.as_deref(), Some("W3"));
        assert_eq!(game.remaining_words, vec!["W1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_the_queue_ends_the_round() {
        let state = test_state();
        let room_id = quiz_room(&state).await;
        start_round(&state, &room_id).await.unwrap();

        let mut game = read_state(&state, &room_id).await.unwrap();
        game.current_word = Some("W1".into());
        game.remaining_words = Vec::new();
        write_state(&state, &room_id, &game).await.unwrap();

        correct(&state, &room_id).await.unwrap();
        let game = read_state(&state, &room_id).await.unwrap();
        assert_eq!(game.phase, QuizPhase::RoundEnd);
        assert_eq!(game.completed_teams.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn round_timer_expiry_closes_the_round() {
        let state = test_state();
        let room_id = quiz_room(&state).await;
        start_round(&state, &room_id).await.unwrap();

        let game = read_state(&state, &room_id).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_secs(
            game.round_time_seconds + 2,
        ))
        .await;

        let game = read_state(&state, &room_id).await.unwrap();
        assert_eq!(game.phase, QuizPhase::RoundEnd);
    }

    #[tokio::test(start_paused = true)]
    async fn full_rotation_produces_a_complete_ranking() {
        let state = test_state();
        let room_id = quiz_room(&state).await;

        // Team one plays and scores twice.
        start_round(&state, &room_id).await.unwrap();
        correct(&state, &room_id).await.unwrap();
        correct(&state, &room_id).await.unwrap();
        state.scheduler().cancel_countdown(&room_id);
        end_round(&state, &room_id).await.unwrap();
        next_team(&state, &room_id).await.unwrap();

        // Team two plays and scores once.
        start_round(&state, &room_id).await.unwrap();
        correct(&state, &room_id).await.unwrap();
        state.scheduler().cancel_countdown(&room_id);
        end_round(&state, &room_id).await.unwrap();
        next_team(&state, &room_id).await.unwrap();

        let view = result(&state, &room_id).await.unwrap();
        assert!(view.is_complete);
        assert_eq!(view.ranking[0].score, 2);
        assert_eq!(view.ranking[1].score, 1);
        let game = read_state(&state, &room_id).await.unwrap();
        assert_eq!(game.phase, QuizPhase::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn correct_outside_a_round_is_rejected() {
        let state = test_state();
        let room_id = quiz_room(&state).await;
        let err = correct(&state, &room_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}
