//! Liar orchestration: role reveal, round-robin explanations, pointing vote,
//! and the liar's last-chance guess.

use tracing::{info, warn};

use crate::{
    dto::{
        common::TimerTick,
        liar::{
            ExplanationTurnEvent, LiarGameEndEvent, LiarInitEvent, LiarPhaseChangedEvent,
            LiarPublicStateView, LiarRoleView, MoreRoundResultEvent, PointingResultEvent,
            PointingVoteStatusEvent,
        },
    },
    error::ServiceError,
    games::{
        GameKind, GamePhase,
        liar::{
            LiarPhase, LiarState, LiarWinner, MIN_PLAYERS, SECOND_ROUND_DELAY_MS, guess_matches,
            pointed_target,
        },
    },
    state::SharedState,
    store::keys,
};
use rand::seq::IndexedRandom;

const EVENT_TIMER: &str = "LIAR_TIMER";
const EVENT_INIT: &str = "LIAR_INIT";
const EVENT_PHASE_CHANGED: &str = "LIAR_PHASE_CHANGED";
const EVENT_EXPLANATION_TURN: &str = "LIAR_EXPLANATION_TURN";
const EVENT_MORE_ROUND_RESULT: &str = "LIAR_MORE_ROUND_RESULT";
const EVENT_POINTING_VOTE_STATUS: &str = "LIAR_POINTING_VOTE_STATUS";
const EVENT_POINTING_RESULT: &str = "LIAR_POINTING_RESULT";
const EVENT_GAME_END: &str = "LIAR_GAME_END";

async fn read_state(state: &SharedState, room_id: &str) -> Result<LiarState, ServiceError> {
    state
        .store()
        .read_json(&keys::liar_state(room_id))
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("no liar game in room `{room_id}`")))
}

async fn write_state(
    state: &SharedState,
    room_id: &str,
    game: &LiarState,
) -> Result<(), ServiceError> {
    state
        .store()
        .write_json(&keys::liar_state(room_id), game)
        .await?;
    Ok(())
}

fn broadcast_phase(state: &SharedState, room_id: &str, phase: LiarPhase) {
    state.bus().broadcast_all(
        room_id,
        EVENT_PHASE_CHANGED,
        &LiarPhaseChangedEvent {
            phase,
            timer_sec: phase.duration_secs(),
        },
    );
}

fn arm_timer(state: &SharedState, room_id: &str, phase: LiarPhase) {
    let duration = phase.duration_secs();
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
                        phase: phase.as_str(),
                        remaining,
                    },
                );
            })
        }),
        Box::new(move || {
            Box::pin(async move {
                if let Err(err) = on_phase_complete(&done_state, &done_room, phase).await {
                    warn!(
                        room_id = %done_room,
                        phase = phase.as_str(),
                        error = %err,
                        "liar phase completion failed"
                    );
                }
            })
        }),
    );
}

/// Draw a keyword, pick the liar, shuffle the speaking order.
pub async fn initialize(
    state: &SharedState,
    room_id: &str,
    category_id: u32,
) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    if room.current_game != Some(GameKind::Liar) {
        return Err(ServiceError::InvalidState(
            "room is not set to the liar game".into(),
        ));
    }
    if room.players.len() < MIN_PLAYERS {
        return Err(ServiceError::InvalidState(format!(
            "liar needs at least {MIN_PLAYERS} players"
        )));
    }

    let category = state
        .catalog()
        .category(category_id)
        .ok_or_else(|| ServiceError::NotFound(format!("unknown category `{category_id}`")))?;
    let keyword = state
        .catalog()
        .random_words(category_id, 1)
        .and_then(|mut words| words.pop())
        .ok_or_else(|| ServiceError::InvalidState("category has no keywords".into()))?;

    let device_ids: Vec<String> = room
        .players
        .iter()
        .map(|player| player.device_id.clone())
        .collect();
    let liar = device_ids
        .choose(&mut rand::rng())
        .cloned()
        .ok_or_else(|| ServiceError::InvalidState("the room has no players".into()))?;

    let game = LiarState::new(keyword, category.name.clone(), liar, device_ids);
    write_state(state, room_id, &game).await?;

    let order_nicknames = game
        .explanation_order
        .iter()
        .filter_map(|device_id| room.player(device_id))
        .map(|player| player.nickname.clone())
        .collect();
    state.bus().broadcast_host(
        room_id,
        EVENT_INIT,
        &LiarInitEvent {
            category_name: game.category_name.clone(),
            explanation_order: order_nicknames,
            player_count: room.players.len(),
        },
    );
    broadcast_phase(state, room_id, LiarPhase::RoleReveal);
    arm_timer(state, room_id, LiarPhase::RoleReveal);
    info!(%room_id, category = %game.category_name, "liar game initialized");
    Ok(())
}

/// Per-device role fetch; the liar gets no keyword.
pub async fn role_of(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
) -> Result<LiarRoleView, ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    if room.player(device_id).is_none() {
        return Err(ServiceError::NotFound(format!(
            "device `{device_id}` is not in the room"
        )));
    }
    let game = read_state(state, room_id).await?;
    let is_liar = game.liar_device_id == device_id;
    Ok(LiarRoleView {
        is_liar,
        keyword: (!is_liar).then(|| game.keyword.clone()),
        category_name: game.category_name.clone(),
    })
}

/// Record a more-round ballot during voteMoreRound.
pub async fn vote_more_round(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
    want_more: bool,
) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    if room.player(device_id).is_none() {
        return Err(ServiceError::NotFound(format!(
            "device `{device_id}` is not in the room"
        )));
    }
    let mut game = read_state(state, room_id).await?;
    if game.phase != LiarPhase::VoteMoreRound {
        return Err(ServiceError::InvalidState(
            "the more-round vote is not open".into(),
        ));
    }
    game.more_round_votes.insert(device_id.to_string(), want_more);
    write_state(state, room_id, &game).await
}

/// Host command: leave the free-form pointing discussion and open the vote.
pub async fn start_pointing_vote(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let mut game = read_state(state, room_id).await?;
    if game.phase != LiarPhase::Pointing {
        return Err(ServiceError::InvalidState(
            "pointing vote can only start from the pointing phase".into(),
        ));
    }
    game.phase = LiarPhase::PointingVote;
    game.pointing_votes.clear();
    write_state(state, room_id, &game).await?;
    broadcast_phase(state, room_id, LiarPhase::PointingVote);
    arm_timer(state, room_id, LiarPhase::PointingVote);
    Ok(())
}

/// Record a pointing ballot; last write wins per voter.
pub async fn pointing_vote(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
    target_device_id: &str,
) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    if room.player(device_id).is_none() {
        return Err(ServiceError::NotFound(format!(
            "device `{device_id}` is not in the room"
        )));
    }
    if room.player(target_device_id).is_none() {
        return Err(ServiceError::InvalidArgument(format!(
            "unknown target `{target_device_id}`"
        )));
    }
    let mut game = read_state(state, room_id).await?;
    if game.phase != LiarPhase::PointingVote {
        return Err(ServiceError::InvalidState(
            "the pointing vote is not open".into(),
        ));
    }
    game.pointing_votes
        .insert(device_id.to_string(), target_device_id.to_string());
    write_state(state, room_id, &game).await?;
    state.bus().broadcast_all(
        room_id,
        EVENT_POINTING_VOTE_STATUS,
        &PointingVoteStatusEvent {
            voted: game.pointing_votes.len(),
            total: room.players.len(),
        },
    );
    Ok(())
}

/// The liar's guess (or pass). Ends the game immediately.
pub async fn guess(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
    guess: Option<String>,
    pass: bool,
) -> Result<(), ServiceError> {
    let mut game = read_state(state, room_id).await?;
    if game.phase != LiarPhase::LiarGuess {
        return Err(ServiceError::InvalidState(
            "the guess window is not open".into(),
        ));
    }
    if game.liar_device_id != device_id {
        return Err(ServiceError::Unauthorized("only the liar may guess".into()));
    }

    state.scheduler().cancel_countdown(room_id);
    let winner = match (&guess, pass) {
        (Some(text), false) if guess_matches(text, &game.keyword) => LiarWinner::Liar,
        _ => LiarWinner::Citizen,
    };
    game.liar_guess = guess;
    finish_game(state, room_id, &mut game, winner).await
}

pub async fn public_state(
    state: &SharedState,
    room_id: &str,
) -> Result<LiarPublicStateView, ServiceError> {
    let game = read_state(state, room_id).await?;
    Ok(LiarPublicStateView::from(&game))
}

pub(crate) async fn on_phase_complete(
    state: &SharedState,
    room_id: &str,
    phase: LiarPhase,
) -> Result<(), ServiceError> {
    match phase {
        LiarPhase::RoleReveal => begin_explanation(state, room_id, 0).await,
        LiarPhase::Explanation => next_explainer(state, room_id).await,
        LiarPhase::VoteMoreRound => close_more_round_vote(state, room_id).await,
        LiarPhase::PointingVote => close_pointing_vote(state, room_id).await,
        LiarPhase::PointingResult => after_pointing_result(state, room_id).await,
        LiarPhase::LiarGuess => {
            // Timeout counts as a pass.
            let mut game = read_state(state, room_id).await?;
            if game.phase != LiarPhase::LiarGuess {
                return Ok(());
            }
            finish_game(state, room_id, &mut game, LiarWinner::Citizen).await
        }
        LiarPhase::Pointing | LiarPhase::GameEnd => Ok(()),
    }
}

/// Start the explanation run at the given speaker index.
async fn begin_explanation(
    state: &SharedState,
    room_id: &str,
    index: usize,
) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    let mut game = read_state(state, room_id).await?;
    game.phase = LiarPhase::Explanation;
    game.current_explainer_index = index;
    write_state(state, room_id, &game).await?;

    if let Some(device_id) = game.current_explainer() {
        let nickname = room
            .player(device_id)
            .map(|player| player.nickname.clone())
            .unwrap_or_default();
        state.bus().broadcast_all(
            room_id,
            EVENT_EXPLANATION_TURN,
            &ExplanationTurnEvent {
                device_id: device_id.clone(),
                nickname,
                index,
                round_count: game.round_count,
            },
        );
    }
    arm_timer(state, room_id, LiarPhase::Explanation);
    Ok(())
}

/// One speaker finished; advance, or close the round.
async fn next_explainer(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let mut game = read_state(state, room_id).await?;
    if game.phase != LiarPhase::Explanation {
        return Ok(());
    }
    let next = game.current_explainer_index + 1;
    if next < game.explanation_order.len() {
        return begin_explanation(state, room_id, next).await;
    }
    if game.round_count < 2 {
        game.phase = LiarPhase::VoteMoreRound;
        game.more_round_votes.clear();
        write_state(state, room_id, &game).await?;
        broadcast_phase(state, room_id, LiarPhase::VoteMoreRound);
        arm_timer(state, room_id, LiarPhase::VoteMoreRound);
        Ok(())
    } else {
        enter_pointing(state, room_id, game).await
    }
}

async fn close_more_round_vote(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let mut game = read_state(state, room_id).await?;
    if game.phase != LiarPhase::VoteMoreRound {
        return Ok(());
    }
    let (more, stop) = game.more_round_tally();
    let second_round = more > stop;
    state.bus().broadcast_all(
        room_id,
        EVENT_MORE_ROUND_RESULT,
        &MoreRoundResultEvent {
            more,
            stop,
            second_round,
        },
    );

    if second_round {
        game.round_count = 2;
        game.phase = LiarPhase::Explanation;
        game.current_explainer_index = 0;
        write_state(state, room_id, &game).await?;
        // Give the room a breath before round two starts.
        let delayed_state = state.clone();
        let delayed_room = room_id.to_string();
        state.scheduler().schedule_delayed(
            room_id,
            tokio::time::Duration::from_millis(SECOND_ROUND_DELAY_MS),
            Box::new(move || {
                Box::pin(async move {
                    if let Err(err) = begin_explanation(&delayed_state, &delayed_room, 0).await {
                        warn!(room_id = %delayed_room, error = %err, "second round start failed");
                    }
                })
            }),
        );
        Ok(())
    } else {
        enter_pointing(state, room_id, game).await
    }
}

/// Pointing has no deadline; the host opens the vote explicitly.
async fn enter_pointing(
    state: &SharedState,
    room_id: &str,
    mut game: LiarState,
) -> Result<(), ServiceError> {
    game.phase = LiarPhase::Pointing;
    write_state(state, room_id, &game).await?;
    broadcast_phase(state, room_id, LiarPhase::Pointing);
    Ok(())
}

async fn close_pointing_vote(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    let mut game = read_state(state, room_id).await?;
    if game.phase != LiarPhase::PointingVote {
        return Ok(());
    }

    game.pointed_device_id = pointed_target(&game.pointing_votes);
    let caught = game.pointed_device_id.as_deref() == Some(game.liar_device_id.as_str());
    if let Some(pointed) = game.pointed_device_id.clone() {
        let nickname = room
            .player(&pointed)
            .map(|player| player.nickname.clone())
            .unwrap_or_default();
        state.bus().broadcast_all(
            room_id,
            EVENT_POINTING_RESULT,
            &PointingResultEvent {
                pointed_device_id: pointed,
                pointed_nickname: nickname,
                is_liar_caught: caught,
            },
        );
    }
    game.phase = LiarPhase::PointingResult;
    write_state(state, room_id, &game).await?;
    arm_timer(state, room_id, LiarPhase::PointingResult);
    Ok(())
}

async fn after_pointing_result(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let mut game = read_state(state, room_id).await?;
    if game.phase != LiarPhase::PointingResult {
        return Ok(());
    }
    let caught = game.pointed_device_id.as_deref() == Some(game.liar_device_id.as_str());
    if caught {
        game.phase = LiarPhase::LiarGuess;
        write_state(state, room_id, &game).await?;
        broadcast_phase(state, room_id, LiarPhase::LiarGuess);
        arm_timer(state, room_id, LiarPhase::LiarGuess);
        Ok(())
    } else {
        // The room pointed at the wrong player; the liar escapes.
        finish_game(state, room_id, &mut game, LiarWinner::Liar).await
    }
}

/// Reveal everything and release the room's timers.
async fn finish_game(
    state: &SharedState,
    room_id: &str,
    game: &mut LiarState,
    winner: LiarWinner,
) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    game.phase = LiarPhase::GameEnd;
    game.winner = Some(winner);
    write_state(state, room_id, game).await?;

    let liar_nickname = room
        .player(&game.liar_device_id)
        .map(|player| player.nickname.clone())
        .unwrap_or_default();
    let is_guess_correct = game
        .liar_guess
        .as_deref()
        .is_some_and(|text| guess_matches(text, &game.keyword));
    state.bus().broadcast_all(
        room_id,
        EVENT_GAME_END,
        &LiarGameEndEvent {
            keyword: game.keyword.clone(),
            liar_device_id: game.liar_device_id.clone(),
            liar_nickname,
            pointed_device_id: game.pointed_device_id.clone(),
            liar_guess: game.liar_guess.clone(),
            is_guess_correct,
            winner,
        },
    );
    state.scheduler().cleanup(room_id);
    info!(%room_id, winner = ?winner, "liar game finished");
    Ok(())
}
