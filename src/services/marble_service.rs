//! Marble orchestration: penalty submission and voting, board setup, and
//! the dice-roll turn loop.

use indexmap::IndexMap;
use rand::seq::SliceRandom;
use tracing::info;

use crate::{
    dto::marble::{
        DiceRolledEvent, MarbleStartedEvent, MarbleStateView, PenaltyProgressEvent, PenaltyView,
        SelectedPenaltiesView, TurnChangeEvent, VoteStatusEntry,
    },
    error::ServiceError,
    games::{
        GameKind,
        marble::{
            MAX_PENALTIES_PER_DEVICE, MarbleMode, MarbleState, PenaltyEntry, generate_board,
            roll_dice, select_penalties,
        },
    },
    state::{SharedState, room::RoomInfo},
    store::keys,
};

const EVENT_PENALTY_PROGRESS: &str = "MARBLE_PENALTY_PROGRESS";
const EVENT_VOTE_STATUS: &str = "MARBLE_VOTE_STATUS";
const EVENT_VOTE_DONE: &str = "MARBLE_VOTE_DONE";
const EVENT_GAME_STARTED: &str = "MARBLE_GAME_STARTED";
const EVENT_DICE_ROLLED: &str = "MARBLE_DICE_ROLLED";
const EVENT_TURN_CHANGE: &str = "MARBLE_TURN_CHANGE";
const EVENT_GAME_END: &str = "MARBLE_GAME_END";

/// Vote record document: penalty id -> voter device ids.
type VoteMap = IndexMap<String, Vec<String>>;

async fn read_state(state: &SharedState, room_id: &str) -> Result<MarbleState, ServiceError> {
    state
        .store()
        .read_json(&keys::marble_state(room_id))
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("no marble game in room `{room_id}`")))
}

async fn write_state(
    state: &SharedState,
    room_id: &str,
    game: &MarbleState,
) -> Result<(), ServiceError> {
    state
        .store()
        .write_json(&keys::marble_state(room_id), game)
        .await?;
    Ok(())
}

async fn read_penalties(
    state: &SharedState,
    room_id: &str,
) -> Result<Vec<PenaltyEntry>, ServiceError> {
    Ok(state
        .store()
        .list_json(&keys::marble_penalties(room_id))
        .await?)
}

async fn read_votes(state: &SharedState, room_id: &str) -> Result<VoteMap, ServiceError> {
    Ok(state
        .store()
        .read_json(&keys::marble_votes(room_id))
        .await?
        .unwrap_or_default())
}

/// Append one penalty (two per device at most) and broadcast progress.
pub async fn submit_penalty(
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

    let submitted = read_penalties(state, room_id).await?;
    let mine = submitted
        .iter()
        .filter(|entry| entry.device_id == device_id)
        .count();
    if mine >= MAX_PENALTIES_PER_DEVICE {
        return Err(ServiceError::Conflict(format!(
            "each device may submit at most {MAX_PENALTIES_PER_DEVICE} penalties"
        )));
    }

    let entry = PenaltyEntry {
        penalty_id: format!("p{}", submitted.len()),
        device_id: device_id.to_string(),
        text,
    };
    let total = state
        .store()
        .list_append(&keys::marble_penalties(room_id), &entry)
        .await? as usize;

    let expected = room.players.len() * MAX_PENALTIES_PER_DEVICE;
    state.bus().broadcast_all(
        room_id,
        EVENT_PENALTY_PROGRESS,
        &PenaltyProgressEvent {
            total_count: total,
            expected_count: expected,
            is_all_submitted: total >= expected,
        },
    );
    Ok(())
}

pub async fn list_penalties(
    state: &SharedState,
    room_id: &str,
) -> Result<Vec<PenaltyView>, ServiceError> {
    let submitted = read_penalties(state, room_id).await?;
    Ok(submitted
        .into_iter()
        .map(|entry| PenaltyView {
            penalty_id: entry.penalty_id,
            text: entry.text,
        })
        .collect())
}

/// Toggle a (device, penalty) vote and broadcast the sorted snapshot.
pub async fn toggle_vote(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
    penalty_id: &str,
) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    if room.player(device_id).is_none() {
        return Err(ServiceError::NotFound(format!(
            "device `{device_id}` is not in the room"
        )));
    }
    let submitted = read_penalties(state, room_id).await?;
    if !submitted.iter().any(|entry| entry.penalty_id == penalty_id) {
        return Err(ServiceError::InvalidArgument(format!(
            "unknown penalty `{penalty_id}`"
        )));
    }

    let mut votes = read_votes(state, room_id).await?;
    let voters = votes.entry(penalty_id.to_string()).or_default();
    if let Some(position) = voters.iter().position(|voter| voter == device_id) {
        voters.remove(position);
    } else {
        voters.push(device_id.to_string());
    }
    state
        .store()
        .write_json(&keys::marble_votes(room_id), &votes)
        .await?;

    let mut snapshot: Vec<VoteStatusEntry> = submitted
        .iter()
        .map(|entry| VoteStatusEntry {
            penalty_id: entry.penalty_id.clone(),
            text: entry.text.clone(),
            count: votes
                .get(&entry.penalty_id)
                .map(|voters| voters.len())
                .unwrap_or(0),
        })
        .collect();
    snapshot.sort_by(|a, b| b.count.cmp(&a.count).then(a.penalty_id.cmp(&b.penalty_id)));
    state
        .bus()
        .broadcast_all(room_id, EVENT_VOTE_STATUS, &snapshot);
    Ok(())
}

/// A device declares its voting finished; progress goes to everyone so the
/// host knows when to close.
pub async fn vote_done(
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
    state
        .store()
        .set_add(&keys::marble_vote_done(room_id), device_id)
        .await?;
    let done = state
        .store()
        .set_size(&keys::marble_vote_done(room_id))
        .await? as usize;
    state.bus().broadcast_all(
        room_id,
        EVENT_VOTE_DONE,
        &serde_json::json!({ "done": done, "total": room.players.len() }),
    );
    Ok(())
}

/// Close the vote: rank, backfill from the catalog penalty category, then
/// the built-in defaults, and persist the selected 26.
pub async fn close_voting(
    state: &SharedState,
    room_id: &str,
) -> Result<SelectedPenaltiesView, ServiceError> {
    super::room_service::load_room(state, room_id).await?;
    let submitted = read_penalties(state, room_id).await?;
    let votes = read_votes(state, room_id).await?;

    let catalog_pool = state
        .catalog()
        .find_one_penalty_category()
        .map(|category| category.words.clone())
        .unwrap_or_default();
    let selected = select_penalties(&submitted, &votes, catalog_pool);
    state
        .store()
        .write_json(&keys::marble_selected(room_id), &selected)
        .await?;
    info!(%room_id, selected = selected.len(), "marble penalties selected");
    Ok(SelectedPenaltiesView {
        penalties: selected,
    })
}

/// Host picks the mode; this generates the board and the turn order.
pub async fn select_mode(
    state: &SharedState,
    room_id: &str,
    mode: MarbleMode,
) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    if room.current_game != Some(GameKind::Marble) {
        return Err(ServiceError::InvalidState(
            "room is not set to the marble game".into(),
        ));
    }
    let selected: Vec<String> = state
        .store()
        .read_json(&keys::marble_selected(room_id))
        .await?
        .ok_or_else(|| {
            ServiceError::InvalidState("close the penalty vote before starting".into())
        })?;

    let turn_order: Vec<String> = match mode {
        MarbleMode::Team => {
            let teams = room.team_tags();
            if teams.is_empty() {
                return Err(ServiceError::InvalidState(
                    "team mode requires assigned teams".into(),
                ));
            }
            teams
        }
        MarbleMode::Solo => {
            let mut devices: Vec<String> = room
                .players
                .iter()
                .map(|player| player.device_id.clone())
                .collect();
            devices.shuffle(&mut rand::rng());
            devices
        }
    };

    let board = generate_board(&selected);
    let positions = turn_order.iter().map(|holder| (holder.clone(), 0)).collect();
    let game = MarbleState {
        mode,
        board,
        positions,
        turn_order,
        turn_index: 0,
        last_dice: None,
    };
    write_state(state, room_id, &game).await?;

    let first_turn = game.current_turn().cloned().unwrap_or_default();
    state.bus().broadcast_all(
        room_id,
        EVENT_GAME_STARTED,
        &MarbleStartedEvent {
            mode,
            board: game.board.clone(),
            turn_order: game.turn_order.clone(),
            first_turn: first_turn.clone(),
        },
    );
    broadcast_turn(state, room_id, &room, &game);
    info!(%room_id, mode = ?mode, "marble board generated");
    Ok(())
}

fn turn_devices(room: &RoomInfo, game: &MarbleState, holder: &str) -> Vec<String> {
    match game.mode {
        MarbleMode::Team => room
            .players
            .iter()
            .filter(|player| player.team.as_deref() == Some(holder))
            .map(|player| player.device_id.clone())
            .collect(),
        MarbleMode::Solo => vec![holder.to_string()],
    }
}

fn broadcast_turn(state: &SharedState, room_id: &str, room: &RoomInfo, game: &MarbleState) {
    let Some(holder) = game.current_turn() else {
        return;
    };
    state.bus().broadcast_players(
        room_id,
        EVENT_TURN_CHANGE,
        &TurnChangeEvent {
            turn: holder.clone(),
            turn_device_ids: turn_devices(room, game, holder),
        },
    );
}

/// Roll for the current turn holder and advance its marble modulo the board.
pub async fn roll(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
) -> Result<DiceRolledEvent, ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    let mut game = read_state(state, room_id).await?;
    let player = room
        .player(device_id)
        .ok_or_else(|| ServiceError::NotFound(format!("device `{device_id}` is not in the room")))?;
    let holder = game
        .current_turn()
        .cloned()
        .ok_or_else(|| ServiceError::InvalidState("no turn order is set".into()))?;

    let on_turn = match game.mode {
        MarbleMode::Team => player.team.as_deref() == Some(holder.as_str()),
        MarbleMode::Solo => player.device_id == holder,
    };
    if !on_turn {
        return Err(ServiceError::InvalidState(format!(
            "it is {holder}'s turn"
        )));
    }

    let dice = roll_dice();
    let position = game.positions.get(&holder).copied().unwrap_or(0);
    let landed = (position + dice as usize) % game.board.len().max(1);
    game.positions.insert(holder.clone(), landed);
    game.last_dice = Some(dice);
    game.advance_turn();
    write_state(state, room_id, &game).await?;

    let next_turn = game.current_turn().cloned().unwrap_or_default();
    let event = DiceRolledEvent {
        dice,
        mover: holder,
        mover_nickname: player.nickname.clone(),
        position: landed,
        cell: game.board[landed].clone(),
        next_turn,
    };
    state
        .bus()
        .broadcast_all(room_id, EVENT_DICE_ROLLED, &event);
    broadcast_turn(state, room_id, &room, &game);
    Ok(event)
}

/// Host command: clear every marble key and announce the end.
pub async fn end_game(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    super::room_service::load_room(state, room_id).await?;
    for key in [
        keys::marble_state(room_id),
        keys::marble_penalties(room_id),
        keys::marble_votes(room_id),
        keys::marble_selected(room_id),
        keys::marble_vote_done(room_id),
    ] {
        state.store().delete(&key).await?;
    }
    state
        .bus()
        .broadcast_all(room_id, EVENT_GAME_END, &serde_json::json!({}));
    state.scheduler().cleanup(room_id);
    info!(%room_id, "marble game ended");
    Ok(())
}

pub async fn view(state: &SharedState, room_id: &str) -> Result<MarbleStateView, ServiceError> {
    let game = read_state(state, room_id).await?;
    Ok(MarbleStateView::from(&game))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dto::room::JoinRoomRequest,
        games::marble::{BOARD_SIZE, CellKind, SELECTED_PENALTY_COUNT},
        services::{
            room_service::{create_room, join, load_room, start_game},
            team_service,
        },
        state::test_state,
    };

    async fn marble_room(state: &SharedState, players: usize) -> String {
        let created = create_room(state).await.unwrap();
        for i in 0..players {
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
        start_game(state, &created.room_id, GameKind::Marble)
            .await
            .unwrap();
        created.room_id
    }

    #[tokio::test]
    async fn penalty_submission_caps_at_two_per_device() {
        let state = test_state();
        let room_id = marble_room(&state, 2).await;
        let room = load_room(&state, &room_id).await.unwrap();
        let device = room.players[0].device_id.clone();

        submit_penalty(&state, &room_id, &device, "벌칙 하나".into())
            .await
            .unwrap();
        submit_penalty(&state, &room_id, &device, "벌칙 둘".into())
            .await
            .unwrap();
        let err = submit_penalty(&state, &room_id, &device, "벌칙 셋".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn vote_toggle_adds_then_removes() {
        let state = test_state();
        let room_id = marble_room(&state, 2).await;
        let room = load_room(&state, &room_id).await.unwrap();
        let device = room.players[0].device_id.clone();
        submit_penalty(&state, &room_id, &device, "벌칙".into())
            .await
            .unwrap();

        toggle_vote(&state, &room_id, &device, "p0").await.unwrap();
        let votes = read_votes(&state, &room_id).await.unwrap();
        assert_eq!(votes["p0"].len(), 1);

        toggle_vote(&state, &room_id, &device, "p0").await.unwrap();
        let votes = read_votes(&state, &room_id).await.unwrap();
        assert!(votes["p0"].is_empty());
    }

    #[tokio::test]
    async fn closing_the_vote_selects_a_full_slate() {
        let state = test_state();
        let room_id = marble_room(&state, 2).await;
        let room = load_room(&state, &room_id).await.unwrap();
        let device = room.players[0].device_id.clone();
        submit_penalty(&state, &room_id, &device, "직접 낸 벌칙".into())
            .await
            .unwrap();

        let selected = close_voting(&state, &room_id).await.unwrap();
        assert_eq!(selected.penalties.len(), SELECTED_PENALTY_COUNT);
        assert!(selected.penalties.contains(&"직접 낸 벌칙".to_string()));
    }

    #[tokio::test]
    async fn team_mode_builds_board_and_team_turns() {
        let state = test_state();
        let room_id = marble_room(&state, 4).await;
        team_service::assign_random(&state, &room_id, 2).await.unwrap();
        close_voting(&state, &room_id).await.unwrap();

        select_mode(&state, &room_id, MarbleMode::Team).await.unwrap();

        let game = read_state(&state, &room_id).await.unwrap();
        assert_eq!(game.board.len(), BOARD_SIZE);
        assert_eq!(game.turn_order.len(), 2);
        assert!(game.positions.values().all(|position| *position == 0));
        assert_eq!(game.board[0].kind, CellKind::Start);
    }

    #[tokio::test]
    async fn out_of_turn_roll_is_rejected() {
        let state = test_state();
        let room_id = marble_room(&state, 4).await;
        team_service::assign_random(&state, &room_id, 2).await.unwrap();
        close_voting(&state, &room_id).await.unwrap();
        select_mode(&state, &room_id, MarbleMode::Team).await.unwrap();

        let room = load_room(&state, &room_id).await.unwrap();
        let game = read_state(&state, &room_id).await.unwrap();
        let on_turn = game.current_turn().unwrap().clone();
        let off_turn_device = room
            .players
            .iter()
            .find(|player| player.team.as_deref() != Some(on_turn.as_str()))
            .unwrap()
            .device_id
            .clone();

        let err = roll(&state, &room_id, &off_turn_device).await.unwrap_err();
        match err {
            ServiceError::InvalidState(message) => {
                assert!(message.contains(&format!("{on_turn}'s turn")));
            }
            other => panic!("expected invalid state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rolls_alternate_teams_fairly() {
        let state = test_state();
        let room_id = marble_room(&state, 4).await;
        team_service::assign_random(&state, &room_id, 2).await.unwrap();
        close_voting(&state, &room_id).await.unwrap();
        select_mode(&state, &room_id, MarbleMode::Team).await.unwrap();

        let room = load_room(&state, &room_id).await.unwrap();
        let mut rolls_by_team: IndexMap<String, usize> = IndexMap::new();
        for _ in 0..6 {
            let game = read_state(&state, &room_id).await.unwrap();
            let holder = game.current_turn().unwrap().clone();
            let device = room
                .players
                .iter()
                .find(|player| player.team.as_deref() == Some(holder.as_str()))
                .unwrap()
                .device_id
                .clone();
            let event = roll(&state, &room_id, &device).await.unwrap();
            assert!((1..=6).contains(&event.dice));
            assert!(event.position < BOARD_SIZE);
            *rolls_by_team.entry(holder).or_default() += 1;
        }
        assert!(rolls_by_team.values().all(|count| *count == 3));
    }

    #[tokio::test]
    async fn solo_mode_positions_move_modulo_board() {
        let state = test_state();
        let room_id = marble_room(&state, 2).await;
        close_voting(&state, &room_id).await.unwrap();
        select_mode(&state, &room_id, MarbleMode::Solo).await.unwrap();

        let game = read_state(&state, &room_id).await.unwrap();
        let first = game.current_turn().unwrap().clone();
        let event = roll(&state, &room_id, &first).await.unwrap();
        let game = read_state(&state, &room_id).await.unwrap();
        assert_eq!(game.positions[&first], event.dice as usize % BOARD_SIZE);
    }

    #[tokio::test]
    async fn end_game_purges_marble_keys() {
        let state = test_state();
        let room_id = marble_room(&state, 2).await;
        close_voting(&state, &room_id).await.unwrap();
        select_mode(&state, &room_id, MarbleMode::Solo).await.unwrap();

        end_game(&state, &room_id).await.unwrap();
        let err = view(&state, &room_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
