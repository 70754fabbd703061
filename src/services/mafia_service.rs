//! Mafia orchestration: night actions, day votes, executions, win checks.
//!
//! Handlers re-validate phase, role, and liveness after every state read so
//! a stale timer or a racing request refuses instead of corrupting state.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::{
    dto::{
        common::TimerTick,
        mafia::{
            ChatMessage, DayAnnouncementEvent, FinalVoteResultEvent, InvestigateResponse,
            MafiaGameEndEvent, MafiaPhaseChangedEvent, MafiaPublicStateView, MafiaRevealEntry,
            MafiaRoleView, VoteResultEvent, VoteStatusEvent,
        },
    },
    error::ServiceError,
    games::{
        GameKind, GamePhase,
        mafia::{
            MIN_PLAYERS, MafiaPhase, MafiaRole, MafiaState, MafiaWinner, check_winner,
            distribute_roles, tally_votes, unique_plurality,
        },
    },
    state::{SharedState, room::RoomInfo},
    store::keys,
};

const EVENT_TIMER: &str = "MAFIA_TIMER";
const EVENT_PHASE_CHANGED: &str = "MAFIA_PHASE_CHANGED";
const EVENT_DAY_ANNOUNCEMENT: &str = "MAFIA_DAY_ANNOUNCEMENT";
const EVENT_VOTE_STATUS: &str = "MAFIA_VOTE_STATUS";
const EVENT_VOTE_RESULT: &str = "MAFIA_VOTE_RESULT";
const EVENT_FINAL_VOTE_RESULT: &str = "MAFIA_FINAL_VOTE_RESULT";
const EVENT_CHAT: &str = "MAFIA_CHAT";
const EVENT_GAME_END: &str = "MAFIA_GAME_END";

async fn read_state(state: &SharedState, room_id: &str) -> Result<MafiaState, ServiceError> {
    state
        .store()
        .read_json(&keys::mafia_state(room_id))
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("no mafia game in room `{room_id}`")))
}

async fn write_state(
    state: &SharedState,
    room_id: &str,
    game: &MafiaState,
) -> Result<(), ServiceError> {
    state
        .store()
        .write_json(&keys::mafia_state(room_id), game)
        .await?;
    Ok(())
}

fn broadcast_phase(state: &SharedState, room_id: &str, game: &MafiaState) {
    state.bus().broadcast_all(
        room_id,
        EVENT_PHASE_CHANGED,
        &MafiaPhaseChangedEvent {
            phase: game.phase,
            day_count: game.day_count,
            timer_sec: game.timer_sec,
        },
    );
}

fn arm_timer(state: &SharedState, room_id: &str, phase: MafiaPhase) {
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
                        "mafia phase completion failed"
                    );
                }
            })
        }),
    );
}

/// Move to `phase`, persist, announce, and arm its deadline.
async fn enter_phase(
    state: &SharedState,
    room_id: &str,
    game: &mut MafiaState,
    phase: MafiaPhase,
) -> Result<(), ServiceError> {
    game.phase = phase;
    game.timer_sec = phase.duration_secs();
    write_state(state, room_id, game).await?;
    broadcast_phase(state, room_id, game);
    arm_timer(state, room_id, phase);
    Ok(())
}

/// Deal roles and open the first night. Requires at least four players.
pub async fn initialize(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let mut room = super::room_service::load_room(state, room_id).await?;
    if room.current_game != Some(GameKind::Mafia) {
        return Err(ServiceError::InvalidState(
            "room is not set to the mafia game".into(),
        ));
    }
    if room.players.len() < MIN_PLAYERS {
        return Err(ServiceError::InvalidState(format!(
            "mafia needs at least {MIN_PLAYERS} players"
        )));
    }

    let roles = distribute_roles(room.players.len());
    for (player, role) in room.players.iter_mut().zip(roles) {
        player.role = Some(role);
        player.alive = true;
    }
    super::room_service::save_room(state, &room).await?;
    state.store().delete(&keys::mafia_chat(room_id)).await?;

    let mut game = MafiaState::new();
    write_state(state, room_id, &game).await?;
    info!(%room_id, players = room.players.len(), "mafia game initialized");
    enter_phase(state, room_id, &mut game, MafiaPhase::Night).await
}

/// Private role disclosure; mafia also learn their accomplices.
pub async fn role_of(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
) -> Result<MafiaRoleView, ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    let player = room
        .player(device_id)
        .ok_or_else(|| ServiceError::NotFound(format!("device `{device_id}` is not in the room")))?;
    let role = player
        .role
        .ok_or_else(|| ServiceError::InvalidState("roles are not assigned yet".into()))?;
    let mates = if role == MafiaRole::Mafia {
        room.players
            .iter()
            .filter(|other| {
                other.role == Some(MafiaRole::Mafia) && other.device_id != player.device_id
            })
            .map(|other| other.nickname.clone())
            .collect()
    } else {
        Vec::new()
    };
    Ok(MafiaRoleView { role, mates })
}

/// Validate a night action and return the loaded documents.
async fn night_action(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
    target_device_id: &str,
    expected_role: MafiaRole,
) -> Result<(RoomInfo, MafiaState), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    let game = read_state(state, room_id).await?;
    if game.phase != MafiaPhase::Night {
        return Err(ServiceError::InvalidState(
            "night actions are only valid during the night".into(),
        ));
    }
    let actor = room
        .player(device_id)
        .ok_or_else(|| ServiceError::NotFound(format!("device `{device_id}` is not in the room")))?;
    if !actor.alive {
        return Err(ServiceError::InvalidState(
            "dead players cannot act".into(),
        ));
    }
    if actor.role != Some(expected_role) {
        return Err(ServiceError::Unauthorized(
            "this action belongs to another role".into(),
        ));
    }
    let target = room.player(target_device_id).ok_or_else(|| {
        ServiceError::InvalidArgument(format!("unknown target `{target_device_id}`"))
    })?;
    if !target.alive {
        return Err(ServiceError::InvalidArgument(
            "target is already dead".into(),
        ));
    }
    Ok((room, game))
}

pub async fn mafia_kill(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
    target_device_id: &str,
) -> Result<(), ServiceError> {
    let (room, mut game) =
        night_action(state, room_id, device_id, target_device_id, MafiaRole::Mafia).await?;
    game.mafia_target = Some(target_device_id.to_string());
    write_state(state, room_id, &game).await?;
    check_night_complete(state, room_id, &room, &game).await
}

pub async fn doctor_save(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
    target_device_id: &str,
) -> Result<(), ServiceError> {
    let (room, mut game) =
        night_action(state, room_id, device_id, target_device_id, MafiaRole::Doctor).await?;
    game.doctor_target = Some(target_device_id.to_string());
    write_state(state, room_id, &game).await?;
    check_night_complete(state, room_id, &room, &game).await
}

/// The verdict is returned synchronously to the policeman's own response
/// channel and never broadcast.
pub async fn police_investigate(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
    target_device_id: &str,
) -> Result<InvestigateResponse, ServiceError> {
    let (room, mut game) =
        night_action(state, room_id, device_id, target_device_id, MafiaRole::Police).await?;
    game.police_target = Some(target_device_id.to_string());
    write_state(state, room_id, &game).await?;

    let target = room.player(target_device_id).ok_or_else(|| {
        ServiceError::InvalidArgument(format!("unknown target `{target_device_id}`"))
    })?;
    let response = InvestigateResponse {
        target_device_id: target.device_id.clone(),
        target_nickname: target.nickname.clone(),
        is_mafia: target.role == Some(MafiaRole::Mafia),
    };
    check_night_complete(state, room_id, &room, &game).await?;
    Ok(response)
}

/// Every role with a living representative has chosen: cut the night short.
async fn check_night_complete(
    state: &SharedState,
    room_id: &str,
    room: &RoomInfo,
    game: &MafiaState,
) -> Result<(), ServiceError> {
    let has_living = |role: MafiaRole| {
        room.alive_players()
            .any(|player| player.role == Some(role))
    };
    let complete = (!has_living(MafiaRole::Mafia) || game.mafia_target.is_some())
        && (!has_living(MafiaRole::Doctor) || game.doctor_target.is_some())
        && (!has_living(MafiaRole::Police) || game.police_target.is_some());
    if complete {
        state.scheduler().cancel_countdown(room_id);
        resolve_night(state, room_id).await?;
    }
    Ok(())
}

/// Night -> dayAnnouncement: apply the kill/save, announce, check winners
/// before arming the next deadline.
async fn resolve_night(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let mut room = super::room_service::load_room(state, room_id).await?;
    let mut game = read_state(state, room_id).await?;
    if game.phase != MafiaPhase::Night {
        return Ok(()); // stale timer lost the race to an action-driven advance
    }

    game.was_saved = game.mafia_target.is_some() && game.mafia_target == game.doctor_target;
    let mut killed_nickname = None;
    if !game.was_saved {
        if let Some(target) = game.mafia_target.clone() {
            if let Some(player) = room.player_mut(&target) {
                player.alive = false;
                killed_nickname = Some(player.nickname.clone());
            }
            game.last_night_killed = Some(target.clone());
            game.dead_players.push(target);
            super::room_service::save_room(state, &room).await?;
        }
    }

    state.bus().broadcast_all(
        room_id,
        EVENT_DAY_ANNOUNCEMENT,
        &DayAnnouncementEvent {
            killed_device_id: if game.was_saved {
                None
            } else {
                game.mafia_target.clone()
            },
            killed_nickname,
            was_saved: game.was_saved,
            day_count: game.day_count,
        },
    );

    if let Some(winner) = room_winner(&room) {
        return finish_game(state, room_id, &room, &mut game, winner).await;
    }
    enter_phase(state, room_id, &mut game, MafiaPhase::DayAnnouncement).await
}

fn room_winner(room: &RoomInfo) -> Option<MafiaWinner> {
    check_winner(room.alive_players().filter_map(|player| player.role.as_ref()))
}

/// Record a day-vote ballot; last write wins per voter.
pub async fn vote(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
    target_device_id: &str,
) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    let mut game = read_state(state, room_id).await?;
    if game.phase != MafiaPhase::Vote {
        return Err(ServiceError::InvalidState(
            "voting is only open during the vote phase".into(),
        ));
    }
    let voter = room
        .player(device_id)
        .ok_or_else(|| ServiceError::NotFound(format!("device `{device_id}` is not in the room")))?;
    if !voter.alive {
        return Err(ServiceError::InvalidState("dead players cannot vote".into()));
    }
    let target = room.player(target_device_id).ok_or_else(|| {
        ServiceError::InvalidArgument(format!("unknown target `{target_device_id}`"))
    })?;
    if !target.alive {
        return Err(ServiceError::InvalidArgument(
            "target is already dead".into(),
        ));
    }

    game.votes
        .insert(device_id.to_string(), target_device_id.to_string());
    write_state(state, room_id, &game).await?;
    state.bus().broadcast_all(
        room_id,
        EVENT_VOTE_STATUS,
        &VoteStatusEvent {
            voted: game.votes.len(),
            total: room.alive_players().count(),
        },
    );
    Ok(())
}

/// Record a final-vote ballot; the accused is excluded.
pub async fn final_vote(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
    kill: bool,
) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    let mut game = read_state(state, room_id).await?;
    if game.phase != MafiaPhase::FinalVote {
        return Err(ServiceError::InvalidState(
            "final voting is not open".into(),
        ));
    }
    if game.execution_target.as_deref() == Some(device_id) {
        return Err(ServiceError::InvalidState(
            "the accused cannot vote on their own execution".into(),
        ));
    }
    let voter = room
        .player(device_id)
        .ok_or_else(|| ServiceError::NotFound(format!("device `{device_id}` is not in the room")))?;
    if !voter.alive {
        return Err(ServiceError::InvalidState("dead players cannot vote".into()));
    }

    game.final_votes.insert(device_id.to_string(), kill);
    write_state(state, room_id, &game).await?;
    state.bus().broadcast_all(
        room_id,
        EVENT_VOTE_STATUS,
        &VoteStatusEvent {
            voted: game.final_votes.len(),
            total: room.alive_players().count().saturating_sub(1),
        },
    );
    Ok(())
}

/// Append to the mafia chat and fan it out to mafia devices only.
pub async fn chat_post(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
    message: String,
) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    let author = room
        .player(device_id)
        .ok_or_else(|| ServiceError::NotFound(format!("device `{device_id}` is not in the room")))?;
    if author.role != Some(MafiaRole::Mafia) {
        return Err(ServiceError::Unauthorized(
            "mafia chat is for mafia only".into(),
        ));
    }

    let entry = ChatMessage {
        device_id: author.device_id.clone(),
        nickname: author.nickname.clone(),
        message,
        timestamp: unix_millis(),
    };
    state
        .store()
        .list_append(&keys::mafia_chat(room_id), &entry)
        .await?;

    let mafia_devices: Vec<String> = room
        .players
        .iter()
        .filter(|player| player.role == Some(MafiaRole::Mafia))
        .map(|player| player.device_id.clone())
        .collect();
    state
        .bus()
        .broadcast_devices(room_id, &mafia_devices, EVENT_CHAT, &entry);
    Ok(())
}

/// Read the chat log; same role gate as posting.
pub async fn chat_list(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
) -> Result<Vec<ChatMessage>, ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    let reader = room
        .player(device_id)
        .ok_or_else(|| ServiceError::NotFound(format!("device `{device_id}` is not in the room")))?;
    if reader.role != Some(MafiaRole::Mafia) {
        return Err(ServiceError::Unauthorized(
            "mafia chat is for mafia only".into(),
        ));
    }
    Ok(state.store().list_json(&keys::mafia_chat(room_id)).await?)
}

/// Debug-only override: jumps straight to the requested phase without any
/// winner check, exactly like the admin helper it mirrors.
pub async fn force_phase(
    state: &SharedState,
    room_id: &str,
    phase: MafiaPhase,
) -> Result<(), ServiceError> {
    let mut game = read_state(state, room_id).await?;
    if phase == MafiaPhase::Night {
        game.begin_night();
        write_state(state, room_id, &game).await?;
        broadcast_phase(state, room_id, &game);
        arm_timer(state, room_id, MafiaPhase::Night);
        return Ok(());
    }
    enter_phase(state, room_id, &mut game, phase).await
}

pub async fn public_state(
    state: &SharedState,
    room_id: &str,
) -> Result<MafiaPublicStateView, ServiceError> {
    let game = read_state(state, room_id).await?;
    Ok(MafiaPublicStateView::from(&game))
}

/// Scheduler completion dispatcher. Every arm re-validates the stored phase
/// so a timer that lost a cancel race becomes a no-op.
pub(crate) async fn on_phase_complete(
    state: &SharedState,
    room_id: &str,
    phase: MafiaPhase,
) -> Result<(), ServiceError> {
    match phase {
        MafiaPhase::Night => resolve_night(state, room_id).await,
        MafiaPhase::DayAnnouncement => {
            advance_if_current(state, room_id, phase, MafiaPhase::DayDiscussion).await
        }
        MafiaPhase::DayDiscussion => {
            let mut game = read_state(state, room_id).await?;
            if game.phase != phase {
                return Ok(());
            }
            game.votes.clear();
            enter_phase(state, room_id, &mut game, MafiaPhase::Vote).await
        }
        MafiaPhase::Vote => close_day_vote(state, room_id).await,
        MafiaPhase::VoteResult => after_vote_result(state, room_id).await,
        MafiaPhase::FinalDefense => {
            let mut game = read_state(state, room_id).await?;
            if game.phase != phase {
                return Ok(());
            }
            game.final_votes.clear();
            enter_phase(state, room_id, &mut game, MafiaPhase::FinalVote).await
        }
        MafiaPhase::FinalVote => close_final_vote(state, room_id).await,
        MafiaPhase::FinalVoteResult => begin_new_night(state, room_id).await,
        MafiaPhase::GameEnd => Ok(()),
    }
}

async fn advance_if_current(
    state: &SharedState,
    room_id: &str,
    current: MafiaPhase,
    next: MafiaPhase,
) -> Result<(), ServiceError> {
    let mut game = read_state(state, room_id).await?;
    if game.phase != current {
        return Ok(());
    }
    enter_phase(state, room_id, &mut game, next).await
}

/// Vote deadline: a unique plurality marks the execution target.
async fn close_day_vote(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let room = super::room_service::load_room(state, room_id).await?;
    let mut game = read_state(state, room_id).await?;
    if game.phase != MafiaPhase::Vote {
        return Ok(());
    }

    game.execution_target = unique_plurality(&game.votes);
    let tally = tally_votes(&game.votes)
        .into_iter()
        .map(|(device_id, count)| {
            let nickname = room
                .player(&device_id)
                .map(|player| player.nickname.clone())
                .unwrap_or(device_id);
            (nickname, count)
        })
        .collect();
    let execution_nickname = game
        .execution_target
        .as_ref()
        .and_then(|device_id| room.player(device_id))
        .map(|player| player.nickname.clone());

    state.bus().broadcast_all(
        room_id,
        EVENT_VOTE_RESULT,
        &VoteResultEvent {
            tally,
            execution_target: game.execution_target.clone(),
            execution_nickname,
        },
    );
    enter_phase(state, room_id, &mut game, MafiaPhase::VoteResult).await
}

/// voteResult deadline: a target goes to final defense, a tie skips to the
/// next night.
async fn after_vote_result(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let game = read_state(state, room_id).await?;
    if game.phase != MafiaPhase::VoteResult {
        return Ok(());
    }
    if game.execution_target.is_some() {
        let mut game = game;
        enter_phase(state, room_id, &mut game, MafiaPhase::FinalDefense).await
    } else {
        begin_new_night_with(state, room_id, game).await
    }
}

/// finalVote deadline: execute on kill > save, checking winners before the
/// next timer is armed.
async fn close_final_vote(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let mut room = super::room_service::load_room(state, room_id).await?;
    let mut game = read_state(state, room_id).await?;
    if game.phase != MafiaPhase::FinalVote {
        return Ok(());
    }
    let Some(target) = game.execution_target.clone() else {
        return begin_new_night_with(state, room_id, game).await;
    };

    let kill_votes = game.final_votes.values().filter(|kill| **kill).count();
    let save_votes = game.final_votes.len() - kill_votes;
    let executed = kill_votes > save_votes;

    let target_nickname = room
        .player(&target)
        .map(|player| player.nickname.clone())
        .unwrap_or_else(|| target.clone());
    if executed {
        if let Some(player) = room.player_mut(&target) {
            player.alive = false;
        }
        game.dead_players.push(target.clone());
        super::room_service::save_room(state, &room).await?;
    }

    state.bus().broadcast_all(
        room_id,
        EVENT_FINAL_VOTE_RESULT,
        &FinalVoteResultEvent {
            kill_votes,
            save_votes,
            executed,
            target_device_id: target,
            target_nickname,
        },
    );

    if executed {
        if let Some(winner) = room_winner(&room) {
            return finish_game(state, room_id, &room, &mut game, winner).await;
        }
    }
    enter_phase(state, room_id, &mut game, MafiaPhase::FinalVoteResult).await
}

async fn begin_new_night(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    let game = read_state(state, room_id).await?;
    if game.phase != MafiaPhase::FinalVoteResult {
        return Ok(());
    }
    begin_new_night_with(state, room_id, game).await
}

async fn begin_new_night_with(
    state: &SharedState,
    room_id: &str,
    mut game: MafiaState,
) -> Result<(), ServiceError> {
    game.begin_night();
    write_state(state, room_id, &game).await?;
    broadcast_phase(state, room_id, &game);
    arm_timer(state, room_id, MafiaPhase::Night);
    Ok(())
}

/// Publish every role and release the room's timers.
async fn finish_game(
    state: &SharedState,
    room_id: &str,
    room: &RoomInfo,
    game: &mut MafiaState,
    winner: MafiaWinner,
) -> Result<(), ServiceError> {
    game.phase = MafiaPhase::GameEnd;
    game.timer_sec = 0;
    game.winner = Some(winner);
    write_state(state, room_id, game).await?;

    let players = room
        .players
        .iter()
        .filter_map(|player| {
            player.role.map(|role| MafiaRevealEntry {
                device_id: player.device_id.clone(),
                nickname: player.nickname.clone(),
                role,
                alive: player.alive,
            })
        })
        .collect();
    state.bus().broadcast_all(
        room_id,
        EVENT_GAME_END,
        &MafiaGameEndEvent { winner, players },
    );
    state.scheduler().cleanup(room_id);
    info!(%room_id, winner = ?winner, "mafia game finished");
    Ok(())
}

fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dto::room::JoinRoomRequest,
        services::room_service::{create_room, join, load_room, start_game},
        state::test_state,
    };

    async fn mafia_room(state: &SharedState, players: usize) -> String {
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
        start_game(state, &created.room_id, GameKind::Mafia)
            .await
            .unwrap();
        initialize(state, &created.room_id).await.unwrap();
        created.room_id
    }

    fn device_with_role(room: &RoomInfo, role: MafiaRole) -> Option<String> {
        room.players
            .iter()
            .find(|player| player.role == Some(role))
            .map(|player| player.device_id.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_requires_four_players() {
        let state = test_state();
        let created = create_room(&state).await.unwrap();
        for i in 0..3 {
            join(
                &state,
                JoinRoomRequest {
                    room_id: created.room_id.clone(),
                    nickname: format!("p{i}"),
                    profile: None,
                },
            )
            .await
            .unwrap();
        }
        start_game(&state, &created.room_id, GameKind::Mafia)
            .await
            .unwrap();
        let err = initialize(&state, &created.room_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn night_completes_early_when_all_roles_acted() {
        let state = test_state();
        // Seven players: 2 mafia, 1 doctor, 1 police, 3 civilians.
        let room_id = mafia_room(&state, 7).await;
        let room = load_room(&state, &room_id).await.unwrap();

        let mafia = device_with_role(&room, MafiaRole::Mafia).unwrap();
        let doctor = device_with_role(&room, MafiaRole::Doctor).unwrap();
        let police = device_with_role(&room, MafiaRole::Police).unwrap();
        let victim = room
            .players
            .iter()
            .find(|player| player.role == Some(MafiaRole::Civilian))
            .unwrap()
            .device_id
            .clone();

        mafia_kill(&state, &room_id, &mafia, &victim).await.unwrap();
        doctor_save(&state, &room_id, &doctor, &doctor).await.unwrap();
        let report = police_investigate(&state, &room_id, &police, &mafia)
            .await
            .unwrap();
        assert!(report.is_mafia);

        // The night resolved without waiting out the 30 second deadline.
        let game = read_state(&state, &room_id).await.unwrap();
        assert_eq!(game.phase, MafiaPhase::DayAnnouncement);
        assert_eq!(game.last_night_killed.as_deref(), Some(victim.as_str()));
        let room = load_room(&state, &room_id).await.unwrap();
        assert!(!room.player(&victim).unwrap().alive);
    }

    #[tokio::test(start_paused = true)]
    async fn doctor_save_prevents_the_kill() {
        let state = test_state();
        let room_id = mafia_room(&state, 7).await;
        let room = load_room(&state, &room_id).await.unwrap();
        let mafia = device_with_role(&room, MafiaRole::Mafia).unwrap();
        let doctor = device_with_role(&room, MafiaRole::Doctor).unwrap();
        let police = device_with_role(&room, MafiaRole::Police).unwrap();
        let victim = room
            .players
            .iter()
            .find(|player| player.role == Some(MafiaRole::Civilian))
            .unwrap()
            .device_id
            .clone();

        mafia_kill(&state, &room_id, &mafia, &victim).await.unwrap();
        doctor_save(&state, &room_id, &doctor, &victim).await.unwrap();
        police_investigate(&state, &room_id, &police, &victim)
            .await
            .unwrap();

        let game = read_state(&state, &room_id).await.unwrap();
        assert!(game.was_saved);
        assert!(game.last_night_killed.is_none());
        let room = load_room(&state, &room_id).await.unwrap();
        assert!(room.player(&victim).unwrap().alive);
    }

    #[tokio::test(start_paused = true)]
    async fn night_action_role_gates() {
        let state = test_state();
        let room_id = mafia_room(&state, 7).await;
        let room = load_room(&state, &room_id).await.unwrap();
        let civilian = room
            .players
            .iter()
            .find(|player| player.role == Some(MafiaRole::Civilian))
            .unwrap()
            .device_id
            .clone();
        let mafia = device_with_role(&room, MafiaRole::Mafia).unwrap();

        let err = mafia_kill(&state, &room_id, &civilian, &mafia)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn vote_outside_phase_is_rejected() {
        let state = test_state();
        let room_id = mafia_room(&state, 4).await;
        let room = load_room(&state, &room_id).await.unwrap();
        let voter = room.players[0].device_id.clone();
        let target = room.players[1].device_id.clone();

        let err = vote(&state, &room_id, &voter, &target).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn day_vote_plurality_sets_execution_target() {
        let state = test_state();
        let room_id = mafia_room(&state, 5).await;
        let room = load_room(&state, &room_id).await.unwrap();
        let devices: Vec<String> = room
            .players
            .iter()
            .map(|player| player.device_id.clone())
            .collect();

        let mut game = read_state(&state, &room_id).await.unwrap();
        game.phase = MafiaPhase::Vote;
        write_state(&state, &room_id, &game).await.unwrap();

        vote(&state, &room_id, &devices[0], &devices[3]).await.unwrap();
        vote(&state, &room_id, &devices[1], &devices[3]).await.unwrap();
        vote(&state, &room_id, &devices[2], &devices[0]).await.unwrap();
        // Re-vote is last-write-wins.
        vote(&state, &room_id, &devices[2], &devices[3]).await.unwrap();

        close_day_vote(&state, &room_id).await.unwrap();
        let game = read_state(&state, &room_id).await.unwrap();
        assert_eq!(game.phase, MafiaPhase::VoteResult);
        assert_eq!(game.execution_target.as_deref(), Some(devices[3].as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn tied_day_vote_means_no_execution() {
        let state = test_state();
        let room_id = mafia_room(&state, 4).await;
        let room = load_room(&state, &room_id).await.unwrap();
        let devices: Vec<String> = room
            .players
            .iter()
            .map(|player| player.device_id.clone())
            .collect();

        let mut game = read_state(&state, &room_id).await.unwrap();
        game.phase = MafiaPhase::Vote;
        write_state(&state, &room_id, &game).await.unwrap();

        vote(&state, &room_id, &devices[0], &devices[1]).await.unwrap();
        vote(&state, &room_id, &devices[1], &devices[0]).await.unwrap();

        close_day_vote(&state, &room_id).await.unwrap();
        let game = read_state(&state, &room_id).await.unwrap();
        assert!(game.execution_target.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn accused_cannot_final_vote_and_execution_kills() {
        let state = test_state();
        let room_id = mafia_room(&state, 5).await;
        let room = load_room(&state, &room_id).await.unwrap();
        // Execute a civilian so the game continues afterwards.
        let accused = room
            .players
            .iter()
            .find(|player| player.role == Some(MafiaRole::Civilian))
            .unwrap()
            .device_id
            .clone();
        let voters: Vec<String> = room
            .players
            .iter()
            .filter(|player| player.device_id != accused)
            .map(|player| player.device_id.clone())
            .collect();

        let mut game = read_state(&state, &room_id).await.unwrap();
        game.phase = MafiaPhase::FinalVote;
        game.execution_target = Some(accused.clone());
        write_state(&state, &room_id, &game).await.unwrap();

        let err = final_vote(&state, &room_id, &accused, true).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        final_vote(&state, &room_id, &voters[0], true).await.unwrap();
        final_vote(&state, &room_id, &voters[1], true).await.unwrap();
        final_vote(&state, &room_id, &voters[2], false).await.unwrap();

        close_final_vote(&state, &room_id).await.unwrap();
        let room = load_room(&state, &room_id).await.unwrap();
        assert!(!room.player(&accused).unwrap().alive);
    }

    #[tokio::test(start_paused = true)]
    async fn killing_the_last_mafia_ends_with_citizen_win() {
        let state = test_state();
        let room_id = mafia_room(&state, 4).await;
        let room = load_room(&state, &room_id).await.unwrap();
        let mafia = device_with_role(&room, MafiaRole::Mafia).unwrap();
        let voters: Vec<String> = room
            .players
            .iter()
            .filter(|player| player.device_id != mafia)
            .map(|player| player.device_id.clone())
            .collect();

        let mut game = read_state(&state, &room_id).await.unwrap();
        game.phase = MafiaPhase::FinalVote;
        game.execution_target = Some(mafia.clone());
        write_state(&state, &room_id, &game).await.unwrap();

        for voter in &voters {
            final_vote(&state, &room_id, voter, true).await.unwrap();
        }
        close_final_vote(&state, &room_id).await.unwrap();

        let game = read_state(&state, &room_id).await.unwrap();
        assert_eq!(game.phase, MafiaPhase::GameEnd);
        assert_eq!(game.winner, Some(MafiaWinner::Citizen));
    }

    #[tokio::test(start_paused = true)]
    async fn chat_is_mafia_only() {
        let state = test_state();
        let room_id = mafia_room(&state, 5).await;
        let room = load_room(&state, &room_id).await.unwrap();
        let mafia = device_with_role(&room, MafiaRole::Mafia).unwrap();
        let civilian = room
            .players
            .iter()
            .find(|player| player.role == Some(MafiaRole::Civilian))
            .unwrap()
            .device_id
            .clone();

        chat_post(&state, &room_id, &mafia, "오늘 밤은 조용히".into())
            .await
            .unwrap();
        let err = chat_post(&state, &room_id, &civilian, "나도 끼워줘".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let log = chat_list(&state, &room_id, &mafia).await.unwrap();
        assert_eq!(log.len(), 1);
        let err = chat_list(&state, &room_id, &civilian).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }
}
