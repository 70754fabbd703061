//! Team assignment: random buckets, player opt-in, manual reset.

use indexmap::IndexMap;
use rand::seq::SliceRandom;

use crate::{
    dto::{
        room::PlayerView,
        team::{PlayerTeamSelectedEvent, TeamManualStartEvent, TeamStatusView},
    },
    error::ServiceError,
    services::room_service::{load_room, save_room},
    state::{SharedState, room::RoomInfo},
};

const EVENT_TEAM_ASSIGNED: &str = "TEAM_ASSIGNED";
const EVENT_PLAYER_TEAM_SELECTED: &str = "PLAYER_TEAM_SELECTED";
const EVENT_TEAM_MANUAL_START: &str = "TEAM_MANUAL_START";

fn team_tag(index: usize) -> String {
    char::from(b'A' + index as u8).to_string()
}

/// Shuffle the roster and deal team tags round-robin, so bucket sizes
/// differ by at most one.
pub async fn assign_random(
    state: &SharedState,
    room_id: &str,
    team_count: usize,
) -> Result<TeamStatusView, ServiceError> {
    let mut room = load_room(state, room_id).await?;
    if room.players.len() < team_count {
        return Err(ServiceError::InvalidArgument(format!(
            "cannot split {} players into {team_count} teams",
            room.players.len()
        )));
    }

    let mut order: Vec<usize> = (0..room.players.len()).collect();
    order.shuffle(&mut rand::rng());
    for (position, player_index) in order.into_iter().enumerate() {
        room.players[player_index].team = Some(team_tag(position % team_count));
    }
    save_room(state, &room).await?;

    let status = build_status(&room, team_count);
    state
        .bus()
        .broadcast_all(room_id, EVENT_TEAM_ASSIGNED, &status);
    Ok(status)
}

/// Player-side opt-in; a bucket refuses members past ⌈n/k⌉.
pub async fn select_team(
    state: &SharedState,
    room_id: &str,
    device_id: &str,
    team: &str,
    team_count: usize,
) -> Result<(), ServiceError> {
    let mut room = load_room(state, room_id).await?;
    let valid_tags: Vec<String> = (0..team_count).map(team_tag).collect();
    if !valid_tags.iter().any(|tag| tag == team) {
        return Err(ServiceError::InvalidArgument(format!(
            "unknown team `{team}`"
        )));
    }

    let ceiling = room.players.len().div_ceil(team_count);
    let occupancy = room
        .players
        .iter()
        .filter(|player| player.team.as_deref() == Some(team))
        .count();
    if occupancy >= ceiling {
        return Err(ServiceError::Conflict(format!("team `{team}` is full")));
    }

    let player = room
        .player_mut(device_id)
        .ok_or_else(|| ServiceError::NotFound(format!("device `{device_id}` is not in the room")))?;
    player.team = Some(team.to_string());
    let event = PlayerTeamSelectedEvent {
        device_id: player.device_id.clone(),
        nickname: player.nickname.clone(),
        team: team.to_string(),
    };
    save_room(state, &room).await?;

    state
        .bus()
        .broadcast_all(room_id, EVENT_PLAYER_TEAM_SELECTED, &event);
    Ok(())
}

/// Clear every tag and announce manual team picking with the chosen count.
pub async fn reset_teams(
    state: &SharedState,
    room_id: &str,
    team_count: usize,
) -> Result<(), ServiceError> {
    let mut room = load_room(state, room_id).await?;
    for player in &mut room.players {
        player.team = None;
    }
    save_room(state, &room).await?;

    state.bus().broadcast_all(
        room_id,
        EVENT_TEAM_MANUAL_START,
        &TeamManualStartEvent { team_count },
    );
    Ok(())
}

pub async fn status(state: &SharedState, room_id: &str) -> Result<TeamStatusView, ServiceError> {
    let room = load_room(state, room_id).await?;
    let team_count = room.team_tags().len();
    Ok(build_status(&room, team_count))
}

fn build_status(room: &RoomInfo, team_count: usize) -> TeamStatusView {
    let mut teams: IndexMap<String, Vec<PlayerView>> = (0..team_count)
        .map(|index| (team_tag(index), Vec::new()))
        .collect();
    let mut unassigned = Vec::new();
    for player in &room.players {
        match &player.team {
            Some(tag) => teams
                .entry(tag.clone())
                .or_default()
                .push(PlayerView::from(player)),
            None => unassigned.push(PlayerView::from(player)),
        }
    }
    TeamStatusView { teams, unassigned }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dto::room::JoinRoomRequest,
        services::room_service::{create_room, join},
        state::test_state,
    };

    async fn room_with_players(state: &SharedState, count: usize) -> String {
        let created = create_room(state).await.unwrap();
        for i in 0..count {
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
        created.room_id
    }

    #[tokio::test]
    async fn random_buckets_differ_by_at_most_one() {
        let state = test_state();
        let room_id = room_with_players(&state, 7).await;

        let status = assign_random(&state, &room_id, 3).await.unwrap();

        let sizes: Vec<usize> = status.teams.values().map(Vec::len).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 7);
        let max = sizes.iter().max().unwrap();
        let min = sizes.iter().min().unwrap();
        assert!(max - min <= 1, "bucket sizes {sizes:?}");
        assert!(status.unassigned.is_empty());
    }

    #[tokio::test]
    async fn select_rejects_full_bucket() {
        let state = test_state();
        let room_id = room_with_players(&state, 4).await;
        let room = load_room(&state, &room_id).await.unwrap();
        let devices: Vec<String> = room
            .players
            .iter()
            .map(|player| player.device_id.clone())
            .collect();

        // Ceiling is 2 per team for 4 players over 2 teams.
        select_team(&state, &room_id, &devices[0], "A", 2).await.unwrap();
        select_team(&state, &room_id, &devices[1], "A", 2).await.unwrap();
        let err = select_team(&state, &room_id, &devices[2], "A", 2)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn select_rejects_unknown_tag() {
        let state = test_state();
        let room_id = room_with_players(&state, 4).await;
        let room = load_room(&state, &room_id).await.unwrap();
        let device = room.players[0].device_id.clone();

        let err = select_team(&state, &room_id, &device, "Z", 2)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn reset_clears_tags() {
        let state = test_state();
        let room_id = room_with_players(&state, 4).await;
        assign_random(&state, &room_id, 2).await.unwrap();

        reset_teams(&state, &room_id, 2).await.unwrap();

        let room = load_room(&state, &room_id).await.unwrap();
        assert!(room.players.iter().all(|player| player.team.is_none()));
    }
}
