//! Mafia: social deduction with server-enforced deadlines and strict
//! information partitioning (roles are private, mafia chat is mafia-only).

use indexmap::IndexMap;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::GamePhase;

/// Minimum roster size for a round.
pub const MIN_PLAYERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MafiaRole {
    Mafia,
    Doctor,
    Police,
    Civilian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MafiaWinner {
    Mafia,
    Citizen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum MafiaPhase {
    Night,
    DayAnnouncement,
    DayDiscussion,
    Vote,
    VoteResult,
    FinalDefense,
    FinalVote,
    FinalVoteResult,
    GameEnd,
}

impl GamePhase for MafiaPhase {
    fn duration_secs(self) -> u64 {
        match self {
            MafiaPhase::Night => 30,
            MafiaPhase::DayAnnouncement => 10,
            MafiaPhase::DayDiscussion => 240,
            MafiaPhase::Vote => 60,
            MafiaPhase::VoteResult => 5,
            MafiaPhase::FinalDefense => 30,
            MafiaPhase::FinalVote => 30,
            MafiaPhase::FinalVoteResult => 5,
            MafiaPhase::GameEnd => 0,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            MafiaPhase::Night => "night",
            MafiaPhase::DayAnnouncement => "dayAnnouncement",
            MafiaPhase::DayDiscussion => "dayDiscussion",
            MafiaPhase::Vote => "vote",
            MafiaPhase::VoteResult => "voteResult",
            MafiaPhase::FinalDefense => "finalDefense",
            MafiaPhase::FinalVote => "finalVote",
            MafiaPhase::FinalVoteResult => "finalVoteResult",
            MafiaPhase::GameEnd => "gameEnd",
        }
    }
}

/// Game state persisted under `room:{id}:state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MafiaState {
    pub phase: MafiaPhase,
    pub timer_sec: u64,
    pub day_count: u32,
    pub mafia_target: Option<String>,
    pub doctor_target: Option<String>,
    pub police_target: Option<String>,
    /// Day vote, last write wins per voter.
    pub votes: IndexMap<String, String>,
    /// Final vote, `true` = kill.
    pub final_votes: IndexMap<String, bool>,
    pub execution_target: Option<String>,
    pub last_night_killed: Option<String>,
    pub was_saved: bool,
    pub dead_players: Vec<String>,
    pub winner: Option<MafiaWinner>,
}

impl MafiaState {
    pub fn new() -> Self {
        Self {
            phase: MafiaPhase::Night,
            timer_sec: MafiaPhase::Night.duration_secs(),
            day_count: 1,
            mafia_target: None,
            doctor_target: None,
            police_target: None,
            votes: IndexMap::new(),
            final_votes: IndexMap::new(),
            execution_target: None,
            last_night_killed: None,
            was_saved: false,
            dead_players: Vec::new(),
            winner: None,
        }
    }

    /// Reset per-night bookkeeping when a new night begins.
    pub fn begin_night(&mut self) {
        self.phase = MafiaPhase::Night;
        self.timer_sec = MafiaPhase::Night.duration_secs();
        self.day_count += 1;
        self.mafia_target = None;
        self.doctor_target = None;
        self.police_target = None;
        self.votes.clear();
        self.final_votes.clear();
        self.execution_target = None;
        self.last_night_killed = None;
        self.was_saved = false;
    }
}

impl Default for MafiaState {
    fn default() -> Self {
        Self::new()
    }
}

/// Role head-counts for a roster of `n` players.
pub fn role_counts(n: usize) -> (usize, usize, usize) {
    let mafia = if n <= 5 {
        1
    } else if n <= 8 {
        2
    } else {
        3
    };
    let doctor = usize::from(n >= 6);
    let police = usize::from(n >= 7);
    (mafia, doctor, police)
}

/// Shuffled role assignment for `n` players.
pub fn distribute_roles(n: usize) -> Vec<MafiaRole> {
    let (mafia, doctor, police) = role_counts(n);
    let mut roles = Vec::with_capacity(n);
    roles.extend(std::iter::repeat_n(MafiaRole::Mafia, mafia));
    roles.extend(std::iter::repeat_n(MafiaRole::Doctor, doctor));
    roles.extend(std::iter::repeat_n(MafiaRole::Police, police));
    roles.resize(n, MafiaRole::Civilian);
    roles.shuffle(&mut rand::rng());
    roles
}

/// Citizens win when no mafia are alive; mafia win when the living mafia
/// are at least as many as everyone else still alive.
pub fn check_winner<'a>(alive_roles: impl Iterator<Item = &'a MafiaRole>) -> Option<MafiaWinner> {
    let (mut mafia, mut others) = (0usize, 0usize);
    for role in alive_roles {
        if *role == MafiaRole::Mafia {
            mafia += 1;
        } else {
            others += 1;
        }
    }
    if mafia == 0 {
        Some(MafiaWinner::Citizen)
    } else if mafia >= others {
        Some(MafiaWinner::Mafia)
    } else {
        None
    }
}

/// Tally of the day vote: target -> ballot count, in first-vote order.
pub fn tally_votes(votes: &IndexMap<String, String>) -> IndexMap<String, usize> {
    let mut tally: IndexMap<String, usize> = IndexMap::new();
    for target in votes.values() {
        *tally.entry(target.clone()).or_default() += 1;
    }
    tally
}

/// Unique plurality winner of the day vote; a tie yields no execution.
pub fn unique_plurality(votes: &IndexMap<String, String>) -> Option<String> {
    let tally = tally_votes(votes);
    let max = tally.values().copied().max()?;
    let mut leaders = tally
        .iter()
        .filter(|(_, count)| **count == max)
        .map(|(target, _)| target);
    let leader = leaders.next()?;
    if leaders.next().is_some() {
        None
    } else {
        Some(leader.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_counts_match_roster_brackets() {
        for n in 4..=20 {
            let (mafia, doctor, police) = role_counts(n);
            let expected_mafia = if n <= 5 {
                1
            } else if n <= 8 {
                2
            } else {
                3
            };
            assert_eq!(mafia, expected_mafia, "mafia for n={n}");
            assert_eq!(doctor, usize::from(n >= 6), "doctor for n={n}");
            assert_eq!(police, usize::from(n >= 7), "police for n={n}");

            let roles = distribute_roles(n);
            assert_eq!(roles.len(), n);
            let civilians = roles
                .iter()
                .filter(|role| **role == MafiaRole::Civilian)
                .count();
            assert_eq!(civilians, n - mafia - doctor - police);
        }
    }

    #[test]
    fn seven_players_get_two_mafia_doctor_and_police() {
        assert_eq!(role_counts(7), (2, 1, 1));
    }

    #[test]
    fn no_living_mafia_means_citizen_win() {
        let alive = [MafiaRole::Civilian, MafiaRole::Doctor];
        assert_eq!(check_winner(alive.iter()), Some(MafiaWinner::Citizen));
    }

    #[test]
    fn mafia_parity_means_mafia_win() {
        let alive = [MafiaRole::Mafia, MafiaRole::Civilian];
        assert_eq!(check_winner(alive.iter()), Some(MafiaWinner::Mafia));
    }

    #[test]
    fn ongoing_game_has_no_winner() {
        let alive = [
            MafiaRole::Mafia,
            MafiaRole::Civilian,
            MafiaRole::Civilian,
            MafiaRole::Police,
        ];
        assert_eq!(check_winner(alive.iter()), None);
    }

    #[test]
    fn plurality_picks_unique_leader() {
        let mut votes = IndexMap::new();
        votes.insert("v1".to_string(), "a".to_string());
        votes.insert("v2".to_string(), "b".to_string());
        votes.insert("v3".to_string(), "a".to_string());
        assert_eq!(unique_plurality(&votes), Some("a".to_string()));
    }

    #[test]
    fn tied_plurality_yields_no_execution() {
        let mut votes = IndexMap::new();
        votes.insert("v1".to_string(), "a".to_string());
        votes.insert("v2".to_string(), "b".to_string());
        assert_eq!(unique_plurality(&votes), None);
    }

    #[test]
    fn begin_night_clears_nightly_bookkeeping() {
        let mut state = MafiaState::new();
        state.mafia_target = Some("d1".into());
        state.execution_target = Some("d2".into());
        state.votes.insert("v".into(), "d1".into());
        state.begin_night();
        assert_eq!(state.day_count, 2);
        assert!(state.mafia_target.is_none());
        assert!(state.execution_target.is_none());
        assert!(state.votes.is_empty());
    }

    #[test]
    fn phase_durations_are_the_published_schedule() {
        assert_eq!(MafiaPhase::Night.duration_secs(), 30);
        assert_eq!(MafiaPhase::DayAnnouncement.duration_secs(), 10);
        assert_eq!(MafiaPhase::DayDiscussion.duration_secs(), 240);
        assert_eq!(MafiaPhase::Vote.duration_secs(), 60);
        assert_eq!(MafiaPhase::VoteResult.duration_secs(), 5);
        assert_eq!(MafiaPhase::FinalDefense.duration_secs(), 30);
        assert_eq!(MafiaPhase::FinalVote.duration_secs(), 30);
        assert_eq!(MafiaPhase::FinalVoteResult.duration_secs(), 5);
        assert_eq!(MafiaPhase::GameEnd.duration_secs(), 0);
    }
}
