//! Liar: one hidden player must bluff through round-robin explanations of a
//! keyword they never saw.

use indexmap::IndexMap;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::GamePhase;

pub const MIN_PLAYERS: usize = 3;
/// Pause before the second explanation round starts.
pub const SECOND_ROUND_DELAY_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum LiarPhase {
    RoleReveal,
    Explanation,
    VoteMoreRound,
    Pointing,
    PointingVote,
    PointingResult,
    LiarGuess,
    GameEnd,
}

impl GamePhase for LiarPhase {
    fn duration_secs(self) -> u64 {
        match self {
            LiarPhase::RoleReveal => 30,
            LiarPhase::Explanation => 20,
            LiarPhase::VoteMoreRound => 15,
            LiarPhase::Pointing => 0,
            LiarPhase::PointingVote => 30,
            LiarPhase::PointingResult => 5,
            LiarPhase::LiarGuess => 30,
            LiarPhase::GameEnd => 0,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            LiarPhase::RoleReveal => "roleReveal",
            LiarPhase::Explanation => "explanation",
            LiarPhase::VoteMoreRound => "voteMoreRound",
            LiarPhase::Pointing => "pointing",
            LiarPhase::PointingVote => "pointingVote",
            LiarPhase::PointingResult => "pointingResult",
            LiarPhase::LiarGuess => "liarGuess",
            LiarPhase::GameEnd => "gameEnd",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LiarWinner {
    Liar,
    Citizen,
}

/// Game state persisted under `room:{id}:liar:state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiarState {
    pub phase: LiarPhase,
    pub keyword: String,
    pub category_name: String,
    pub liar_device_id: String,
    /// Shuffled device ids; speakers take turns in this order.
    pub explanation_order: Vec<String>,
    pub current_explainer_index: usize,
    pub round_count: u32,
    /// Device id -> wants another explanation round.
    pub more_round_votes: IndexMap<String, bool>,
    /// Voter device id -> pointed device id.
    pub pointing_votes: IndexMap<String, String>,
    pub pointed_device_id: Option<String>,
    pub liar_guess: Option<String>,
    pub winner: Option<LiarWinner>,
}

impl LiarState {
    pub fn new(
        keyword: String,
        category_name: String,
        liar_device_id: String,
        mut device_ids: Vec<String>,
    ) -> Self {
        device_ids.shuffle(&mut rand::rng());
        Self {
            phase: LiarPhase::RoleReveal,
            keyword,
            category_name,
            liar_device_id,
            explanation_order: device_ids,
            current_explainer_index: 0,
            round_count: 1,
            more_round_votes: IndexMap::new(),
            pointing_votes: IndexMap::new(),
            pointed_device_id: None,
            liar_guess: None,
            winner: None,
        }
    }

    pub fn current_explainer(&self) -> Option<&String> {
        self.explanation_order.get(self.current_explainer_index)
    }

    /// Tally of the more-round vote as (more, stop).
    pub fn more_round_tally(&self) -> (usize, usize) {
        let more = self.more_round_votes.values().filter(|v| **v).count();
        (more, self.more_round_votes.len() - more)
    }
}

/// Plurality target of the pointing vote, ties broken at random.
pub fn pointed_target(votes: &IndexMap<String, String>) -> Option<String> {
    let mut tally: IndexMap<String, usize> = IndexMap::new();
    for target in votes.values() {
        *tally.entry(target.clone()).or_default() += 1;
    }
    let max = tally.values().copied().max()?;
    let leaders: Vec<&String> = tally
        .iter()
        .filter(|(_, count)| **count == max)
        .map(|(target, _)| target)
        .collect();
    leaders.choose(&mut rand::rng()).map(|s| (*s).clone())
}

/// A guess matches when it equals the keyword after trimming and
/// lowercasing both sides.
pub fn guess_matches(guess: &str, keyword: &str) -> bool {
    guess.trim().to_lowercase() == keyword.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn votes(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(voter, target)| (voter.to_string(), target.to_string()))
            .collect()
    }

    #[test]
    fn guess_matching_ignores_case_and_whitespace() {
        assert!(guess_matches(" 사자 ", "사자"));
        assert!(guess_matches("Lion", "lion"));
        assert!(!guess_matches("호랑이", "사자"));
    }

    #[test]
    fn pointed_target_is_plurality_winner() {
        let votes = votes(&[("v1", "a"), ("v2", "a"), ("v3", "b")]);
        assert_eq!(pointed_target(&votes), Some("a".to_string()));
    }

    #[test]
    fn pointed_target_tie_stays_within_leaders() {
        let votes = votes(&[("v1", "a"), ("v2", "b")]);
        let picked = pointed_target(&votes).expect("someone is pointed");
        assert!(picked == "a" || picked == "b");
    }

    #[test]
    fn no_votes_points_nobody() {
        assert_eq!(pointed_target(&IndexMap::new()), None);
    }

    #[test]
    fn state_shuffles_order_but_keeps_everyone() {
        let devices: Vec<String> = (0..6).map(|i| format!("d{i}")).collect();
        let state = LiarState::new("사자".into(), "동물".into(), "d0".into(), devices.clone());
        assert_eq!(state.explanation_order.len(), devices.len());
        for device in &devices {
            assert!(state.explanation_order.contains(device));
        }
        assert!(state.explanation_order.contains(&state.liar_device_id));
    }

    #[test]
    fn more_round_tally_splits_votes() {
        let mut state = LiarState::new("사자".into(), "동물".into(), "d0".into(), vec![]);
        state.more_round_votes.insert("d0".into(), true);
        state.more_round_votes.insert("d1".into(), true);
        state.more_round_votes.insert("d2".into(), false);
        assert_eq!(state.more_round_tally(), (2, 1));
    }
}
