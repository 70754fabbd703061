//! Quiz: speed charades. Teams take turns; the host marks each word correct
//! or passed until the round timer runs out.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::GamePhase;

/// Words drawn per round.
pub const WORDS_PER_ROUND: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum QuizPhase {
    Waiting,
    Playing,
    RoundEnd,
    Finished,
}

impl GamePhase for QuizPhase {
    // Rounds are timed by the configurable round length, not a fixed
    // per-phase schedule.
    fn duration_secs(self) -> u64 {
        0
    }

    fn as_str(self) -> &'static str {
        match self {
            QuizPhase::Waiting => "waiting",
            QuizPhase::Playing => "playing",
            QuizPhase::RoundEnd => "roundEnd",
            QuizPhase::Finished => "finished",
        }
    }
}

/// Game state persisted under `room:{id}:quiz:state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizState {
    pub teams: Vec<String>,
    pub current_team_index: usize,
    pub category_id: u32,
    pub round_time_seconds: u64,
    pub remaining_time: u64,
    pub team_scores: IndexMap<String, u32>,
    pub completed_teams: Vec<String>,
    pub phase: QuizPhase,
    pub current_word: Option<String>,
    pub remaining_words: Vec<String>,
    pub current_round_score: u32,
}

impl QuizState {
    pub fn new(
        teams: Vec<String>,
        category_id: u32,
        round_time_seconds: u64,
        mut words: Vec<String>,
    ) -> Self {
        let team_scores = teams.iter().map(|team| (team.clone(), 0)).collect();
        let current_word = if words.is_empty() {
            None
        } else {
            Some(words.remove(0))
        };
        Self {
            teams,
            current_team_index: 0,
            category_id,
            round_time_seconds,
            remaining_time: round_time_seconds,
            team_scores,
            completed_teams: Vec::new(),
            phase: QuizPhase::Waiting,
            current_word,
            remaining_words: words,
            current_round_score: 0,
        }
    }

    pub fn current_team(&self) -> Option<&String> {
        self.teams.get(self.current_team_index)
    }

    /// Score the current word; returns `false` when the word pool ran dry
    /// and the round must end.
    pub fn mark_correct(&mut self) -> bool {
        self.current_round_score += 1;
        if self.remaining_words.is_empty() {
            self.current_word = None;
            false
        } else {
            self.current_word = Some(self.remaining_words.remove(0));
            true
        }
    }

    /// Push the current word to the tail and show the next one. With a
    /// single word left there is nothing to rotate.
    pub fn mark_pass(&mut self) {
        if self.remaining_words.is_empty() {
            return;
        }
        if let Some(current) = self.current_word.take() {
            self.remaining_words.push(current);
        }
        self.current_word = Some(self.remaining_words.remove(0));
    }

    /// Record the round for the current team and clear the word state.
    pub fn finish_round(&mut self) {
        if let Some(team) = self.current_team().cloned() {
            self.team_scores
                .insert(team.clone(), self.current_round_score);
            if !self.completed_teams.contains(&team) {
                self.completed_teams.push(team);
            }
        }
        self.phase = QuizPhase::RoundEnd;
        self.remaining_time = 0;
        self.current_word = None;
        self.remaining_words.clear();
    }

    /// Advance to the next team that has not played yet, wrapping around.
    /// Returns `false` when every team is done.
    pub fn advance_team(&mut self) -> bool {
        let total = self.teams.len();
        for offset in 1..=total {
            let index = (self.current_team_index + offset) % total;
            if !self.completed_teams.contains(&self.teams[index]) {
                self.current_team_index = index;
                self.phase = QuizPhase::Waiting;
                return true;
            }
        }
        self.phase = QuizPhase::Finished;
        false
    }

    /// Stable ranking by score descending.
    pub fn ranking(&self) -> Vec<(String, u32)> {
        let mut rows: Vec<(String, u32)> = self
            .team_scores
            .iter()
            .map(|(team, score)| (team.clone(), *score))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows
    }

    pub fn is_complete(&self) -> bool {
        self.completed_teams.len() == self.teams.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_words(words: &[&str]) -> QuizState {
        QuizState::new(
            vec!["A".into(), "B".into()],
            1,
            120,
            words.iter().map(|w| w.to_string()).collect(),
        )
    }

    #[test]
    fn pass_then_correct_walks_the_queue() {
        // Round starts with W1 current and [W2, W3] remaining.
        let mut state = state_with_words(&["W1", "W2", "W3"]);
        state.phase = QuizPhase::Playing;

        state.mark_pass();
        assert_eq!(state.current_word.as_deref(), Some("W2"));
        assert_eq!(state.remaining_words, vec!["W3", "W1"]);

        assert!(state.mark_correct());
        assert_eq!(state.current_round_score, 1);
        assert_eq!(state.current_word.as_deref(), Some("W3"));
        assert_eq!(state.remaining_words, vec!["W1"]);
    }

    #[test]
    fn pass_with_single_word_keeps_it_current() {
        let mut state = state_with_words(&["W1"]);
        state.mark_pass();
        assert_eq!(state.current_word.as_deref(), Some("W1"));
    }

    #[test]
    fn exhausting_words_signals_round_end() {
        let mut state = state_with_words(&["W1"]);
        assert!(!state.mark_correct());
        assert_eq!(state.current_round_score, 1);
        assert!(state.current_word.is_none());
    }

    #[test]
    fn finish_round_records_score_and_completion() {
        let mut state = state_with_words(&["W1", "W2"]);
        state.current_round_score = 3;
        state.finish_round();
        assert_eq!(state.team_scores["A"], 3);
        assert_eq!(state.completed_teams, vec!["A".to_string()]);
        assert_eq!(state.phase, QuizPhase::RoundEnd);
        assert!(state.current_word.is_none());
        assert!(state.remaining_words.is_empty());
    }

    #[test]
    fn advance_team_skips_completed_and_finishes() {
        let mut state = state_with_words(&["W1"]);
        state.finish_round();
        assert!(state.advance_team());
        assert_eq!(state.current_team(), Some(&"B".to_string()));

        state.current_round_score = 2;
        state.finish_round();
        assert!(!state.advance_team());
        assert_eq!(state.phase, QuizPhase::Finished);
        assert!(state.is_complete());
    }

    #[test]
    fn ranking_is_stable_on_ties() {
        let mut state = QuizState::new(
            vec!["A".into(), "B".into(), "C".into()],
            1,
            120,
            Vec::new(),
        );
        state.team_scores.insert("A".into(), 2);
        state.team_scores.insert("B".into(), 5);
        state.team_scores.insert("C".into(), 2);
        assert_eq!(
            state.ranking(),
            vec![
                ("B".to_string(), 5),
                ("A".to_string(), 2),
                ("C".to_string(), 2)
            ]
        );
    }
}
