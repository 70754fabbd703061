//! Game state machines: serializable state, phase enums, and the pure rules
//! of each protocol. Orchestration (store I/O, broadcasts, timers) lives in
//! the matching service modules.

pub mod liar;
pub mod marble;
pub mod mafia;
pub mod quiz;
pub mod truth;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The five supported game protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    Marble,
    Mafia,
    Liar,
    Quiz,
    Truth,
}

impl GameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GameKind::Marble => "marble",
            GameKind::Mafia => "mafia",
            GameKind::Liar => "liar",
            GameKind::Quiz => "quiz",
            GameKind::Truth => "truth",
        }
    }
}

/// Shared skeleton of the per-game phase enums: every phase knows its
/// countdown length. A zero duration means the phase is not timer-bound and
/// advances only through a host command or an action-completion predicate.
pub trait GamePhase: Copy {
    fn duration_secs(self) -> u64;
    fn as_str(self) -> &'static str;
}
