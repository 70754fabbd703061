//! Marble: a 28-cell board game. Teams or players roll a die and move
//! modulo the board; two fixed cells pour and drink the uiriju, the rest
//! carry penalties voted in by the room.

use indexmap::IndexMap;
use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const BOARD_SIZE: usize = 28;
pub const START_INDEX: usize = 0;
pub const UIRIJU_FILL_INDEX: usize = 7;
pub const UIRIJU_DRINK_INDEX: usize = 21;
/// Penalties voted onto the board; one more than the 25 penalty cells so
/// each shuffle leaves one out.
pub const SELECTED_PENALTY_COUNT: usize = 26;
pub const MAX_PENALTIES_PER_DEVICE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum CellKind {
    Start,
    UirijuFill,
    UirijuDrink,
    Penalty,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoardCell {
    pub kind: CellKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MarbleMode {
    Team,
    Solo,
}

/// One submitted penalty, stored in the `…:marble:penalties` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyEntry {
    pub penalty_id: String,
    pub device_id: String,
    pub text: String,
}

/// Game state persisted under `room:{id}:marble:state`. Position keys are
/// team tags in team mode and device ids in solo mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarbleState {
    pub mode: MarbleMode,
    pub board: Vec<BoardCell>,
    pub positions: IndexMap<String, usize>,
    pub turn_order: Vec<String>,
    pub turn_index: usize,
    pub last_dice: Option<u8>,
}

impl MarbleState {
    pub fn current_turn(&self) -> Option<&String> {
        self.turn_order.get(self.turn_index)
    }

    /// Advance to the next turn holder, wrapping around.
    pub fn advance_turn(&mut self) {
        if !self.turn_order.is_empty() {
            self.turn_index = (self.turn_index + 1) % self.turn_order.len();
        }
    }
}

/// Roll a die face uniformly in 1..=6.
pub fn roll_dice() -> u8 {
    rand::rng().random_range(1..=6)
}

/// Rank submitted penalties by vote count (descending, random ties) and take
/// the top 26, backfilling first from the catalog penalty pool and then from
/// the built-in defaults.
pub fn select_penalties(
    submitted: &[PenaltyEntry],
    votes: &IndexMap<String, Vec<String>>,
    catalog_pool: Vec<String>,
) -> Vec<String> {
    let mut ranked: Vec<(usize, &PenaltyEntry)> = submitted
        .iter()
        .map(|entry| {
            let count = votes
                .get(&entry.penalty_id)
                .map(|voters| voters.len())
                .unwrap_or(0);
            (count, entry)
        })
        .collect();
    ranked.shuffle(&mut rand::rng());
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    let mut selected: Vec<String> = ranked
        .into_iter()
        .take(SELECTED_PENALTY_COUNT)
        .map(|(_, entry)| entry.text.clone())
        .collect();

    let mut pool = catalog_pool;
    pool.shuffle(&mut rand::rng());
    let mut fallback = default_penalties();
    fallback.shuffle(&mut rand::rng());
    let mut backfill = pool.into_iter().chain(fallback);
    while selected.len() < SELECTED_PENALTY_COUNT {
        match backfill.next() {
            Some(text) if !selected.contains(&text) => selected.push(text),
            Some(_) => continue,
            None => break,
        }
    }
    selected
}

/// Build the 28-cell board from a fresh shuffle of the selected penalties.
/// Cells 0, 7, 21 carry the fixed labels; the other 25 take penalty texts.
pub fn generate_board(selected: &[String]) -> Vec<BoardCell> {
    let mut shuffled = selected.to_vec();
    shuffled.shuffle(&mut rand::rng());
    let mut penalties = shuffled.into_iter();

    (0..BOARD_SIZE)
        .map(|index| match index {
            START_INDEX => BoardCell {
                kind: CellKind::Start,
                text: "출발".to_string(),
            },
            UIRIJU_FILL_INDEX => BoardCell {
                kind: CellKind::UirijuFill,
                text: "의리주 만들기".to_string(),
            },
            UIRIJU_DRINK_INDEX => BoardCell {
                kind: CellKind::UirijuDrink,
                text: "의리주 마시기".to_string(),
            },
            _ => BoardCell {
                kind: CellKind::Penalty,
                text: penalties.next().unwrap_or_default(),
            },
        })
        .collect()
}

/// Built-in penalty pool used when submissions and catalog both run dry.
pub fn default_penalties() -> Vec<String> {
    [
        "소주 원샷하기",
        "옆 사람과 러브샷하기",
        "아재개그 하나 치기",
        "애교 3단 콤보 보여주기",
        "1분 동안 존댓말 금지",
        "다 같이 건배 제의하기",
        "첫사랑 이야기 털어놓기",
        "핸드폰 최근 사진 공개하기",
        "성대모사 하나 하기",
        "랜덤 댄스 15초 추기",
        "옆 사람 칭찬 세 가지 하기",
        "물 한 컵 원샷하기",
        "윙크하며 자기소개하기",
        "상남자 포즈 취하기",
        "노래 한 소절 부르기",
        "오늘 제일 웃긴 사람과 러브샷",
        "왼손으로 다음 잔 따르기",
        "테이블 한 바퀴 하이파이브",
        "3분 동안 리액션 두 배로 하기",
        "제일 최근 통화 내역 공개하기",
        "벌칙 면제권",
        "혀 짧은 말로 자기소개하기",
        "소맥 말아서 마시기",
        "다음 게임까지 팔짱 끼고 있기",
        "단체사진에서 몸개그 담당하기",
        "옆 사람이 시키는 표정 따라하기",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, text: &str) -> PenaltyEntry {
        PenaltyEntry {
            penalty_id: id.to_string(),
            device_id: "d".to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn board_has_fixed_cells_and_25_penalties() {
        let selected: Vec<String> = (0..SELECTED_PENALTY_COUNT)
            .map(|i| format!("벌칙 {i}"))
            .collect();
        let board = generate_board(&selected);

        assert_eq!(board.len(), BOARD_SIZE);
        assert_eq!(board[START_INDEX].kind, CellKind::Start);
        assert_eq!(board[UIRIJU_FILL_INDEX].kind, CellKind::UirijuFill);
        assert_eq!(board[UIRIJU_DRINK_INDEX].kind, CellKind::UirijuDrink);

        let penalty_cells: Vec<&BoardCell> = board
            .iter()
            .filter(|cell| cell.kind == CellKind::Penalty)
            .collect();
        assert_eq!(penalty_cells.len(), BOARD_SIZE - 3);
        for cell in penalty_cells {
            assert!(selected.contains(&cell.text));
        }
    }

    #[test]
    fn selection_ranks_by_vote_count() {
        let submitted = vec![entry("p0", "a"), entry("p1", "b"), entry("p2", "c")];
        let mut votes: IndexMap<String, Vec<String>> = IndexMap::new();
        votes.insert("p1".into(), vec!["d1".into(), "d2".into()]);
        votes.insert("p2".into(), vec!["d1".into()]);

        let selected = select_penalties(&submitted, &votes, Vec::new());
        assert_eq!(selected[0], "b");
        assert_eq!(selected[1], "c");
        assert_eq!(selected[2], "a");
        assert_eq!(selected.len(), SELECTED_PENALTY_COUNT);
    }

    #[test]
    fn selection_backfills_from_catalog_before_defaults() {
        let submitted = vec![entry("p0", "직접 낸 벌칙")];
        let catalog: Vec<String> = (0..30).map(|i| format!("카탈로그 {i}")).collect();
        let selected = select_penalties(&submitted, &IndexMap::new(), catalog);

        assert_eq!(selected.len(), SELECTED_PENALTY_COUNT);
        assert_eq!(selected[0], "직접 낸 벌칙");
        assert!(selected[1..].iter().all(|text| text.starts_with("카탈로그")));
    }

    #[test]
    fn selection_falls_back_to_defaults_when_catalog_empty() {
        let selected = select_penalties(&[], &IndexMap::new(), Vec::new());
        assert_eq!(selected.len(), SELECTED_PENALTY_COUNT);
    }

    #[test]
    fn default_pool_covers_a_full_selection() {
        assert!(default_penalties().len() >= SELECTED_PENALTY_COUNT);
    }

    #[test]
    fn turn_advances_modulo_order() {
        let mut state = MarbleState {
            mode: MarbleMode::Team,
            board: Vec::new(),
            positions: IndexMap::new(),
            turn_order: vec!["A".into(), "B".into()],
            turn_index: 0,
            last_dice: None,
        };
        state.advance_turn();
        assert_eq!(state.current_turn(), Some(&"B".to_string()));
        state.advance_turn();
        assert_eq!(state.current_turn(), Some(&"A".to_string()));
    }

    #[test]
    fn dice_faces_stay_in_range() {
        for _ in 0..200 {
            let face = roll_dice();
            assert!((1..=6).contains(&face));
        }
    }
}
