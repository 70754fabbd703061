//! Truth: one answerer faces a question while their phone streams
//! face-tracking samples; the server judges "lie" vs "truth" from the
//! aggregated channels. Detection is deterministic given its inputs.

use indexmap::IndexMap;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::GamePhase;

/// Fewer samples than this cannot support a verdict.
pub const MIN_SAMPLES: usize = 5;
/// Overall score at or above which the answer is called a lie.
pub const LIE_THRESHOLD: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum TruthPhase {
    SelectAnswerer,
    SubmitQuestions,
    SelectQuestion,
    Answering,
    Result,
}

impl GamePhase for TruthPhase {
    // Every phase is host- or action-driven; nothing is timer-bound.
    fn duration_secs(self) -> u64 {
        0
    }

    fn as_str(self) -> &'static str {
        match self {
            TruthPhase::SelectAnswerer => "selectAnswerer",
            TruthPhase::SubmitQuestions => "submitQuestions",
            TruthPhase::SelectQuestion => "selectQuestion",
            TruthPhase::Answering => "answering",
            TruthPhase::Result => "result",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedQuestion {
    pub device_id: String,
    pub text: String,
    pub is_used: bool,
}

/// Per-frame feature vector already computed by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FaceTrackingSample {
    pub eye_blink_rate: f64,
    pub eye_movement: f64,
    pub facial_tremor: f64,
    pub nostril_movement: f64,
    pub stress_level: f64,
    pub micro_expression: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChannelScores {
    pub blink: u32,
    pub eye: u32,
    pub tremor: u32,
    pub nostril: u32,
    pub volatility: u32,
    pub micro_expression: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LieAnalysis {
    pub is_lie: bool,
    /// Overall score in [0, 100].
    pub confidence: u32,
    pub comment: String,
    pub scores: Option<ChannelScores>,
}

/// Game state persisted under `room:{id}:truth:state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TruthState {
    pub phase: TruthPhase,
    pub round: u32,
    pub current_answerer: Option<String>,
    pub current_question: Option<SubmittedQuestion>,
    /// Questions collected during submitQuestions, before the snapshot.
    pub pending_questions: Vec<SubmittedQuestion>,
    pub submitted_questions: Vec<SubmittedQuestion>,
    /// Host reroll candidate awaiting confirmation.
    pub proposed_index: Option<usize>,
    pub face_tracking_data: Vec<FaceTrackingSample>,
    /// Voter device id -> toggled question indices.
    pub question_votes: IndexMap<String, Vec<usize>>,
    pub vote_done_devices: Vec<String>,
    pub last_result: Option<LieAnalysis>,
}

impl TruthState {
    pub fn new() -> Self {
        Self {
            phase: TruthPhase::SelectAnswerer,
            round: 1,
            current_answerer: None,
            current_question: None,
            pending_questions: Vec::new(),
            submitted_questions: Vec::new(),
            proposed_index: None,
            face_tracking_data: Vec::new(),
            question_votes: IndexMap::new(),
            vote_done_devices: Vec::new(),
            last_result: None,
        }
    }

    /// Reset per-round collections when a new answerer is chosen.
    pub fn begin_round(&mut self, answerer: String) {
        self.current_answerer = Some(answerer);
        self.current_question = None;
        self.pending_questions.clear();
        self.submitted_questions.clear();
        self.proposed_index = None;
        self.face_tracking_data.clear();
        self.question_votes.clear();
        self.vote_done_devices.clear();
        self.last_result = None;
        self.phase = TruthPhase::SubmitQuestions;
    }

    pub fn unused_question_indices(&self) -> Vec<usize> {
        self.submitted_questions
            .iter()
            .enumerate()
            .filter(|(_, question)| !question.is_used)
            .map(|(index, _)| index)
            .collect()
    }

    /// Toggle a question-index vote for a device.
    pub fn toggle_question_vote(&mut self, device_id: &str, index: usize) {
        let votes = self.question_votes.entry(device_id.to_string()).or_default();
        if let Some(position) = votes.iter().position(|i| *i == index) {
            votes.remove(position);
        } else {
            votes.push(index);
        }
    }

    /// Plurality winner of the question vote over unused questions, random
    /// tiebreak, random unused question when nobody voted.
    pub fn choose_question_by_votes(&self) -> Option<usize> {
        let unused = self.unused_question_indices();
        if unused.is_empty() {
            return None;
        }
        let mut tally: IndexMap<usize, usize> = IndexMap::new();
        for votes in self.question_votes.values() {
            for index in votes {
                if unused.contains(index) {
                    *tally.entry(*index).or_default() += 1;
                }
            }
        }
        if tally.is_empty() {
            return unused.choose(&mut rand::rng()).copied();
        }
        let max = tally.values().copied().max()?;
        let leaders: Vec<usize> = tally
            .iter()
            .filter(|(_, count)| **count == max)
            .map(|(index, _)| *index)
            .collect();
        leaders.choose(&mut rand::rng()).copied()
    }
}

impl Default for TruthState {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic lie detection over the collected samples.
pub fn analyze(samples: &[FaceTrackingSample]) -> LieAnalysis {
    if samples.is_empty() {
        return LieAnalysis {
            is_lie: false,
            confidence: 0,
            comment: "측정된 데이터가 없어요. 카메라를 확인해 주세요.".to_string(),
            scores: None,
        };
    }
    if samples.len() < MIN_SAMPLES {
        return LieAnalysis {
            is_lie: false,
            confidence: 0,
            comment: "데이터가 부족해서 판정할 수 없어요.".to_string(),
            scores: None,
        };
    }

    let blink_values: Vec<f64> = samples.iter().map(|s| s.eye_blink_rate).collect();
    let eye_values: Vec<f64> = samples.iter().map(|s| s.eye_movement).collect();
    let tremor_values: Vec<f64> = samples.iter().map(|s| s.facial_tremor).collect();
    let nostril_values: Vec<f64> = samples.iter().map(|s| s.nostril_movement).collect();

    let blink = channel_score(median(&blink_values) / 3.0 * 100.0);
    let eye = channel_score(median(&eye_values) * 300.0);
    let tremor = channel_score(median(&tremor_values) * 300.0);
    let nostril = channel_score(median(&nostril_values) * 300.0);

    let volatility = (clamp_f(std_dev(&blink_values) * 100.0, 0.0, 30.0)
        + clamp_f(std_dev(&eye_values) * 100.0, 0.0, 30.0)
        + clamp_f(std_dev(&tremor_values) * 50.0, 0.0, 20.0)
        + clamp_f(std_dev(&nostril_values) * 50.0, 0.0, 20.0))
    .round() as u32;

    let trend = stress_trend(samples);

    let nervous = samples
        .iter()
        .filter(|s| s.micro_expression.as_deref() == Some("nervous"))
        .count();
    let micro = ((nervous as f64 / samples.len() as f64) * 30.0).round() as u32;

    let base = (f64::from(blink) * 0.25
        + f64::from(eye) * 0.25
        + f64::from(tremor) * 0.15
        + f64::from(nostril) * 0.15
        + f64::from(volatility) * 0.2
        + trend * 0.1
        + f64::from(micro) * 0.1)
        .round() as u32;

    let strong_channels = [blink, eye, tremor, nostril]
        .iter()
        .filter(|score| **score >= 50)
        .count();
    let bonus = match strong_channels {
        count if count >= 3 => 15,
        2 => 10,
        _ => 0,
    };

    let overall = (base + bonus).min(100);
    let scores = ChannelScores {
        blink,
        eye,
        tremor,
        nostril,
        volatility,
        micro_expression: micro,
    };

    LieAnalysis {
        is_lie: overall >= LIE_THRESHOLD,
        confidence: overall,
        comment: comment_for(overall, &scores),
        scores: Some(scores),
    }
}

fn channel_score(raw: f64) -> u32 {
    clamp_f(raw, 0.0, 100.0).round() as u32
}

fn clamp_f(value: f64, min: f64, max: f64) -> f64 {
    value.clamp(min, max)
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / n;
    variance.sqrt()
}

/// Rising stress across the answer: mean of the second half minus mean of
/// the first half, floored at zero.
fn stress_trend(samples: &[FaceTrackingSample]) -> f64 {
    let mid = samples.len() / 2;
    let first: Vec<f64> = samples[..mid].iter().map(|s| s.stress_level).collect();
    let second: Vec<f64> = samples[mid..].iter().map(|s| s.stress_level).collect();
    let mean = |values: &[f64]| values.iter().sum::<f64>() / values.len() as f64;
    (mean(&second) - mean(&first)).max(0.0)
}

fn comment_for(overall: u32, scores: &ChannelScores) -> String {
    let channel = dominant_channel(scores);
    match overall {
        80.. => format!("거짓말이 거의 확실해요! {channel} 반응을 숨기지 못했어요."),
        60..=79 => format!("수상한데요? {channel} 반응이 크게 흔들렸어요."),
        40..=59 => format!("긴장한 기색이 보여요. {channel} 반응이 평소와 달라요."),
        LIE_THRESHOLD..=39 => format!("살짝 흔들렸어요. {channel} 반응을 주목해 보세요."),
        _ => "진실을 말하는 것으로 보여요.".to_string(),
    }
}

fn dominant_channel(scores: &ChannelScores) -> &'static str {
    let ranked = [
        (scores.blink, "눈 깜빡임"),
        (scores.eye, "시선"),
        (scores.tremor, "얼굴 떨림"),
        (scores.nostril, "콧볼"),
    ];
    ranked
        .iter()
        .max_by_key(|(score, _)| *score)
        .map(|(_, name)| *name)
        .unwrap_or("표정")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(blink: f64, eye: f64, tremor: f64, nostril: f64, stress: f64) -> FaceTrackingSample {
        FaceTrackingSample {
            eye_blink_rate: blink,
            eye_movement: eye,
            facial_tremor: tremor,
            nostril_movement: nostril,
            stress_level: stress,
            micro_expression: None,
            timestamp: 0,
        }
    }

    #[test]
    fn empty_input_is_not_a_lie() {
        let result = analyze(&[]);
        assert!(!result.is_lie);
        assert_eq!(result.confidence, 0);
        assert!(result.scores.is_none());
    }

    #[test]
    fn too_few_samples_are_inconclusive() {
        let samples: Vec<_> = (0..4).map(|_| sample(1.0, 0.5, 0.5, 0.5, 50.0)).collect();
        let result = analyze(&samples);
        assert!(!result.is_lie);
        assert_eq!(result.confidence, 0);
    }

    #[test]
    fn analysis_is_deterministic() {
        let samples: Vec<_> = (0..10)
            .map(|i| sample(0.5, 0.03, 0.02, 0.01, f64::from(i)))
            .collect();
        assert_eq!(analyze(&samples), analyze(&samples));
    }

    #[test]
    fn all_zero_samples_stay_truthful() {
        let samples: Vec<_> = (0..10).map(|_| sample(0.0, 0.0, 0.0, 0.0, 0.0)).collect();
        let result = analyze(&samples);
        assert!(!result.is_lie);
        assert_eq!(result.confidence, 0);
    }

    #[test]
    fn calm_low_motion_samples_stay_below_threshold() {
        let samples: Vec<_> = (0..10)
            .map(|_| sample(0.0, 0.02, 0.02, 0.02, 0.0))
            .collect();
        let result = analyze(&samples);
        assert!(!result.is_lie);
        assert!(result.confidence < LIE_THRESHOLD);
    }

    #[test]
    fn elevated_eye_movement_tips_the_verdict() {
        let mut samples: Vec<_> = (0..5).map(|_| sample(0.0, 0.02, 0.02, 0.02, 0.0)).collect();
        samples.extend((0..5).map(|_| sample(0.0, 0.10, 0.02, 0.02, 0.0)));
        let result = analyze(&samples);
        assert!(result.is_lie);
        assert!(result.confidence >= LIE_THRESHOLD);
    }

    #[test]
    fn nervous_expressions_raise_the_score() {
        let calm: Vec<_> = (0..10).map(|_| sample(0.2, 0.02, 0.02, 0.02, 0.0)).collect();
        let mut nervous = calm.clone();
        for s in &mut nervous {
            s.micro_expression = Some("nervous".to_string());
        }
        assert!(analyze(&nervous).confidence > analyze(&calm).confidence);
    }

    #[test]
    fn rising_stress_raises_the_score() {
        let flat: Vec<_> = (0..10).map(|_| sample(0.2, 0.02, 0.02, 0.02, 10.0)).collect();
        let rising: Vec<_> = (0..10)
            .map(|i| sample(0.2, 0.02, 0.02, 0.02, if i < 5 { 10.0 } else { 60.0 }))
            .collect();
        assert!(analyze(&rising).confidence > analyze(&flat).confidence);
    }

    #[test]
    fn question_vote_toggle_adds_and_removes() {
        let mut state = TruthState::new();
        state.submitted_questions.push(SubmittedQuestion {
            device_id: "d1".into(),
            text: "q".into(),
            is_used: false,
        });
        state.toggle_question_vote("d2", 0);
        assert_eq!(state.question_votes["d2"], vec![0]);
        state.toggle_question_vote("d2", 0);
        assert!(state.question_votes["d2"].is_empty());
    }

    #[test]
    fn vote_choice_prefers_plurality_and_skips_used() {
        let mut state = TruthState::new();
        for i in 0..3 {
            state.submitted_questions.push(SubmittedQuestion {
                device_id: format!("d{i}"),
                text: format!("q{i}"),
                is_used: false,
            });
        }
        state.submitted_questions[0].is_used = true;
        state.toggle_question_vote("a", 0); // used, must be ignored
        state.toggle_question_vote("a", 1);
        state.toggle_question_vote("b", 1);
        state.toggle_question_vote("c", 2);
        assert_eq!(state.choose_question_by_votes(), Some(1));
    }

    #[test]
    fn vote_choice_falls_back_to_random_unused() {
        let mut state = TruthState::new();
        state.submitted_questions.push(SubmittedQuestion {
            device_id: "d1".into(),
            text: "q".into(),
            is_used: false,
        });
        assert_eq!(state.choose_question_by_votes(), Some(0));
    }

    #[test]
    fn begin_round_clears_previous_round_data() {
        let mut state = TruthState::new();
        state.face_tracking_data.push(sample(0.1, 0.1, 0.1, 0.1, 1.0));
        state.vote_done_devices.push("d1".into());
        state.begin_round("d2".into());
        assert!(state.face_tracking_data.is_empty());
        assert!(state.vote_done_devices.is_empty());
        assert_eq!(state.phase, TruthPhase::SubmitQuestions);
        assert_eq!(state.current_answerer.as_deref(), Some("d2"));
    }
}
