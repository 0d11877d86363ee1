//! Core data model for a verification run.
//!
//! Everything here is immutable once built. The runtime produces
//! `AnswerResult`s and `JudgmentResult`s; the synthesizer consumes them and
//! produces a `ConsensusResult`, which is assembled into a `VerdictPayload`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Text placed in a judgment cell when the judge never reported back.
///
/// Contains neither parser marker, so it always parses to the defaults.
pub const MISSING_JUDGMENT: &str = "judge did not return a judgment";

/// Errors raised while validating a question.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuestionError {
    #[error("question must not be empty")]
    Empty,
}

/// A trimmed, non-empty question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Question(String);

impl Question {
    /// Trim and validate a question.
    pub fn new(text: impl AsRef<str>) -> Result<Self, QuestionError> {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() {
            return Err(QuestionError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two answering-backend slots.
///
/// `A` is authoritative by convention when both answers are clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    A,
    B,
}

impl AnswerSource {
    pub const ALL: [AnswerSource; 2] = [AnswerSource::A, AnswerSource::B];
}

impl fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerSource::A => f.write_str("answer-a"),
            AnswerSource::B => f.write_str("answer-b"),
        }
    }
}

/// The two judging-backend slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeId {
    First,
    Second,
}

impl JudgeId {
    pub const ALL: [JudgeId; 2] = [JudgeId::First, JudgeId::Second];
}

impl fmt::Display for JudgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JudgeId::First => f.write_str("judge-1"),
            JudgeId::Second => f.write_str("judge-2"),
        }
    }
}

/// One answering backend's response to the question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    /// Which slot produced this answer
    pub source: AnswerSource,

    /// Display name of the backend behind the slot
    pub backend: String,

    /// The bare answer text, or a diagnostic when `succeeded` is false
    pub text: String,

    pub succeeded: bool,
}

impl AnswerResult {
    pub fn success(source: AnswerSource, backend: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source,
            backend: backend.into(),
            text: text.into(),
            succeeded: true,
        }
    }

    pub fn failure(
        source: AnswerSource,
        backend: impl Into<String>,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self {
            source,
            backend: backend.into(),
            text: diagnostic.into(),
            succeeded: false,
        }
    }

    /// Whether this answer can be handed to the judges.
    pub fn is_usable(&self) -> bool {
        self.succeeded && !self.text.trim().is_empty()
    }
}

/// Both candidate answers for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerPair {
    pub a: AnswerResult,
    pub b: AnswerResult,
}

impl AnswerPair {
    pub fn new(a: AnswerResult, b: AnswerResult) -> Self {
        Self { a, b }
    }

    pub fn get(&self, source: AnswerSource) -> &AnswerResult {
        match source {
            AnswerSource::A => &self.a,
            AnswerSource::B => &self.b,
        }
    }

    pub fn both_usable(&self) -> bool {
        self.a.is_usable() && self.b.is_usable()
    }
}

/// A single cell of the cross matrix: one judge reviewing one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgmentRequest {
    /// Answer text under review (no source label)
    pub target_answer: String,

    pub judge: JudgeId,

    /// Which answer this judgment is about
    pub about: AnswerSource,
}

impl JudgmentRequest {
    /// Build the 2x2 cross matrix: every answer reviewed by every judge.
    pub fn cross_matrix(answers: &AnswerPair) -> Vec<JudgmentRequest> {
        AnswerSource::ALL
            .iter()
            .flat_map(|&about| {
                JudgeId::ALL.iter().map(move |&judge| JudgmentRequest {
                    target_answer: answers.get(about).text.clone(),
                    judge,
                    about,
                })
            })
            .collect()
    }
}

/// One judge's raw verdict about one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgmentResult {
    pub judge: JudgeId,

    /// Which candidate answer was judged
    pub answer_source: AnswerSource,

    /// Raw judge output, or a diagnostic when `succeeded` is false
    pub raw_text: String,

    pub succeeded: bool,
}

impl JudgmentResult {
    pub fn success(judge: JudgeId, answer_source: AnswerSource, raw_text: impl Into<String>) -> Self {
        Self {
            judge,
            answer_source,
            raw_text: raw_text.into(),
            succeeded: true,
        }
    }

    pub fn failure(
        judge: JudgeId,
        answer_source: AnswerSource,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self {
            judge,
            answer_source,
            raw_text: diagnostic.into(),
            succeeded: false,
        }
    }

    /// Placeholder for a judge that never reported.
    pub fn missing(judge: JudgeId, answer_source: AnswerSource) -> Self {
        Self::failure(judge, answer_source, MISSING_JUDGMENT)
    }
}

/// The four judgments of a run, keyed by (answer, judge).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgmentMatrix {
    cells: BTreeMap<(AnswerSource, JudgeId), JudgmentResult>,
}

impl JudgmentMatrix {
    /// Collect judgments into the matrix.
    ///
    /// Absent cells are filled with [`JudgmentResult::missing`]. If a cell
    /// appears twice the later result wins.
    pub fn from_results(results: impl IntoIterator<Item = JudgmentResult>) -> Self {
        let mut cells: BTreeMap<_, _> = results
            .into_iter()
            .map(|r| ((r.answer_source, r.judge), r))
            .collect();

        for about in AnswerSource::ALL {
            for judge in JudgeId::ALL {
                cells
                    .entry((about, judge))
                    .or_insert_with(|| JudgmentResult::missing(judge, about));
            }
        }

        Self { cells }
    }

    pub fn get(&self, about: AnswerSource, judge: JudgeId) -> &JudgmentResult {
        // Every cell is populated by `from_results`.
        &self.cells[&(about, judge)]
    }

    /// Both judgments about one answer, first judge first.
    pub fn pair(&self, about: AnswerSource) -> (&JudgmentResult, &JudgmentResult) {
        (self.get(about, JudgeId::First), self.get(about, JudgeId::Second))
    }

    pub fn iter(&self) -> impl Iterator<Item = &JudgmentResult> {
        self.cells.values()
    }
}

/// Structured fields extracted from a judge's response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedVerdict {
    pub error_tag: String,
    pub conclusion: String,
}

/// How far the cross-judged answers support trusting the fused answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredibilityTier {
    High,
    Medium,
    Low,
}

impl fmt::Display for CredibilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredibilityTier::High => f.write_str("High"),
            CredibilityTier::Medium => f.write_str("Medium"),
            CredibilityTier::Low => f.write_str("Low"),
        }
    }
}

/// What the judges concluded about one answer after the consistency gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerAssessment {
    pub source: AnswerSource,

    /// Agreed error tag, or the no-error sentinel when the judges disagreed
    pub final_error: String,

    /// Judge-extracted core conclusion for this answer
    pub conclusion: String,

    /// Whether the two judges of this answer were consistent
    pub judges_agree: bool,
}

/// Terminal output of consensus fusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub tier: CredibilityTier,
    pub direct_answer: String,
    pub analysis_text: String,

    /// Per answer: one judgment if its judges agreed, else both
    pub judgment_display: BTreeMap<AnswerSource, String>,

    pub assessments: Vec<AnswerAssessment>,
}

impl ConsensusResult {
    pub fn assessment(&self, source: AnswerSource) -> Option<&AnswerAssessment> {
        self.assessments.iter().find(|a| a.source == source)
    }
}

/// The four pipeline phases reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Answering,
    Judging,
    Fusing,
}

impl Phase {
    /// 1-based position in the pipeline.
    pub fn index(self) -> u8 {
        match self {
            Phase::Init => 1,
            Phase::Answering => 2,
            Phase::Judging => 3,
            Phase::Fusing => 4,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Phase::Init => "Preparing backends for verification",
            Phase::Answering => "Answer phase finished",
            Phase::Judging => "Cross-judging both answers with both judges",
            Phase::Fusing => "Fusing judgments into the final verdict",
        }
    }

    pub fn progress(self) -> ProgressUpdate {
        ProgressUpdate {
            phase_index: self.index(),
            message: self.message().to_string(),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Init => f.write_str("init"),
            Phase::Answering => f.write_str("answering"),
            Phase::Judging => f.write_str("judging"),
            Phase::Fusing => f.write_str("fusing"),
        }
    }
}

/// Lifecycle of one verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Answering,
    Judging,
    Fusing,
    Done,
    Failed,
}

impl RunState {
    /// Whether `next` is a legal successor of this state.
    pub fn can_advance_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Init, RunState::Answering)
                | (RunState::Init, RunState::Failed)
                | (RunState::Answering, RunState::Judging)
                | (RunState::Answering, RunState::Failed)
                | (RunState::Judging, RunState::Fusing)
                | (RunState::Fusing, RunState::Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

/// Informational progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// 1..=4
    pub phase_index: u8,
    pub message: String,
}

/// One backend's section of the verdict detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSection {
    pub source: AnswerSource,
    pub backend: String,
    pub answer_text: String,
    pub judgment_display: String,
}

/// Final verdict handed to the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictPayload {
    pub question: String,
    pub credibility_tier: CredibilityTier,
    pub direct_answer: String,
    pub analysis_text: String,

    /// Answer A's section, then answer B's
    pub answers: [BackendSection; 2],

    pub completed_at: DateTime<Utc>,
}

impl VerdictPayload {
    /// Combine the answers and the consensus into the payload.
    pub fn assemble(question: &Question, answers: &AnswerPair, consensus: &ConsensusResult) -> Self {
        let section = |source: AnswerSource| {
            let answer = answers.get(source);
            BackendSection {
                source,
                backend: answer.backend.clone(),
                answer_text: answer.text.clone(),
                judgment_display: consensus
                    .judgment_display
                    .get(&source)
                    .cloned()
                    .unwrap_or_default(),
            }
        };

        Self {
            question: question.as_str().to_string(),
            credibility_tier: consensus.tier,
            direct_answer: consensus.direct_answer.clone(),
            analysis_text: consensus.analysis_text.clone(),
            answers: [section(AnswerSource::A), section(AnswerSource::B)],
            completed_at: Utc::now(),
        }
    }

    pub fn section(&self, source: AnswerSource) -> &BackendSection {
        match source {
            AnswerSource::A => &self.answers[0],
            AnswerSource::B => &self.answers[1],
        }
    }
}
