//! # crosscheck-core
//!
//! Deterministic half of crosscheck: turns two candidate answers and four
//! cross-matrix judgments into a credibility verdict.
//!
//! This crate answers:
//! - What did each judge actually say? ([`verdict::parse`])
//! - Do the two judges of one answer agree? ([`consistency::is_consistent`])
//! - How far can the fused answer be trusted? ([`Synthesizer`])
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: fusion is a pure function of its inputs
//! 2. **No I/O**: backend calls live in `crosscheck-runtime`
//! 3. **Never fails on bad judge output**: malformed text degrades to
//!    "no error found" / "no valid conclusion"
//!
//! ## Example
//!
//! ```rust
//! use crosscheck_core::{
//!     AnswerPair, AnswerResult, AnswerSource, CredibilityTier, JudgeId, JudgmentMatrix,
//!     JudgmentResult, Synthesizer,
//! };
//!
//! let answers = AnswerPair::new(
//!     AnswerResult::success(AnswerSource::A, "alpha", "96"),
//!     AnswerResult::success(AnswerSource::B, "beta", "96"),
//! );
//! let verdict = "错误标注：无明显错误\n核心结论：96";
//! let judgments = JudgmentMatrix::from_results(
//!     AnswerSource::ALL.iter().flat_map(|&about| {
//!         JudgeId::ALL
//!             .iter()
//!             .map(move |&judge| JudgmentResult::success(judge, about, verdict))
//!     }),
//! );
//!
//! let consensus = Synthesizer::new().synthesize(&answers, &judgments);
//! assert_eq!(consensus.tier, CredibilityTier::High);
//! assert_eq!(consensus.direct_answer, "96");
//! ```

pub mod consistency;
pub mod report;
pub mod synthesizer;
pub mod types;
pub mod verdict;

// Re-export main types at crate root
pub use consistency::is_consistent;
pub use report::render_markdown;
pub use synthesizer::Synthesizer;
pub use types::{
    AnswerAssessment, AnswerPair, AnswerResult, AnswerSource, BackendSection, ConsensusResult,
    CredibilityTier, JudgeId, JudgmentMatrix, JudgmentRequest, JudgmentResult, ParsedVerdict,
    Phase, ProgressUpdate, Question, QuestionError, RunState, VerdictPayload, MISSING_JUDGMENT,
};
pub use verdict::{parse, CONCLUSION_MARKER, ERROR_MARKER, NO_CONCLUSION, NO_ERROR};

/// Parse, gate and fuse in one call.
///
/// Convenience wrapper over [`Synthesizer::synthesize`] that also assembles
/// the payload handed to renderers.
pub fn fuse(
    question: &Question,
    answers: &AnswerPair,
    judgments: &JudgmentMatrix,
) -> (ConsensusResult, VerdictPayload) {
    let consensus = Synthesizer::new().synthesize(answers, judgments);
    let payload = VerdictPayload::assemble(question, answers, &consensus);
    (consensus, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuse_end_to_end() {
        let question = Question::new("What is 12 * 8?").unwrap();
        let answers = AnswerPair::new(
            AnswerResult::success(AnswerSource::A, "alpha", "96"),
            AnswerResult::success(AnswerSource::B, "beta", "96"),
        );
        let judgments = JudgmentMatrix::from_results(
            JudgmentRequest::cross_matrix(&answers)
                .into_iter()
                .map(|r| JudgmentResult::success(r.judge, r.about, "错误标注：无明显错误\n核心结论：96")),
        );

        let (consensus, payload) = fuse(&question, &answers, &judgments);

        assert_eq!(consensus.tier, CredibilityTier::High);
        assert_eq!(payload.credibility_tier, CredibilityTier::High);
        assert_eq!(payload.direct_answer, "96");
        assert_eq!(payload.question, "What is 12 * 8?");
        assert_eq!(payload.section(AnswerSource::B).backend, "beta");
        assert_eq!(payload.section(AnswerSource::A).answer_text, "96");
    }
}
