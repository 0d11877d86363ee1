//! Synthesizer: fuses the four judgments into a credibility verdict.
//!
//! The fusion rules are fixed:
//! 1. Per answer, the two judgments pass the consistency gate. Agreement
//!    keeps the agreed error tag; disagreement means "no error found".
//! 2. Both answers clean -> High. Both flagged -> Low. Exactly one clean ->
//!    Medium, and the clean answer's conclusion becomes the direct answer.
//!
//! Synthesis is pure: no I/O, no clock, same inputs give the same result.

use std::collections::BTreeMap;

use crate::consistency::is_consistent;
use crate::types::{
    AnswerAssessment, AnswerPair, AnswerSource, ConsensusResult, CredibilityTier, JudgmentMatrix,
};
use crate::verdict::{self, NO_CONCLUSION, NO_ERROR};

/// Lead-in for a direct answer reconstructed from judge corrections.
pub const CORRECTED_ANSWER_PREFIX: &str =
    "Based on the judges' corrections, the most reasonable answer is: ";

/// The Synthesizer turns judgments into a [`ConsensusResult`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Synthesizer;

impl Synthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Fuse the answers and their cross-matrix judgments.
    pub fn synthesize(&self, answers: &AnswerPair, judgments: &JudgmentMatrix) -> ConsensusResult {
        let a = self.assess(AnswerSource::A, judgments);
        let b = self.assess(AnswerSource::B, judgments);

        let (tier, recommended) = self.classify(&a, &b);
        let chosen = if recommended == AnswerSource::A { &a } else { &b };

        let direct_answer = match tier {
            CredibilityTier::Low => format!("{}{}", CORRECTED_ANSWER_PREFIX, chosen.conclusion),
            _ => chosen.conclusion.clone(),
        };

        let analysis_text = self.build_analysis(tier, answers, &a, &b, recommended, &direct_answer);

        let judgment_display = AnswerSource::ALL
            .iter()
            .map(|&source| (source, self.display_judgments(source, judgments)))
            .collect::<BTreeMap<_, _>>();

        tracing::debug!(
            tier = %tier,
            recommended = %recommended,
            a_error = %a.final_error,
            b_error = %b.final_error,
            "Consensus fused"
        );

        ConsensusResult {
            tier,
            direct_answer,
            analysis_text,
            judgment_display,
            assessments: vec![a, b],
        }
    }

    /// Apply the consistency gate to one answer's judgments.
    fn assess(&self, source: AnswerSource, judgments: &JudgmentMatrix) -> AnswerAssessment {
        let (first, second) = judgments.pair(source);
        let first = verdict::parse(&first.raw_text);
        let second = verdict::parse(&second.raw_text);

        let judges_agree = is_consistent(&first, &second);
        let final_error = if judges_agree {
            first.error_tag.clone()
        } else {
            NO_ERROR.to_string()
        };

        // The first judge's conclusion is canonical; the second fills in
        // when the first produced nothing usable.
        let conclusion = if !first.has_conclusion() && second.has_conclusion() {
            second.conclusion
        } else {
            first.conclusion
        };

        AnswerAssessment {
            source,
            final_error,
            conclusion,
            judges_agree,
        }
    }

    /// Tier and the answer whose conclusion is recommended.
    fn classify(&self, a: &AnswerAssessment, b: &AnswerAssessment) -> (CredibilityTier, AnswerSource) {
        let a_clean = a.final_error == NO_ERROR;
        let b_clean = b.final_error == NO_ERROR;

        match (a_clean, b_clean) {
            (true, true) => (CredibilityTier::High, AnswerSource::A),
            (true, false) => (CredibilityTier::Medium, AnswerSource::A),
            (false, true) => (CredibilityTier::Medium, AnswerSource::B),
            (false, false) => {
                let source = if usable(&a.conclusion) || !usable(&b.conclusion) {
                    AnswerSource::A
                } else {
                    AnswerSource::B
                };
                (CredibilityTier::Low, source)
            }
        }
    }

    fn build_analysis(
        &self,
        tier: CredibilityTier,
        answers: &AnswerPair,
        a: &AnswerAssessment,
        b: &AnswerAssessment,
        recommended: AnswerSource,
        direct_answer: &str,
    ) -> String {
        if tier == CredibilityTier::High {
            return format!(
                "Both answers were judged error-free by both judges. Final result: {}",
                direct_answer
            );
        }

        let recommended_backend = &answers.get(recommended).backend;
        let reason = match tier {
            CredibilityTier::Low => {
                "Both answers were flagged with errors by both of their judges.".to_string()
            }
            _ => format!("Only {}'s answer was judged error-free.", recommended_backend),
        };

        format!(
            "{} concluded: {}; {} concluded: {}. {} Prefer the conclusion of {}.",
            answers.a.backend,
            a.conclusion,
            answers.b.backend,
            b.conclusion,
            reason,
            recommended_backend
        )
    }

    /// One judgment when the judges agreed, both when they did not.
    fn display_judgments(&self, source: AnswerSource, judgments: &JudgmentMatrix) -> String {
        let (first, second) = judgments.pair(source);
        let agree = is_consistent(
            &verdict::parse(&first.raw_text),
            &verdict::parse(&second.raw_text),
        );

        if agree {
            first.raw_text.clone()
        } else {
            format!("{}\n{}", first.raw_text, second.raw_text)
        }
    }
}

fn usable(conclusion: &str) -> bool {
    !conclusion.trim().is_empty() && conclusion != NO_CONCLUSION
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnswerResult, JudgeId, JudgmentResult};

    const CLEAN_96: &str = "错误标注：无明显错误\n核心结论：96";

    fn answers() -> AnswerPair {
        AnswerPair::new(
            AnswerResult::success(AnswerSource::A, "alpha", "96"),
            AnswerResult::success(AnswerSource::B, "beta", "86"),
        )
    }

    fn matrix(a1: &str, a2: &str, b1: &str, b2: &str) -> JudgmentMatrix {
        JudgmentMatrix::from_results(vec![
            JudgmentResult::success(JudgeId::First, AnswerSource::A, a1),
            JudgmentResult::success(JudgeId::Second, AnswerSource::A, a2),
            JudgmentResult::success(JudgeId::First, AnswerSource::B, b1),
            JudgmentResult::success(JudgeId::Second, AnswerSource::B, b2),
        ])
    }

    #[test]
    fn test_all_clean_yields_high() {
        let judgments = matrix(CLEAN_96, CLEAN_96, CLEAN_96, CLEAN_96);
        let result = Synthesizer::new().synthesize(&answers(), &judgments);

        assert_eq!(result.tier, CredibilityTier::High);
        assert_eq!(result.direct_answer, "96");
        assert!(result.analysis_text.contains("Final result: 96"));
        assert_eq!(result.judgment_display[&AnswerSource::A], CLEAN_96);
    }

    #[test]
    fn test_high_uses_answer_a_conclusion() {
        let judgments = matrix(
            "错误标注：无明显错误\n核心结论：12*8=96",
            "错误标注：无明显错误\n核心结论：12 * 8 = 96",
            "错误标注：无明显错误\n核心结论：结果为96",
            "错误标注：无明显错误\n核心结论：结果为96",
        );
        let result = Synthesizer::new().synthesize(&answers(), &judgments);

        assert_eq!(result.tier, CredibilityTier::High);
        assert_eq!(result.direct_answer, "12*8=96");
    }

    #[test]
    fn test_both_flagged_yields_low() {
        let flagged = "错误标注：计算错误\n核心结论：12*8=96";
        let judgments = matrix(flagged, flagged, flagged, flagged);
        let result = Synthesizer::new().synthesize(&answers(), &judgments);

        assert_eq!(result.tier, CredibilityTier::Low);
        assert_eq!(
            result.direct_answer,
            format!("{}12*8=96", CORRECTED_ANSWER_PREFIX)
        );
        assert!(result.analysis_text.contains("alpha concluded: 12*8=96"));
        assert!(result.analysis_text.contains("Prefer the conclusion of alpha"));
    }

    #[test]
    fn test_low_falls_back_to_answer_b_conclusion() {
        let flagged_empty = "错误标注：逻辑错误\n核心结论：";
        let flagged_b = "错误标注：结论错误\n核心结论：96";
        let judgments = matrix(flagged_empty, flagged_empty, flagged_b, flagged_b);
        let result = Synthesizer::new().synthesize(&answers(), &judgments);

        assert_eq!(result.tier, CredibilityTier::Low);
        assert_eq!(result.direct_answer, format!("{}96", CORRECTED_ANSWER_PREFIX));
        assert!(result.analysis_text.contains("Prefer the conclusion of beta"));
    }

    #[test]
    fn test_only_a_clean_yields_medium_with_a() {
        let flagged = "错误标注：计算错误\n核心结论：12*8=96，答案 86 有误";
        let judgments = matrix(CLEAN_96, CLEAN_96, flagged, flagged);
        let result = Synthesizer::new().synthesize(&answers(), &judgments);

        assert_eq!(result.tier, CredibilityTier::Medium);
        assert_eq!(result.direct_answer, "96");
        assert!(result.analysis_text.contains("Only alpha's answer"));
    }

    #[test]
    fn test_only_b_clean_yields_medium_with_b() {
        let flagged = "错误标注：计算错误\n核心结论：应为96";
        let clean_b = "错误标注：无明显错误\n核心结论：B 的结论";
        let judgments = matrix(flagged, flagged, clean_b, clean_b);
        let result = Synthesizer::new().synthesize(&answers(), &judgments);

        assert_eq!(result.tier, CredibilityTier::Medium);
        assert_eq!(result.direct_answer, "B 的结论");
        assert!(result.analysis_text.contains("Prefer the conclusion of beta"));
    }

    #[test]
    fn test_disagreement_is_benefit_of_the_doubt() {
        // Both of B's judges flag different errors: not consistent, so B is
        // treated as clean and the run stays High.
        let judgments = matrix(
            CLEAN_96,
            CLEAN_96,
            "错误标注：计算错误\n核心结论：96",
            "错误标注：逻辑错误\n核心结论：96",
        );
        let result = Synthesizer::new().synthesize(&answers(), &judgments);

        assert_eq!(result.tier, CredibilityTier::High);
        let b = result.assessment(AnswerSource::B).unwrap();
        assert!(!b.judges_agree);
        assert_eq!(b.final_error, NO_ERROR);
    }

    #[test]
    fn test_disagreement_shows_both_judgments() {
        let a2 = "错误标注：无明显错误\n核心结论：九十六";
        let judgments = matrix(CLEAN_96, a2, CLEAN_96, CLEAN_96);
        let result = Synthesizer::new().synthesize(&answers(), &judgments);

        assert_eq!(
            result.judgment_display[&AnswerSource::A],
            format!("{}\n{}", CLEAN_96, a2)
        );
        assert_eq!(result.judgment_display[&AnswerSource::B], CLEAN_96);
    }

    #[test]
    fn test_silent_judge_never_yields_low() {
        let flagged = "错误标注：计算错误\n核心结论：应为96";
        let judgments = JudgmentMatrix::from_results(vec![
            JudgmentResult::success(JudgeId::First, AnswerSource::A, flagged),
            JudgmentResult::success(JudgeId::First, AnswerSource::B, flagged),
        ]);
        let result = Synthesizer::new().synthesize(&answers(), &judgments);

        assert_ne!(result.tier, CredibilityTier::Low);
        assert!(result.assessments.iter().all(|a| !a.judges_agree));
        assert_eq!(result.direct_answer, "应为96");
    }

    #[test]
    fn test_second_judge_supplies_missing_conclusion() {
        let judgments = JudgmentMatrix::from_results(vec![
            JudgmentResult::failure(JudgeId::First, AnswerSource::A, "judge call failed"),
            JudgmentResult::success(JudgeId::Second, AnswerSource::A, CLEAN_96),
            JudgmentResult::success(JudgeId::Second, AnswerSource::B, CLEAN_96),
        ]);
        let result = Synthesizer::new().synthesize(&answers(), &judgments);

        assert_eq!(result.direct_answer, "96");
    }

    #[test]
    fn test_fully_degraded_inputs_use_defaults() {
        let judgments = JudgmentMatrix::from_results(Vec::new());
        let empty = AnswerPair::new(
            AnswerResult::success(AnswerSource::A, "", ""),
            AnswerResult::success(AnswerSource::B, "", ""),
        );
        let result = Synthesizer::new().synthesize(&empty, &judgments);

        assert_eq!(result.tier, CredibilityTier::High);
        assert_eq!(result.direct_answer, NO_CONCLUSION);
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let judgments = matrix(
            CLEAN_96,
            "错误标注：计算错误\n核心结论：x",
            "错误标注：逻辑错误\n核心结论：y",
            "错误标注：逻辑错误\n核心结论：y",
        );
        let synthesizer = Synthesizer::new();
        let first = synthesizer.synthesize(&answers(), &judgments);
        let second = synthesizer.synthesize(&answers(), &judgments);

        assert_eq!(first, second);
    }
}
