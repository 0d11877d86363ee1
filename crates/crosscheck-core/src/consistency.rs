//! Consistency gate between the two judges of one answer.
//!
//! An error only counts for fusion when both judges report the same error
//! tag and reach the same conclusion. Conclusions are compared loosely:
//! whitespace is ignored and only the first [`CONCLUSION_PREFIX_CHARS`]
//! characters matter.

use crate::types::ParsedVerdict;

/// Number of normalized conclusion characters compared.
pub const CONCLUSION_PREFIX_CHARS: usize = 100;

/// Whether two judgments of the same answer agree.
pub fn is_consistent(first: &ParsedVerdict, second: &ParsedVerdict) -> bool {
    first.error_tag == second.error_tag
        && normalize_conclusion(&first.conclusion) == normalize_conclusion(&second.conclusion)
}

/// Strip all whitespace and keep the comparable prefix.
pub fn normalize_conclusion(conclusion: &str) -> String {
    conclusion
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(CONCLUSION_PREFIX_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::{parse, NO_CONCLUSION, NO_ERROR};
    use proptest::prelude::*;

    fn verdict(error: &str, conclusion: &str) -> ParsedVerdict {
        ParsedVerdict {
            error_tag: error.to_string(),
            conclusion: conclusion.to_string(),
        }
    }

    #[test]
    fn test_identical_verdicts_agree() {
        let a = parse("错误标注：无明显错误\n核心结论：96");
        let b = parse("错误标注：无明显错误\n核心结论：96");
        assert!(is_consistent(&a, &b));
    }

    #[test]
    fn test_whitespace_is_ignored() {
        let a = verdict(NO_ERROR, "12 * 8 = 96");
        let b = verdict(NO_ERROR, "12*8=\n96");
        assert!(is_consistent(&a, &b));
    }

    #[test]
    fn test_only_prefix_is_compared() {
        let shared = "x".repeat(CONCLUSION_PREFIX_CHARS);
        let a = verdict(NO_ERROR, &format!("{shared} tail one"));
        let b = verdict(NO_ERROR, &format!("{shared} something else"));
        assert!(is_consistent(&a, &b));

        let c = verdict(NO_ERROR, &format!("{}y", "x".repeat(CONCLUSION_PREFIX_CHARS - 1)));
        assert!(!is_consistent(&a, &c));
    }

    #[test]
    fn test_prefix_counts_characters_not_bytes() {
        let long = "结".repeat(CONCLUSION_PREFIX_CHARS + 10);
        assert_eq!(normalize_conclusion(&long).chars().count(), CONCLUSION_PREFIX_CHARS);
    }

    #[test]
    fn test_error_tags_must_match_exactly() {
        let a = verdict("计算错误", "96");
        let b = verdict("逻辑错误", "96");
        assert!(!is_consistent(&a, &b));
    }

    #[test]
    fn test_degraded_judgment_disagrees_with_real_one() {
        let degraded = parse("judge call failed: connection refused");
        let real = parse("错误标注：无明显错误\n核心结论：96");
        assert_eq!(degraded.conclusion, NO_CONCLUSION);
        assert!(!is_consistent(&degraded, &real));
    }

    proptest! {
        #[test]
        fn prop_consistency_is_symmetric(
            e1 in "[a-c]{0,2}",
            e2 in "[a-c]{0,2}",
            c1 in "[a-c \n]{0,8}",
            c2 in "[a-c \n]{0,8}",
        ) {
            let a = verdict(&e1, &c1);
            let b = verdict(&e2, &c2);
            prop_assert_eq!(is_consistent(&a, &b), is_consistent(&b, &a));
        }

        #[test]
        fn prop_verdict_agrees_with_itself(e in ".{0,20}", c in ".{0,200}") {
            let a = verdict(&e, &c);
            prop_assert!(is_consistent(&a, &a.clone()));
        }
    }
}
