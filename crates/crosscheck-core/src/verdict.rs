//! Verdict parsing for judge responses.
//!
//! Judges are prompted to answer with exactly two labeled lines:
//!
//! ```text
//! 错误标注：<error type, or 无明显错误>
//! 核心结论：<core steps and final result>
//! ```
//!
//! This is a narrow contract with the judge prompt, not a general format.
//! Parsing never fails: a missing label degrades to its default, and a
//! malformed response is never read as "error found".

use crate::types::ParsedVerdict;

/// Line prefix of the error field ("error annotation").
pub const ERROR_MARKER: &str = "错误标注：";

/// Line prefix of the conclusion field ("core conclusion").
pub const CONCLUSION_MARKER: &str = "核心结论：";

/// Error tag meaning "no error found". Also the default.
pub const NO_ERROR: &str = "无明显错误";

/// Conclusion used when a response carries none.
pub const NO_CONCLUSION: &str = "无有效结论";

/// Error categories judges may report.
pub const ERROR_CATEGORIES: [&str; 5] = ["计算错误", "知识点错误", "逻辑错误", "遗漏条件", "结论错误"];

/// Parse a judge response into its two fields.
pub fn parse(raw: &str) -> ParsedVerdict {
    ParsedVerdict {
        error_tag: field(raw, ERROR_MARKER).unwrap_or_else(|| NO_ERROR.to_string()),
        conclusion: field(raw, CONCLUSION_MARKER).unwrap_or_else(|| NO_CONCLUSION.to_string()),
    }
}

/// Value of the first line starting with `marker`, marker stripped.
fn field(raw: &str, marker: &str) -> Option<String> {
    raw.lines()
        .map(str::trim_start)
        .find_map(|line| line.strip_prefix(marker))
        .map(|value| value.trim().to_string())
}

impl ParsedVerdict {
    /// Whether the judge supplied a usable conclusion.
    pub fn has_conclusion(&self) -> bool {
        !self.conclusion.is_empty() && self.conclusion != NO_CONCLUSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parses_both_fields() {
        let verdict = parse("错误标注：无明显错误\n核心结论：96");
        assert_eq!(verdict.error_tag, NO_ERROR);
        assert_eq!(verdict.conclusion, "96");
        assert_eq!(verdict.error_tag, NO_ERROR);
    }

    #[test]
    fn test_parses_error_with_detail() {
        let raw = "错误标注：计算错误，12*8 写成了 86，正确为 96\n核心结论：12*8=96";
        let verdict = parse(raw);
        assert_eq!(verdict.error_tag, "计算错误，12*8 写成了 86，正确为 96");
        assert_eq!(verdict.conclusion, "12*8=96");
        assert_ne!(verdict.error_tag, NO_ERROR);
    }

    #[test]
    fn test_order_and_whitespace_do_not_matter() {
        let raw = "\n   核心结论：  答案是 96 \r\n\t错误标注：  无明显错误  \n";
        let verdict = parse(raw);
        assert_eq!(verdict.error_tag, NO_ERROR);
        assert_eq!(verdict.conclusion, "答案是 96");
    }

    #[test]
    fn test_first_occurrence_wins() {
        let raw = "错误标注：逻辑错误\n错误标注：无明显错误\n核心结论：a\n核心结论：b";
        let verdict = parse(raw);
        assert_eq!(verdict.error_tag, "逻辑错误");
        assert_eq!(verdict.conclusion, "a");
    }

    #[test]
    fn test_missing_labels_fall_back_to_defaults() {
        let verdict = parse("The answer looks fine to me.");
        assert_eq!(verdict.error_tag, NO_ERROR);
        assert_eq!(verdict.conclusion, NO_CONCLUSION);
        assert!(!verdict.has_conclusion());

        let only_error = parse("错误标注：结论错误");
        assert_eq!(only_error.error_tag, "结论错误");
        assert_eq!(only_error.conclusion, NO_CONCLUSION);
    }

    #[test]
    fn test_empty_input() {
        let verdict = parse("");
        assert_eq!(verdict.error_tag, NO_ERROR);
        assert_eq!(verdict.conclusion, NO_CONCLUSION);
    }

    #[test]
    fn test_marker_mid_line_is_ignored() {
        let verdict = parse("note: 错误标注：逻辑错误");
        assert_eq!(verdict.error_tag, NO_ERROR);
    }

    #[test]
    fn test_empty_conclusion_is_not_usable() {
        let verdict = parse("错误标注：无明显错误\n核心结论：");
        assert_eq!(verdict.conclusion, "");
        assert!(!verdict.has_conclusion());
    }

    fn field_value() -> impl Strategy<Value = String> {
        // Single-line values without surrounding whitespace.
        "[a-zA-Z0-9=*+ ]{0,40}".prop_map(|s| s.trim().to_string())
    }

    proptest! {
        #[test]
        fn prop_labeled_content_is_recovered(
            error in field_value(),
            conclusion in field_value(),
            swap in any::<bool>(),
            pad in "[ \t]{0,3}",
        ) {
            let error_line = format!("{pad}{ERROR_MARKER}{pad}{error}{pad}");
            let conclusion_line = format!("{pad}{CONCLUSION_MARKER}{conclusion}{pad}");
            let raw = if swap {
                format!("\n{conclusion_line}\n{error_line}\n")
            } else {
                format!("{error_line}\n{conclusion_line}")
            };

            let verdict = parse(&raw);
            prop_assert_eq!(verdict.error_tag, error);
            prop_assert_eq!(verdict.conclusion, conclusion);
        }

        #[test]
        fn prop_unlabeled_text_yields_defaults(raw in "[^错核]{0,200}") {
            let verdict = parse(&raw);
            prop_assert_eq!(verdict.error_tag, NO_ERROR);
            prop_assert_eq!(verdict.conclusion, NO_CONCLUSION);
        }
    }
}
