//! Markdown rendering of a verdict payload.
//!
//! Output is plain Markdown text. Escaping or styling for a specific UI is
//! left to the caller.

use std::fmt::Write as _;

use crate::types::{BackendSection, VerdictPayload};

/// Render the full verdict: header, direct answer, analysis, then the raw
/// answer and judgment detail for each backend.
pub fn render_markdown(payload: &VerdictPayload) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "# Cross-checked verdict");
    let _ = writeln!(out);
    let _ = writeln!(out, "**Question:** {}", payload.question);
    let _ = writeln!(out);
    let _ = writeln!(out, "**Credibility:** {}", payload.credibility_tier);
    let _ = writeln!(out);
    let _ = writeln!(out, "## Direct answer");
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", payload.direct_answer);
    let _ = writeln!(out);
    let _ = writeln!(out, "## Analysis");
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", payload.analysis_text);
    let _ = writeln!(out);
    let _ = writeln!(out, "## Answers and judgments");

    for (i, section) in payload.answers.iter().enumerate() {
        if i > 0 {
            let _ = writeln!(out);
            let _ = writeln!(out, "---");
        }
        render_section(&mut out, section);
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "_Generated {} from two answering and two judging backends._",
        payload.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    out
}

fn render_section(out: &mut String, section: &BackendSection) {
    let _ = writeln!(out);
    let _ = writeln!(out, "### {} answer", section.backend);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", section.answer_text);
    let _ = writeln!(out);
    let _ = writeln!(out, "### Judgment of {}'s answer", section.backend);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", section.judgment_display);
}

/// One-line summary, suitable for logs and terminal status lines.
pub fn summary_line(payload: &VerdictPayload) -> String {
    format!(
        "[{}] {}",
        payload.credibility_tier,
        payload.direct_answer.lines().next().unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnswerSource, CredibilityTier};
    use chrono::{TimeZone, Utc};

    fn payload() -> VerdictPayload {
        VerdictPayload {
            question: "What is 12 * 8?".to_string(),
            credibility_tier: CredibilityTier::High,
            direct_answer: "96".to_string(),
            analysis_text: "Both answers were judged error-free.".to_string(),
            answers: [
                BackendSection {
                    source: AnswerSource::A,
                    backend: "alpha".to_string(),
                    answer_text: "12 * 8 = 96".to_string(),
                    judgment_display: "错误标注：无明显错误\n核心结论：96".to_string(),
                },
                BackendSection {
                    source: AnswerSource::B,
                    backend: "beta".to_string(),
                    answer_text: "96".to_string(),
                    judgment_display: "错误标注：无明显错误\n核心结论：96".to_string(),
                },
            ],
            completed_at: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn test_render_contains_all_blocks_in_order() {
        let text = render_markdown(&payload());

        let header = text.find("**Credibility:** High").unwrap();
        let direct = text.find("## Direct answer").unwrap();
        let analysis = text.find("## Analysis").unwrap();
        let alpha = text.find("### alpha answer").unwrap();
        let beta = text.find("### beta answer").unwrap();

        assert!(header < direct && direct < analysis && analysis < alpha && alpha < beta);
        assert!(text.contains("### Judgment of beta's answer"));
        assert!(text.contains("2025-01-02 03:04:05 UTC"));
    }

    #[test]
    fn test_render_does_not_escape() {
        let mut p = payload();
        p.direct_answer = "<b>96</b>".to_string();
        assert!(render_markdown(&p).contains("<b>96</b>"));
    }

    #[test]
    fn test_summary_line_uses_first_line() {
        let mut p = payload();
        p.direct_answer = "96\nworking: 12 * 8".to_string();
        assert_eq!(summary_line(&p), "[High] 96");
    }
}
