//! Prompts sent to answering and judging backends.
//!
//! The judge prompt ends with the two labeled output lines that
//! [`crosscheck_core::verdict::parse`] reads back, built from the same
//! marker constants so the two sides cannot drift apart.

use crosscheck_core::verdict::{CONCLUSION_MARKER, ERROR_CATEGORIES, ERROR_MARKER, NO_ERROR};

/// Prompt asking an answering backend for a concise, worked answer.
pub fn answer_prompt(question: &str) -> String {
    format!(
        "针对问题【{}】，给出准确、简洁的答案，涉及计算/推理必须分步列出过程，不要多余文字。",
        question
    )
}

/// Rules given to every judge, ending with the required output format.
pub fn neutral_judge_rules() -> String {
    format!(
        "请作为**无立场的中立学术裁判**，对答案进行研精析微式精准研判，严格遵守以下规则：\n\
         1. 判错唯一标准：答案存在**计算错误/知识点错误/逻辑漏洞/遗漏问题要求/结论与正确结果相悖**，无上述问题则标注「{no_error}」；\n\
         2. 严禁编造/虚构错误，严禁过度挑剔，判定需基于问题要求与客观事实；\n\
         3. 有错误时，需明确标注「错误类型+具体错误点+正确内容」，错误类型仅限：{categories}；\n\
         4. 核心结论：提炼答案的**核心步骤+最终结果**，保留关键计算/推理过程，表述简洁精准；\n\
         5. 输出严格按以下格式，无多余文字、无注释、无补充说明：\n\
         {error_marker}xxx\n\
         {conclusion_marker}xxx",
        no_error = NO_ERROR,
        categories = ERROR_CATEGORIES.join("、"),
        error_marker = ERROR_MARKER,
        conclusion_marker = CONCLUSION_MARKER,
    )
}

/// Prompt asking a judge to review one answer to the question.
///
/// `answer` must be the bare answer text, without any source label.
pub fn judge_prompt(question: &str, answer: &str) -> String {
    format!("{}\n问题：{}\n答案：{}", neutral_judge_rules(), question, answer)
}
