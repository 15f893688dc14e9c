// Fixed prompt texts for résumé summarisation.

/// Instruction block sent after the document text on every request.
pub const SUMMARY_INSTRUCTION: &str = "\
You are a Human Resource expert at a big bank. \
Please summarize the above resume as detailed as possible \
and make bullet points for work experience and skills.";

/// Used when the caller supplies no question of their own.
pub const DEFAULT_QUESTION: &str = "Please respond in Vietnamese";
