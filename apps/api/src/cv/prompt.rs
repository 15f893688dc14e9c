//! Prompt assembly: document text, fixed instruction, user question.

use bytes::Bytes;
use serde::Serialize;

use crate::cv::extract::{DocumentExtractor, ExtractionError};
use crate::cv::prompts::{DEFAULT_QUESTION, SUMMARY_INSTRUCTION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
}

impl ContentBlock {
    pub fn text(value: impl Into<String>) -> Self {
        ContentBlock::Text { text: value.into() }
    }

    pub fn as_text(&self) -> &str {
        match self {
            ContentBlock::Text { text } => text,
        }
    }
}

/// One user turn in Messages API shape. Serialises as
/// `{"role":"user","content":[{"type":"text","text":...}, ...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

/// Extracts the upload once and assembles the prompt from it.
pub async fn build_prompt(
    extractor: &dyn DocumentExtractor,
    file: Bytes,
    question: Option<&str>,
) -> Result<PromptMessage, ExtractionError> {
    let document = extractor.extract(file).await?;
    Ok(assemble_prompt(document.text(), question))
}

/// Builds the three content blocks: document, instruction, question.
/// A missing or empty question falls back to `DEFAULT_QUESTION`.
pub fn assemble_prompt(document_text: String, question: Option<&str>) -> PromptMessage {
    let question = question
        .filter(|q| !q.is_empty())
        .unwrap_or(DEFAULT_QUESTION);

    PromptMessage {
        role: Role::User,
        content: vec![
            ContentBlock::text(document_text),
            ContentBlock::text(SUMMARY_INSTRUCTION),
            ContentBlock::text(question),
        ],
    }
}
