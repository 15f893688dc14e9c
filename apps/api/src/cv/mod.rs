// Résumé summarisation: upload intake, text extraction, prompt assembly.
// The model call and streaming back to the client live in llm_client and relay.

pub mod extract;
pub mod handlers;
pub mod intake;
pub mod prompt;
pub mod prompts;
