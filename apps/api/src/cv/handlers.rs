//! Axum route handler for résumé summarisation.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::header,
    response::{IntoResponse, Response},
};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::cv::intake::read_upload;
use crate::cv::prompt::build_prompt;
use crate::errors::AppError;
use crate::relay::{into_body, relay};
use crate::state::AppState;

/// POST /api/cv
///
/// Multipart fields: `file` (required PDF), `userQuestion` (optional).
/// Responds 200 with the model's answer as a plain-text stream. Missing file
/// is a 400 and an unreadable PDF a 500, both before any body is sent; an
/// upstream model failure only shows as the stream ending early.
pub async fn handle_summarize(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let multipart = multipart.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    let request_id = Uuid::new_v4();
    let span = info_span!("cv_summarize", %request_id);

    let upload = read_upload(multipart).instrument(span.clone()).await?;
    span.in_scope(|| {
        info!(
            "Upload received: {} bytes, question supplied: {}",
            upload.file.len(),
            upload.user_question.is_some()
        )
    });

    let prompt = build_prompt(
        state.extractor.as_ref(),
        upload.file,
        upload.user_question.as_deref(),
    )
    .instrument(span.clone())
    .await?;
    span.in_scope(|| {
        info!(
            "Prompt assembled from {} chars of document text",
            prompt.content[0].as_text().chars().count()
        )
    });

    let texts = relay(state.inference.clone(), prompt, state.config.relay_on_error, span);

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        into_body(texts),
    )
        .into_response())
}
