//! Multipart upload intake.

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use bytes::Bytes;
use tracing::debug;

use crate::errors::AppError;

pub const FILE_FIELD: &str = "file";
pub const QUESTION_FIELD: &str = "userQuestion";

/// One upload as received. Lives for a single request.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: Bytes,
    pub user_question: Option<String>,
}

/// Reads the `file` and `userQuestion` fields; any other field is ignored.
/// A missing `file` field is a client error.
pub async fn read_upload(mut multipart: Multipart) -> Result<UploadRequest, AppError> {
    let mut file = None;
    let mut user_question = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(FILE_FIELD) => {
                debug!(
                    "Received file field: filename={:?} content_type={:?}",
                    field.file_name(),
                    field.content_type()
                );
                file = Some(field.bytes().await.map_err(multipart_error)?);
            }
            Some(QUESTION_FIELD) => {
                user_question = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::Validation("file field is required".to_string()))?;

    Ok(UploadRequest {
        file,
        user_question,
    })
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(format!("malformed multipart body: {}", e.body_text()))
    }
}
