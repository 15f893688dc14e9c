pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::cv::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/cv",
            post(handlers::handle_summarize).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use bytes::Bytes;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::{Config, RelayErrorMode};
    use crate::cv::extract::{DocumentExtractor, ExtractedDocument, ExtractionError};
    use crate::cv::prompts::DEFAULT_QUESTION;
    use crate::llm_client::fake::{delta_event, ping_event, FakeInference, Script};
    use crate::relay::ERROR_MARKER;

    const BOUNDARY: &str = "X-CV-TEST-BOUNDARY";

    struct FakeExtractor(Result<Vec<&'static str>, &'static str>);

    #[async_trait]
    impl DocumentExtractor for FakeExtractor {
        async fn extract(&self, _file: Bytes) -> Result<ExtractedDocument, ExtractionError> {
            match &self.0 {
                Ok(pages) => Ok(ExtractedDocument::new(
                    pages.iter().map(|p| p.to_string()).collect(),
                )),
                Err(msg) => Err(ExtractionError::Pdf(msg.to_string())),
            }
        }
    }

    fn test_config(mode: RelayErrorMode) -> Config {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.relay_on_error = mode;
        config.max_upload_bytes = 64 * 1024;
        config
    }

    fn app(
        inference: Arc<FakeInference>,
        extractor: FakeExtractor,
        mode: RelayErrorMode,
    ) -> Router {
        build_router(AppState {
            inference,
            extractor: Arc::new(extractor),
            config: test_config(mode),
        })
    }

    enum Part<'a> {
        File(&'a [u8]),
        Text(&'a str, &'a str),
    }

    fn multipart_body(parts: &[Part]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::File(data) => {
                    body.extend_from_slice(
                        b"Content-Disposition: form-data; name=\"file\"; filename=\"cv.pdf\"\r\n\
                          Content-Type: application/pdf\r\n\r\n",
                    );
                    body.extend_from_slice(data);
                }
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/cv")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(
            Arc::new(FakeInference::deltas(&[])),
            FakeExtractor(Ok(vec![])),
            RelayErrorMode::Silent,
        );
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_streams_only_content_deltas() {
        let inference = Arc::new(FakeInference::new(Script::Fragments(vec![
            Ok(delta_event("- Kỹ sư phần mềm")),
            Ok(ping_event()),
            Ok(delta_event("\n- Mạng máy tính")),
        ])));
        let app = app(
            inference.clone(),
            FakeExtractor(Ok(vec!["John Doe, Software Engineer, ", "networking"])),
            RelayErrorMode::Silent,
        );

        let body = multipart_body(&[Part::File(b"%PDF-1.4 fake")]);
        let response = app.oneshot(upload_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(
            body_string(response).await,
            "- Kỹ sư phần mềm\n- Mạng máy tính"
        );

        let seen = inference.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].content[0].as_text(),
            "John Doe, Software Engineer, networking"
        );
        assert_eq!(seen[0].content[2].as_text(), DEFAULT_QUESTION);
    }

    #[tokio::test]
    async fn test_user_question_is_forwarded() {
        let inference = Arc::new(FakeInference::deltas(&["ok"]));
        let app = app(
            inference.clone(),
            FakeExtractor(Ok(vec!["cv"])),
            RelayErrorMode::Silent,
        );

        let body = multipart_body(&[
            Part::Text("userQuestion", "Answer in English"),
            Part::Text("unrelated", "ignored"),
            Part::File(b"%PDF-1.4"),
        ]);
        let response = app.oneshot(upload_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ok");

        let seen = inference.seen.lock().unwrap();
        assert_eq!(seen[0].content[2].as_text(), "Answer in English");
    }

    #[tokio::test]
    async fn test_missing_file_is_bad_request() {
        let inference = Arc::new(FakeInference::deltas(&["never"]));
        let app = app(
            inference.clone(),
            FakeExtractor(Ok(vec!["cv"])),
            RelayErrorMode::Silent,
        );

        let body = multipart_body(&[Part::Text("userQuestion", "hello")]);
        let response = app.oneshot(upload_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert!(inference.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_multipart_body_gets_error_envelope() {
        let inference = Arc::new(FakeInference::deltas(&["never"]));
        let app = app(
            inference.clone(),
            FakeExtractor(Ok(vec!["cv"])),
            RelayErrorMode::Silent,
        );

        let request = Request::builder()
            .method("POST")
            .uri("/api/cv")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"file":"not a pdf"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert!(inference.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extraction_failure_is_server_error() {
        let inference = Arc::new(FakeInference::deltas(&["never"]));
        let app = app(
            inference.clone(),
            FakeExtractor(Err("invalid xref table")),
            RelayErrorMode::Silent,
        );

        let body = multipart_body(&[Part::File(b"garbage")]);
        let response = app.oneshot(upload_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["error"]["code"], "EXTRACTION_ERROR");
        assert!(inference.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_failure_gives_empty_ok_body() {
        let app = app(
            Arc::new(FakeInference::new(Script::FailInvoke)),
            FakeExtractor(Ok(vec!["cv"])),
            RelayErrorMode::Silent,
        );

        let body = multipart_body(&[Part::File(b"%PDF-1.4")]);
        let response = app.oneshot(upload_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "");
    }

    #[tokio::test]
    async fn test_invoke_failure_with_marker_mode() {
        let app = app(
            Arc::new(FakeInference::new(Script::FailInvoke)),
            FakeExtractor(Ok(vec!["cv"])),
            RelayErrorMode::Marker,
        );

        let body = multipart_body(&[Part::File(b"%PDF-1.4")]);
        let response = app.oneshot(upload_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, ERROR_MARKER);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let app = app(
            Arc::new(FakeInference::deltas(&["never"])),
            FakeExtractor(Ok(vec!["cv"])),
            RelayErrorMode::Silent,
        );

        let big = vec![b'a'; 128 * 1024];
        let body = multipart_body(&[Part::File(&big)]);
        let response = app.oneshot(upload_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
