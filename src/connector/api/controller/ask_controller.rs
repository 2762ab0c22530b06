use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use super::super::{ApiError, Container};
use crate::domain::AskRequest;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// `POST /gemini/ask`: stream the model's reply as plain text.
pub async fn ask(State(container): State<Arc<Container>>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!("ask", request_id = %request_id);

    let mut response = handle(container, body).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn handle(container: Arc<Container>, body: Bytes) -> Response {
    let mode = container.mode();
    let relay = container.relay();

    if !relay.is_configured() {
        warn!("Rejecting chat request: Gemini API key unavailable");
        return ApiError::not_configured(mode).into_response();
    }

    let request = match parse_body(&body) {
        Ok(request) => request,
        Err((message, detail)) => {
            warn!("Rejecting chat request: {message}: {detail}");
            return ApiError::new(StatusCode::BAD_REQUEST, message)
                .with_details(detail, mode)
                .into_response();
        }
    };

    match relay.respond(request).await {
        Ok(chunks) => {
            let body = Body::from_stream(chunks.map(|chunk| Ok::<_, Infallible>(Bytes::from(chunk))));
            ([(header::CONTENT_TYPE, TEXT_PLAIN_UTF8)], body).into_response()
        }
        Err(e) => {
            if e.is_caller_error() {
                warn!("Rejecting chat request: {e}");
            }
            ApiError::from_domain(&e, mode).into_response()
        }
    }
}

/// Decode the body into an [`AskRequest`]; on failure returns (public message, detail).
fn parse_body(body: &[u8]) -> Result<AskRequest, (&'static str, String)> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ("Request body must be valid JSON", e.to_string()))?;

    if !value.is_object() {
        return Err((
            "Request body must be a JSON object",
            format!("got {}", json_type(&value)),
        ));
    }

    serde_json::from_value(value).map_err(|e| ("Malformed request body", e.to_string()))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_question_and_history() {
        let request = parse_body(br#"{"question":"hi","history":[]}"#).unwrap();
        assert_eq!(request.question, json!("hi"));
        assert_eq!(request.history, json!([]));
    }

    #[test]
    fn missing_fields_default_to_null() {
        let request = parse_body(b"{}").unwrap();
        assert!(request.question.is_null());
        assert!(request.history.is_null());
    }

    #[test]
    fn rejects_invalid_json_and_non_objects() {
        assert_eq!(parse_body(b"{nope").unwrap_err().0, "Request body must be valid JSON");
        let (message, detail) = parse_body(br#"["hi"]"#).unwrap_err();
        assert_eq!(message, "Request body must be a JSON object");
        assert_eq!(detail, "got an array");
    }
}
