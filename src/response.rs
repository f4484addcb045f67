//! HTTP response builders, decoupled from routing logic.

use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

/// Build a JSON response from any serializable value.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = match serde_json::to_string(body) {
        Ok(j) => j,
        Err(e) => {
            logger::log_error(&format!("Failed to serialize response: {e}"));
            return Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from(
                    r#"{"error":"Internal server error"}"#,
                )))
                .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Error"))));
        }
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap_or_else(|e| {
            logger::log_error(&format!("Failed to build response: {e}"));
            Response::new(Full::new(Bytes::from("Error")))
        })
}

/// 400 Bad Request with a JSON error body
pub fn bad_request(message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message });
    json_response(StatusCode::BAD_REQUEST, &body)
}

/// 404 Not Found listing the available endpoints
pub fn not_found() -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "available_endpoints": ["/", "/health", "/calculate/sum", "/calculate/product"]
    });
    json_response(StatusCode::NOT_FOUND, &body)
}

/// 405 Method Not Allowed; `allow` names the methods the path accepts
pub fn method_not_allowed(allow: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("Content-Type", "application/json")
        .header("Allow", allow)
        .body(Full::new(Bytes::from(r#"{"error":"Method Not Allowed"}"#)))
        .unwrap_or_else(|e| {
            logger::log_error(&format!("Failed to build 405 response: {e}"));
            Response::new(Full::new(Bytes::from("Method Not Allowed")))
        })
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Allow", "GET, POST, OPTIONS");

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
            .header("Access-Control-Allow-Headers", "Content-Type")
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        logger::log_error(&format!("Failed to build OPTIONS response: {e}"));
        Response::new(Full::new(Bytes::new()))
    })
}

/// 413 Payload Too Large
pub fn build_413_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::PAYLOAD_TOO_LARGE)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(r#"{"error":"Payload Too Large"}"#)))
        .unwrap_or_else(|e| {
            logger::log_error(&format!("Failed to build 413 response: {e}"));
            Response::new(Full::new(Bytes::from("Payload Too Large")))
        })
}
