//! HTTP router: maps method/path pairs to handlers, validates request
//! bodies, invokes the operation library, and serializes results.

use crate::config::AppState;
use crate::logger;
use crate::ops;
use crate::response;
use chrono::{SecondsFormat, Utc};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

/// Arithmetic operations exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Sum,
    Product,
}

/// A request body failed numeric validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InvalidInput;

impl fmt::Display for InvalidInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Both a and b must be numbers")
    }
}

/// Calculation request body. Fields are kept as raw JSON values so the
/// response can echo exactly what the caller sent; `numbers` performs the
/// numeric validation.
#[derive(Debug, Deserialize)]
struct CalculationRequest {
    #[serde(default)]
    a: Value,
    #[serde(default)]
    b: Value,
}

impl CalculationRequest {
    /// Validate that both fields are numeric. Missing fields deserialize to
    /// null and fail here with the same error.
    fn numbers(&self) -> Result<(f64, f64), InvalidInput> {
        match (self.a.as_f64(), self.b.as_f64()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(InvalidInput),
        }
    }
}

#[derive(Debug, Serialize)]
struct CalculationResponse {
    operation: Operation,
    a: Value,
    b: Value,
    result: Value,
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct Welcome {
    message: &'static str,
    version: &'static str,
    endpoints: [&'static str; 3],
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: hyper::body::Body,
    B::Data: hyper::body::Buf,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let access_log = state.config.logging.access_log;
    if access_log {
        logger::log_request(&method, req.uri(), req.version());
    }

    // All responses, preflight and guard rejections included, flow through
    // the same tail for the Server header and the access log line.
    let mut resp = build_response(req, &method, &path, &state).await;
    if let Ok(server_name) = state.config.http.server_name.parse() {
        resp.headers_mut().insert(hyper::header::SERVER, server_name);
    }
    if access_log {
        logger::log_response(resp.status());
    }
    Ok(resp)
}

/// Run the guard checks, collect the body, and dispatch.
async fn build_response<B>(
    req: Request<B>,
    method: &Method,
    path: &str,
    state: &Arc<AppState>,
) -> Response<Full<Bytes>>
where
    B: hyper::body::Body,
    B::Data: hyper::body::Buf,
{
    // Preflight requests are answered before any body handling
    if *method == Method::OPTIONS {
        return response::build_options_response(state.config.http.enable_cors);
    }

    if let Some(resp) = check_body_size(&req, state.config.http.max_body_size) {
        return resp;
    }

    logger::log_headers_count(req.headers().len(), state.config.logging.show_headers);

    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => {
            logger::log_warning("Failed to read request body");
            return response::bad_request("Failed to read request body");
        }
    };

    dispatch(method, path, &body)
}

/// Validate Content-Length header against max body size
/// Returns Some(413 response) if too large, None otherwise
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(response::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Route the request based on method and path
fn dispatch(method: &Method, path: &str, body: &Bytes) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/") => handle_welcome(),
        (&Method::GET, "/health") => handle_health(),
        (&Method::POST, "/calculate/sum") => handle_calculate(Operation::Sum, body),
        (&Method::POST, "/calculate/product") => handle_calculate(Operation::Product, body),
        (_, "/" | "/health") => {
            logger::log_warning(&format!("Method not allowed: {method} {path}"));
            response::method_not_allowed("GET, OPTIONS")
        }
        (_, "/calculate/sum" | "/calculate/product") => {
            logger::log_warning(&format!("Method not allowed: {method} {path}"));
            response::method_not_allowed("POST, OPTIONS")
        }
        _ => response::not_found(),
    }
}

fn handle_welcome() -> Response<Full<Bytes>> {
    let welcome = Welcome {
        message: "Welcome to the calculation service",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ["/health", "/calculate/sum", "/calculate/product"],
    };
    response::json_response(StatusCode::OK, &welcome)
}

fn handle_health() -> Response<Full<Bytes>> {
    let health = HealthStatus {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    response::json_response(StatusCode::OK, &health)
}

fn handle_calculate(operation: Operation, body: &Bytes) -> Response<Full<Bytes>> {
    let request: CalculationRequest = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(e) => return response::bad_request(&format!("Invalid JSON: {e}")),
    };

    // Validation failures never reach the operation library
    let (a, b) = match request.numbers() {
        Ok(pair) => pair,
        Err(e) => return response::bad_request(&e.to_string()),
    };

    let result = match operation {
        Operation::Sum => ops::sum(a, b),
        Operation::Product => ops::product(a, b),
    };

    let payload = CalculationResponse {
        operation,
        a: request.a,
        b: request.b,
        result: number_value(result),
    };
    response::json_response(StatusCode::OK, &payload)
}

/// Largest magnitude at which every integer is exactly representable in f64
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0; // 2^53

/// Render an `f64` the way the wire format expects: integral values as JSON
/// integers, non-finite values as null.
#[allow(clippy::cast_possible_truncation)]
fn number_value(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_EXACT_INT {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig};
    use serde_json::json;

    async fn body_json(resp: Response<Full<Bytes>>) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(path: &str, body: &str) -> Response<Full<Bytes>> {
        dispatch(&Method::POST, path, &Bytes::from(body.to_string()))
    }

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                workers: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                access_log: false,
                show_headers: false,
            },
            performance: PerformanceConfig {
                keep_alive_timeout: 75,
                read_timeout: 30,
                write_timeout: 30,
                max_connections: None,
            },
            http: HttpConfig {
                server_name: "calc-server/1.0".to_string(),
                enable_cors: false,
                max_body_size: 1_048_576,
            },
        }))
    }

    fn request(method: Method, path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_healthy_with_timestamp() {
        let resp = dispatch(&Method::GET, "/health", &Bytes::new());
        assert_eq!(resp.status(), StatusCode::OK);

        let value = body_json(resp).await;
        assert_eq!(value["status"], "healthy");
        let timestamp = value["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[tokio::test]
    async fn test_welcome_lists_endpoints() {
        let resp = dispatch(&Method::GET, "/", &Bytes::new());
        assert_eq!(resp.status(), StatusCode::OK);

        let value = body_json(resp).await;
        assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(
            value["endpoints"],
            json!(["/health", "/calculate/sum", "/calculate/product"])
        );
    }

    #[tokio::test]
    async fn test_sum_of_integers() {
        let resp = post("/calculate/sum", r#"{"a":2,"b":3}"#);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({"operation":"sum","a":2,"b":3,"result":5})
        );
    }

    #[tokio::test]
    async fn test_product_of_negatives() {
        let resp = post("/calculate/product", r#"{"a":-3,"b":-4}"#);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({"operation":"product","a":-3,"b":-4,"result":12})
        );
    }

    #[tokio::test]
    async fn test_sum_of_floats_echoes_originals() {
        let resp = post("/calculate/sum", r#"{"a":1.5,"b":2.25}"#);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({"operation":"sum","a":1.5,"b":2.25,"result":3.75})
        );
    }

    #[tokio::test]
    async fn test_non_numeric_field_rejected() {
        let resp = post("/calculate/sum", r#"{"a":"x","b":3}"#);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(resp).await,
            json!({"error":"Both a and b must be numbers"})
        );
    }

    #[tokio::test]
    async fn test_missing_field_rejected() {
        let resp = post("/calculate/product", r#"{"a":7}"#);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(resp).await,
            json!({"error":"Both a and b must be numbers"})
        );
    }

    #[tokio::test]
    async fn test_boolean_field_rejected() {
        let resp = post("/calculate/sum", r#"{"a":true,"b":3}"#);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_json_rejected() {
        let resp = post("/calculate/sum", "{not json");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let value = body_json(resp).await;
        assert!(value["error"].as_str().unwrap().starts_with("Invalid JSON:"));
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let resp = dispatch(&Method::GET, "/calculate/factorial", &Bytes::new());
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_method_is_rejected() {
        let resp = dispatch(&Method::POST, "/health", &Bytes::new());
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers().get("Allow").unwrap(), "GET, OPTIONS");

        let resp = dispatch(&Method::GET, "/calculate/sum", &Bytes::new());
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers().get("Allow").unwrap(), "POST, OPTIONS");
    }

    #[tokio::test]
    async fn test_oversized_content_length_rejected() {
        let mut req = request(Method::POST, "/calculate/sum", r#"{"a":2,"b":3}"#);
        req.headers_mut()
            .insert("content-length", "2097152".parse().unwrap());

        let resp = handle_request(req, test_state()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_check_body_size_over_limit() {
        let mut req = request(Method::POST, "/calculate/sum", "");
        req.headers_mut()
            .insert("content-length", "1025".parse().unwrap());

        let resp = check_body_size(&req, 1024).unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_check_body_size_at_limit_passes() {
        let mut req = request(Method::POST, "/calculate/sum", "");
        req.headers_mut()
            .insert("content-length", "1024".parse().unwrap());

        assert!(check_body_size(&req, 1024).is_none());
    }

    #[test]
    fn test_check_body_size_unparseable_header_passes() {
        let mut req = request(Method::POST, "/calculate/sum", "");
        req.headers_mut()
            .insert("content-length", "not-a-number".parse().unwrap());

        assert!(check_body_size(&req, 1024).is_none());
    }

    #[test]
    fn test_check_body_size_without_header_passes() {
        let req = request(Method::POST, "/calculate/sum", "");
        assert!(check_body_size(&req, 1024).is_none());
    }

    #[tokio::test]
    async fn test_preflight_flows_through_response_tail() {
        let req = request(Method::OPTIONS, "/calculate/sum", "");
        let resp = handle_request(req, test_state()).await.unwrap();

        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.headers().get("Server").unwrap(), "calc-server/1.0");
    }

    #[tokio::test]
    async fn test_handled_request_carries_server_header() {
        let req = request(Method::GET, "/health", "");
        let resp = handle_request(req, test_state()).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("Server").unwrap(), "calc-server/1.0");
    }

    #[test]
    fn test_number_value_collapses_integral_floats() {
        assert_eq!(number_value(5.0), json!(5));
        assert_eq!(number_value(-12.0), json!(-12));
        assert_eq!(number_value(3.75), json!(3.75));
        assert_eq!(number_value(f64::INFINITY), Value::Null);
    }
}
