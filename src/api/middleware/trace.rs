use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::{info_span, Instrument};
use uuid::Uuid;

/// HTTP header name for trace ID
pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

/// Longest caller-supplied trace ID that is reused as-is
const MAX_INBOUND_TRACE_ID: usize = 64;

/// Middleware that tags every request with a trace ID.
///
/// A well-formed `X-Trace-Id` sent by the caller (a proxy, usually) is kept;
/// otherwise a UUID v4 is generated. The ID goes into request extensions,
/// into the span wrapping every log line of the request, and back out in the
/// response headers.
pub async fn trace_id_middleware(mut request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| is_acceptable_trace_id(value))
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    request.extensions_mut().insert(TraceId(trace_id.clone()));

    let mut response = async move {
        let started = std::time::Instant::now();
        let response = next.run(request).await;
        tracing::info!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
        response
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }

    response
}

fn is_acceptable_trace_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_INBOUND_TRACE_ID
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Extension type for storing trace ID in request extensions
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
