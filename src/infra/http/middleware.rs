//! Per-request span, request id and outcome logging.

use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, Level, debug, error, info_span, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::identity::REMOTE_USER_HEADER;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const TARGET: &str = "yatube::http::response";

/// Request id and claimed viewer, available to handlers as an extension.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub viewer: Option<String>,
}

impl RequestContext {
    fn from_request(request: &Request<Body>) -> Self {
        let viewer = request
            .headers()
            .get(REMOTE_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Self {
            request_id: Uuid::new_v4(),
            viewer,
        }
    }
}

pub async fn trace_requests(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::from_request(&request);
    let method = request.method().clone();
    let uri = request.uri().clone();
    request.extensions_mut().insert(ctx.clone());

    let span = info_span!(
        "request",
        request_id = %ctx.request_id,
        method = %method,
        path = %uri.path(),
        viewer = ctx.viewer.as_deref().unwrap_or("anonymous"),
    );

    let start = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    let elapsed_ms = start.elapsed().as_millis();

    span.in_scope(|| log_outcome(&mut response, uri.query().unwrap_or(""), elapsed_ms));

    if let Ok(value) = HeaderValue::from_str(&ctx.request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

fn log_outcome(response: &mut Response, query: &str, elapsed_ms: u128) {
    let status = response.status().as_u16();
    let Some(level) = outcome_level(status) else {
        debug!(target = TARGET, status, elapsed_ms, "request served");
        return;
    };

    let (source, messages) = response
        .extensions_mut()
        .remove::<ErrorReport>()
        .map(|report| (report.source, report.messages))
        .unwrap_or(("unknown", Vec::new()));
    let detail = messages.first().map(String::as_str).unwrap_or("-");
    if level == Level::ERROR {
        error!(
            target = TARGET,
            status,
            query,
            elapsed_ms,
            source,
            detail,
            chain = ?messages,
            "request failed"
        );
    } else {
        warn!(
            target = TARGET,
            status,
            query,
            elapsed_ms,
            source,
            detail,
            "client request error"
        );
    }
}

/// `None` for responses that are only worth a debug line.
fn outcome_level(status: u16) -> Option<Level> {
    match status {
        500.. => Some(Level::ERROR),
        400..=499 => Some(Level::WARN),
        _ => None,
    }
}
