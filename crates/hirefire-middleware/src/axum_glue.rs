//! axum adapter.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::error::MiddlewareError;
use crate::hirefire::HireFire;
use crate::process::{InfoResponse, process};
use crate::request::RequestInfo;

/// Middleware for `axum::middleware::from_fn_with_state`.
pub async fn hirefire_middleware(
    State(hirefire): State<Arc<HireFire>>,
    request: Request,
    next: Next,
) -> Response {
    let info = RequestInfo::from_parts(request.uri().path(), request.headers());

    match process(&hirefire, &info).await {
        Ok(None) => next.run(request).await,
        Ok(Some(response)) => info_response(&response),
        Err(e) => error_response(&e),
    }
}

fn info_response(info: &InfoResponse) -> Response {
    let body = match info.body() {
        Ok(body) => body,
        Err(e) => return error_response(&e),
    };

    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    for (name, value) in info.headers() {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => error!(header = name, "invalid hirefire response header"),
        }
    }
    response
}

fn error_response(e: &MiddlewareError) -> Response {
    error!(error = %e, "hirefire info request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
        .into_response()
}
