//! Response rendering for configured routes.

use crate::error::MalformedJsonError;
use crate::routes::RouteSpec;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use tracing::warn;

/// Body type of every response the server sends.
pub type Body = Full<Bytes>;

/// Render the body of a route.
///
/// JSON content types (any containing `json`) have their content parsed
/// and re-serialized; everything else is sent verbatim.
pub fn render_body(route: &RouteSpec) -> Result<Bytes, MalformedJsonError> {
    if !route.is_json() {
        return Ok(Bytes::from(route.content().to_owned()));
    }

    reserialize(route.content())
        .map(Bytes::from)
        .map_err(|source| MalformedJsonError {
            path: route.path().to_string(),
            source,
        })
}

fn reserialize(content: &str) -> serde_json::Result<Vec<u8>> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    serde_json::to_vec(&value)
}

/// Build the response for a configured route.
///
/// Malformed JSON content yields a 500 for this request only.
pub fn respond(route: &RouteSpec) -> Response<Body> {
    match render_body(route) {
        Ok(body) => {
            let mut response = Response::new(Full::new(body));
            *response.status_mut() = route.status();
            response
                .headers_mut()
                .insert(CONTENT_TYPE, route.content_type_header().clone());
            response
        }
        Err(err) => {
            warn!(path = %err.path, error = %err.source, "Route has malformed JSON content");
            plain(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

/// Response for a path with no configured route.
pub fn not_found(path: &str) -> Response<Body> {
    let body = serde_json::json!({
        "error": "not_found",
        "message": format!("No route configured for {}", path),
    });

    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn plain(status: StatusCode, message: String) -> Response<Body> {
    let mut response = Response::new(Full::new(Bytes::from(message)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
