//! Chameleon Mock Server
//!
//! A declaratively configured mock HTTP server for test suites. Give it a
//! list of routes (path, status code, content type, body) and it serves
//! those canned responses on a background task until stopped.
//!
//! # Features
//!
//! - **Exact-path routes**: Any HTTP method on a configured path gets its response
//! - **JSON normalization**: JSON content types are parsed and re-serialized
//! - **Exhaustive validation**: Every bad field in every route is reported at once
//! - **Explicit lifecycle**: `start` returns a handle; `stop` frees the port
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> Result<(), chameleon::Error> {
//! let settings = vec![serde_json::json!({
//!     "url": "/path1",
//!     "status_code": 200,
//!     "content_type": "application/json",
//!     "content": r#"{"foo": "bar"}"#,
//! })];
//!
//! let server = chameleon::start(&settings, 7001).await?;
//! // ... exercise the code under test against server.url("/path1") ...
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod response;
pub mod routes;
pub mod server;

pub use config::{ConfigError, MockServerConfig};
pub use error::{Error, MalformedJsonError, ValidationError, Violation};
pub use routes::{RouteSetting, RouteSpec, RouteTable};
pub use server::{start, MockServer, ServerHandle, DEFAULT_PORT};
