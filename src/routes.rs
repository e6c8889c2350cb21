//! Route table construction.
//!
//! Validates caller-supplied route settings and builds the immutable
//! exact-path table the server dispatches on.

use crate::error::{ValidationError, Violation};
use hyper::header::HeaderValue;
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use tracing::debug;

/// Required fields, in validation order.
const REQUIRED_FIELDS: [(&str, FieldKind); 4] = [
    ("url", FieldKind::String),
    ("status_code", FieldKind::Integer),
    ("content_type", FieldKind::String),
    ("content", FieldKind::String),
];

#[derive(Clone, Copy)]
enum FieldKind {
    String,
    Integer,
}

impl FieldKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Integer => value.as_number().is_some_and(is_integer),
        }
    }

    fn expected(self) -> &'static str {
        match self {
            FieldKind::String => "a string",
            FieldKind::Integer => "an integer",
        }
    }
}

/// Integers of any size; numbers keep their written form.
fn is_integer(number: &Number) -> bool {
    !number.to_string().contains(['.', 'e', 'E'])
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if !is_integer(n) => "a float",
        Value::Number(_) => "an integer",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One route as supplied by the caller.
///
/// Extra keys are ignored when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSetting {
    /// Request path; a leading `/` is added if missing
    pub url: String,
    /// HTTP status code to answer with
    pub status_code: u16,
    /// Value of the `Content-Type` response header
    pub content_type: String,
    /// Response body
    pub content: String,
}

impl RouteSetting {
    pub fn new(
        url: impl Into<String>,
        status_code: u16,
        content_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            status_code,
            content_type: content_type.into(),
            content: content.into(),
        }
    }
}

/// A validated, normalized route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    path: String,
    status: StatusCode,
    content_type: String,
    content_type_header: HeaderValue,
    content: String,
}

impl RouteSpec {
    /// Normalized path, always starting with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub(crate) fn content_type_header(&self) -> &HeaderValue {
        &self.content_type_header
    }

    /// Configured body, before any JSON re-serialization.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether the body is parsed and re-serialized as JSON.
    pub fn is_json(&self) -> bool {
        self.content_type.contains("json")
    }
}

/// Route fields after type checks, before value checks.
struct Candidate<'a> {
    index: usize,
    url: &'a str,
    /// Status code as written
    status_code: String,
    content_type: &'a str,
    content: &'a str,
}

impl<'a> Candidate<'a> {
    /// `None` if any required field is absent or mistyped.
    fn from_map(index: usize, map: &'a Map<String, Value>) -> Option<Self> {
        let status_code = map
            .get("status_code")?
            .as_number()
            .filter(|number| is_integer(number))?;
        Some(Candidate {
            index,
            url: map.get("url")?.as_str()?,
            status_code: status_code.to_string(),
            content_type: map.get("content_type")?.as_str()?,
            content: map.get("content")?.as_str()?,
        })
    }

    fn check(&self, violations: &mut Vec<Violation>) -> Option<RouteSpec> {
        let index = self.index;
        let mut valid = true;

        if self.url.is_empty() {
            violations.push(Violation::EmptyField { index, field: "url" });
            valid = false;
        }

        // hyper never sends a 1xx as the final response
        let status = self
            .status_code
            .parse::<u16>()
            .ok()
            .filter(|code| (200..=599).contains(code))
            .and_then(|code| StatusCode::from_u16(code).ok());
        if status.is_none() {
            violations.push(Violation::InvalidStatusCode {
                index,
                value: self.status_code.clone(),
            });
            valid = false;
        }

        let header = if self.content_type.is_empty() {
            violations.push(Violation::EmptyField {
                index,
                field: "content_type",
            });
            None
        } else {
            let header = HeaderValue::from_str(self.content_type).ok();
            if header.is_none() {
                violations.push(Violation::InvalidContentType {
                    index,
                    value: self.content_type.to_string(),
                });
            }
            header
        };

        match (valid, status, header) {
            (true, Some(status), Some(content_type_header)) => Some(RouteSpec {
                path: normalize_path(self.url),
                status,
                content_type: self.content_type.to_string(),
                content_type_header,
                content: self.content.to_string(),
            }),
            _ => None,
        }
    }
}

fn normalize_path(url: &str) -> String {
    if url.starts_with('/') {
        url.to_string()
    } else {
        format!("/{}", url)
    }
}

/// Immutable table of routes keyed by exact path.
///
/// Keeps the input order; when two routes share a path the later one
/// answers requests.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteSpec>,
    index: HashMap<String, usize>,
}

impl RouteTable {
    /// Build a table from untyped records (JSON objects).
    ///
    /// Checks every required field across all records before moving to
    /// the next field, and reports every violation found.
    pub fn from_values(records: &[Value]) -> Result<Self, ValidationError> {
        let mut violations = Vec::new();

        for (index, record) in records.iter().enumerate() {
            if !record.is_object() {
                violations.push(Violation::NotAnObject {
                    index,
                    found: type_name(record),
                });
            }
        }

        for (field, kind) in REQUIRED_FIELDS {
            for (index, record) in records.iter().enumerate() {
                let Some(map) = record.as_object() else {
                    continue;
                };
                match map.get(field) {
                    None => violations.push(Violation::MissingField { index, field }),
                    Some(value) if !kind.accepts(value) => {
                        violations.push(Violation::TypeMismatch {
                            index,
                            field,
                            expected: kind.expected(),
                            found: type_name(value),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        let routes: Vec<RouteSpec> = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| Candidate::from_map(index, record.as_object()?))
            .filter_map(|candidate| candidate.check(&mut violations))
            .collect();

        if !violations.is_empty() {
            return Err(ValidationError::new(violations));
        }
        Ok(Self::from_specs(routes))
    }

    /// Build a table from typed settings.
    pub fn build(settings: &[RouteSetting]) -> Result<Self, ValidationError> {
        let mut violations = Vec::new();

        let routes: Vec<RouteSpec> = settings
            .iter()
            .enumerate()
            .filter_map(|(index, setting)| {
                Candidate {
                    index,
                    url: &setting.url,
                    status_code: setting.status_code.to_string(),
                    content_type: &setting.content_type,
                    content: &setting.content,
                }
                .check(&mut violations)
            })
            .collect();

        if !violations.is_empty() {
            return Err(ValidationError::new(violations));
        }
        Ok(Self::from_specs(routes))
    }

    fn from_specs(routes: Vec<RouteSpec>) -> Self {
        let mut index = HashMap::with_capacity(routes.len());
        for (i, route) in routes.iter().enumerate() {
            if index.insert(route.path.clone(), i).is_some() {
                debug!(path = %route.path, "Route overrides an earlier definition");
            }
        }
        Self { routes, index }
    }

    /// Route answering requests for `path`, if any.
    pub fn lookup(&self, path: &str) -> Option<&RouteSpec> {
        self.index.get(path).map(|&i| &self.routes[i])
    }

    /// Number of configured routes, overridden ones included.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &RouteSpec> {
        self.routes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_records() -> Vec<Value> {
        vec![
            json!({
                "url": "/path1",
                "status_code": 200,
                "content_type": "application/json",
                "content": r#"{"foo": "bar"}"#
            }),
            json!({
                "url": "path2",
                "status_code": 404,
                "content_type": "text/html",
                "content": "Page not found"
            }),
        ]
    }

    #[test]
    fn test_build_from_values() {
        let table = RouteTable::from_values(&valid_records()).unwrap();
        assert_eq!(table.len(), 2);

        let first = table.lookup("/path1").unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.content_type(), "application/json");
        assert!(first.is_json());

        let second = table.lookup("/path2").unwrap();
        assert_eq!(second.status(), StatusCode::NOT_FOUND);
        assert_eq!(second.content(), "Page not found");
        assert!(!second.is_json());
    }

    #[test]
    fn test_path_normalization() {
        let table = RouteTable::from_values(&valid_records()).unwrap();
        assert!(table.lookup("path2").is_none());
        assert_eq!(table.lookup("/path2").unwrap().path(), "/path2");
    }

    #[test]
    fn test_lookup_is_exact() {
        let table = RouteTable::from_values(&valid_records()).unwrap();
        assert!(table.lookup("/path1/").is_none());
        assert!(table.lookup("/path").is_none());
        assert!(table.lookup("/path1/extra").is_none());
    }

    #[test]
    fn test_missing_field_reported_for_every_record() {
        let records = vec![
            json!({"url": "/a", "content_type": "text/plain", "content": "a"}),
            json!({"url": "/b", "content_type": "text/plain", "content": "b"}),
        ];
        let err = RouteTable::from_values(&records).unwrap_err();

        assert!(err.is_missing("status_code"));
        assert_eq!(
            err.violations(),
            &[
                Violation::MissingField {
                    index: 0,
                    field: "status_code"
                },
                Violation::MissingField {
                    index: 1,
                    field: "status_code"
                },
            ]
        );
    }

    #[test]
    fn test_validation_is_field_major() {
        let records = vec![
            json!({"status_code": 200, "content_type": "text/plain", "content": "a"}),
            json!({"url": "/b", "content_type": "text/plain", "content": "b"}),
            json!({"url": "/c", "status_code": 200, "content_type": "text/plain"}),
        ];
        let err = RouteTable::from_values(&records).unwrap_err();

        let order: Vec<_> = err
            .violations()
            .iter()
            .map(|v| match v {
                Violation::MissingField { index, field } => (*field, *index),
                other => panic!("unexpected violation: {}", other),
            })
            .collect();
        assert_eq!(
            order,
            vec![("url", 0), ("status_code", 1), ("content", 2)]
        );
    }

    #[test]
    fn test_type_mismatch() {
        let records = vec![json!({
            "url": 42,
            "status_code": "200",
            "content_type": "text/plain",
            "content": {"foo": "bar"}
        })];
        let err = RouteTable::from_values(&records).unwrap_err();

        assert_eq!(
            err.violations(),
            &[
                Violation::TypeMismatch {
                    index: 0,
                    field: "url",
                    expected: "a string",
                    found: "an integer"
                },
                Violation::TypeMismatch {
                    index: 0,
                    field: "status_code",
                    expected: "an integer",
                    found: "a string"
                },
                Violation::TypeMismatch {
                    index: 0,
                    field: "content",
                    expected: "a string",
                    found: "an object"
                },
            ]
        );
    }

    #[test]
    fn test_float_status_code_rejected() {
        let records = vec![json!({
            "url": "/a",
            "status_code": 200.5,
            "content_type": "text/plain",
            "content": "a"
        })];
        let err = RouteTable::from_values(&records).unwrap_err();
        assert!(matches!(
            err.violations(),
            [Violation::TypeMismatch {
                field: "status_code",
                found: "a float",
                ..
            }]
        ));
    }

    #[test]
    fn test_non_object_record() {
        let records = vec![json!("not a route"), valid_records().remove(0)];
        let err = RouteTable::from_values(&records).unwrap_err();
        assert_eq!(
            err.violations(),
            &[Violation::NotAnObject {
                index: 0,
                found: "a string"
            }]
        );
    }

    #[test]
    fn test_invalid_values() {
        let records = vec![
            json!({"url": "", "status_code": 200, "content_type": "text/plain", "content": ""}),
            json!({"url": "/a", "status_code": 99, "content_type": "text/plain", "content": ""}),
            json!({"url": "/b", "status_code": 70000, "content_type": "text/plain", "content": ""}),
            json!({"url": "/c", "status_code": -1, "content_type": "", "content": ""}),
            json!({"url": "/d", "status_code": 200, "content_type": "text/\nplain", "content": ""}),
        ];
        let err = RouteTable::from_values(&records).unwrap_err();

        assert_eq!(
            err.violations(),
            &[
                Violation::EmptyField {
                    index: 0,
                    field: "url"
                },
                Violation::InvalidStatusCode {
                    index: 1,
                    value: "99".to_string()
                },
                Violation::InvalidStatusCode {
                    index: 2,
                    value: "70000".to_string()
                },
                Violation::InvalidStatusCode {
                    index: 3,
                    value: "-1".to_string()
                },
                Violation::EmptyField {
                    index: 3,
                    field: "content_type"
                },
                Violation::InvalidContentType {
                    index: 4,
                    value: "text/\nplain".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_extra_keys_ignored() {
        let mut record = valid_records().remove(0);
        record["description"] = json!("ignored");
        assert!(RouteTable::from_values(&[record]).is_ok());
    }

    #[test]
    fn test_empty_settings() {
        let table = RouteTable::from_values(&[]).unwrap();
        assert!(table.is_empty());
        assert!(table.lookup("/").is_none());
    }

    #[test]
    fn test_duplicate_path_last_wins() {
        let settings = vec![
            RouteSetting::new("/dup", 200, "text/plain", "first"),
            RouteSetting::new("dup", 201, "text/plain", "second"),
        ];
        let table = RouteTable::build(&settings).unwrap();

        assert_eq!(table.len(), 2);
        let route = table.lookup("/dup").unwrap();
        assert_eq!(route.content(), "second");
        assert_eq!(route.status(), StatusCode::CREATED);

        let order: Vec<_> = table.iter().map(|r| r.content()).collect();
        assert_eq!(order, vec!["first", "second"]);
    }

    #[test]
    fn test_build_typed_rejects_bad_status() {
        let settings = vec![RouteSetting::new("/a", 600, "text/plain", "")];
        let err = RouteTable::build(&settings).unwrap_err();
        assert_eq!(
            err.violations(),
            &[Violation::InvalidStatusCode {
                index: 0,
                value: "600".to_string()
            }]
        );
    }

    #[test]
    fn test_informational_status_rejected() {
        let records = vec![json!({
            "url": "/early",
            "status_code": 103,
            "content_type": "text/plain",
            "content": ""
        })];
        let err = RouteTable::from_values(&records).unwrap_err();
        assert_eq!(
            err.violations(),
            &[Violation::InvalidStatusCode {
                index: 0,
                value: "103".to_string()
            }]
        );

        let settings = vec![RouteSetting::new("/continue", 100, "text/plain", "")];
        assert!(RouteTable::build(&settings).is_err());
        let settings = vec![RouteSetting::new("/ok", 200, "text/plain", "")];
        assert!(RouteTable::build(&settings).is_ok());
    }

    #[test]
    fn test_huge_status_code_reported_as_written() {
        let records: Vec<Value> = serde_json::from_str(
            r#"[{"url": "/a", "status_code": 123456789012345678901234567890,
                 "content_type": "text/plain", "content": ""}]"#,
        )
        .unwrap();
        let err = RouteTable::from_values(&records).unwrap_err();
        assert_eq!(
            err.violations(),
            &[Violation::InvalidStatusCode {
                index: 0,
                value: "123456789012345678901234567890".to_string()
            }]
        );
    }

    #[test]
    fn test_route_setting_deserialize() {
        let setting: RouteSetting = serde_json::from_value(json!({
            "url": "/xml",
            "status_code": 200,
            "content_type": "text/xml",
            "content": "<foo>bar</foo>",
            "note": "extra"
        }))
        .unwrap();
        assert_eq!(
            setting,
            RouteSetting::new("/xml", 200, "text/xml", "<foo>bar</foo>")
        );
    }
}
