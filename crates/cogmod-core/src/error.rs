//! Error types for cogmod
//!
//! One closed taxonomy for the whole pipeline: callers branch on the kind
//! rather than downcasting. Validation and acquisition failures always
//! surface; the registry client is the only component allowed to degrade
//! instead of returning one of these.

use thiserror::Error;

/// How much raw model output an error may carry for diagnosis.
pub const PREVIEW_LIMIT: usize = 200;

/// A single schema violation, in the order the validation engine reported it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Violation {
    /// JSON pointer into the offending document; empty for the root.
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} at {}", self.message, self.path)
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed descriptor ({file}): {reason}")]
    MalformedDescriptor { file: String, reason: String },

    #[error("{label} validation failed: {}", format_violations(.violations))]
    SchemaViolation {
        label: String,
        violations: Vec<Violation>,
    },

    #[error("acquisition failed: {0}")]
    Acquisition(String),

    #[error("could not parse model response as JSON: {reason}; preview: {preview}")]
    ResponseParse { reason: String, preview: String },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn malformed(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDescriptor {
            file: file.into(),
            reason: reason.into(),
        }
    }

    pub fn acquisition(reason: impl Into<String>) -> Self {
        Self::Acquisition(reason.into())
    }

    /// Response-parse failure with a bounded preview of the raw text.
    pub fn response_parse(reason: impl Into<String>, raw: &str) -> Self {
        let mut preview: String = raw.trim().chars().take(PREVIEW_LIMIT).collect();
        if raw.trim().chars().count() > PREVIEW_LIMIT {
            preview.push_str("...");
        }
        Self::ResponseParse {
            reason: reason.into(),
            preview,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_display_with_and_without_path() {
        let v = Violation {
            path: "/tasks/0/title".into(),
            message: "\"title\" is a required property".into(),
        };
        assert_eq!(v.to_string(), "\"title\" is a required property at /tasks/0/title");

        let root = Violation {
            path: String::new(),
            message: "expected object".into(),
        };
        assert_eq!(root.to_string(), "expected object");
    }

    #[test]
    fn response_parse_preview_is_bounded() {
        let raw = "x".repeat(5000);
        match Error::response_parse("expected value", &raw) {
            Error::ResponseParse { preview, .. } => {
                assert_eq!(preview.len(), PREVIEW_LIMIT + 3);
                assert!(preview.ends_with("..."));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn schema_violation_message_lists_each_violation() {
        let err = Error::SchemaViolation {
            label: "input".into(),
            violations: vec![
                Violation { path: "/a".into(), message: "bad a".into() },
                Violation { path: "/b".into(), message: "bad b".into() },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("input validation failed"));
        assert!(msg.contains("bad a at /a"));
        assert!(msg.contains("bad b at /b"));
    }
}
