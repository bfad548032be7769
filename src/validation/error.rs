//! Field-level validation errors.

use serde::{Deserialize, Serialize};

/// Machine-readable reason a value was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldErrorCode {
    RequiredFieldMissing,
    InvalidType,
    TooSmall,
    TooBig,
    PatternMismatch,
    InvalidFormat,
    InvalidEnumValue,
    NotInteger,
    PrecisionExceeded,
    DuplicateItems,
    UnexpectedFields,
    InvalidDate,
    InvalidTimezone,
    InvalidUrl,
    InvalidMimeType,
    FileTooLarge,
    MaxDepthExceeded,
    CrossFieldValidationFailed,
}

impl FieldErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequiredFieldMissing => "REQUIRED_FIELD_MISSING",
            Self::InvalidType => "INVALID_TYPE",
            Self::TooSmall => "TOO_SMALL",
            Self::TooBig => "TOO_BIG",
            Self::PatternMismatch => "PATTERN_MISMATCH",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::InvalidEnumValue => "INVALID_ENUM_VALUE",
            Self::NotInteger => "NOT_INTEGER",
            Self::PrecisionExceeded => "PRECISION_EXCEEDED",
            Self::DuplicateItems => "DUPLICATE_ITEMS",
            Self::UnexpectedFields => "UNEXPECTED_FIELDS",
            Self::InvalidDate => "INVALID_DATE",
            Self::InvalidTimezone => "INVALID_TIMEZONE",
            Self::InvalidUrl => "INVALID_URL",
            Self::InvalidMimeType => "INVALID_MIME_TYPE",
            Self::FileTooLarge => "FILE_TOO_LARGE",
            Self::MaxDepthExceeded => "MAX_DEPTH_EXCEEDED",
            Self::CrossFieldValidationFailed => "CROSS_FIELD_VALIDATION_FAILED",
        }
    }
}

impl std::fmt::Display for FieldErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step in the path to a failing value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// A single validation failure.
///
/// Messages describe the constraint, never the offending value, so errors are
/// safe to return even for sensitive fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub code: FieldErrorCode,
    /// Location within the document. Empty for schema-level errors.
    pub path: Vec<PathSegment>,
    pub message: String,
}

impl FieldError {
    pub fn new(code: FieldErrorCode, path: &[PathSegment], message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.to_vec(),
            message: message.into(),
        }
    }

    /// Render the path as `user.addresses[0].zip`.
    pub fn path_string(&self) -> String {
        format_path(&self.path)
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.code, self.message)
        } else {
            write!(f, "{} at {}: {}", self.code, self.path_string(), self.message)
        }
    }
}

pub(crate) fn format_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathSegment::Index(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_rendering() {
        let err = FieldError::new(
            FieldErrorCode::TooSmall,
            &["user".into(), "addresses".into(), 0usize.into(), "zip".into()],
            "too short",
        );
        assert_eq!(err.path_string(), "user.addresses[0].zip");
        assert_eq!(err.to_string(), "TOO_SMALL at user.addresses[0].zip: too short");
    }

    #[test]
    fn test_serialized_shape() {
        let err = FieldError::new(
            FieldErrorCode::RequiredFieldMissing,
            &["items".into(), 2usize.into()],
            "required",
        );
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"code": "REQUIRED_FIELD_MISSING", "path": ["items", 2], "message": "required"})
        );
    }
}
