//! Common error types used across the plot annotator crates

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy for annotation and chart operations
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum AnnotateError {
    #[error("Chart is not initialized")]
    NotInitialized,

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Unsupported shape type: {kind}")]
    UnsupportedShapeType { kind: String },

    #[error("Shape not found: {id}")]
    ShapeNotFound { id: String },

    #[error("Shape type mismatch: expected {expected} but got {actual}")]
    ShapeTypeMismatch { expected: String, actual: String },

    #[error("A drawing session is already active")]
    DrawingInProgress,

    // Plotting / legend library failures
    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("JavaScript interop error: {message}")]
    JsInterop { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl AnnotateError {
    pub fn invalid(message: impl Into<String>) -> Self {
        AnnotateError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        AnnotateError::Backend {
            message: message.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        AnnotateError::ShapeNotFound { id: id.into() }
    }
}

/// Result type alias for annotator operations
pub type AnnotateResult<T> = Result<T, AnnotateError>;

/// Error response structure for JavaScript interop
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: AnnotateError,
    pub timestamp: u64,
    pub context: Option<ErrorContext>,
}

/// Additional context for error reporting
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorContext {
    pub component: String,
    pub operation: String,
}

impl ErrorResponse {
    pub fn new(error: AnnotateError) -> Self {
        Self {
            success: false,
            error,
            timestamp: chrono::Utc::now().timestamp_millis() as u64,
            context: None,
        }
    }

    pub fn with_context(mut self, component: &str, operation: &str) -> Self {
        self.context = Some(ErrorContext {
            component: component.to_string(),
            operation: operation.to_string(),
        });
        self
    }

    /// Convert to JSON string for JavaScript
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"success":false,"error":{"type":"Serialization","details":{"message":"Failed to serialize error"}}}"#.to_string()
        })
    }
}

impl From<serde_json::Error> for AnnotateError {
    fn from(err: serde_json::Error) -> Self {
        AnnotateError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "wasm-bindgen")]
impl From<wasm_bindgen::JsValue> for AnnotateError {
    fn from(err: wasm_bindgen::JsValue) -> Self {
        AnnotateError::JsInterop {
            message: format!("{err:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = AnnotateError::not_found("shape_42");
        let response = ErrorResponse::new(error).with_context("ContourChart", "locate_shape_by_id");

        let json = response.to_json();
        assert!(json.contains("ShapeNotFound"));
        assert!(json.contains("shape_42"));
        assert!(json.contains("locate_shape_by_id"));
    }

    #[test]
    fn test_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: AnnotateError = parse_err.into();

        match err {
            AnnotateError::Serialization { message } => assert!(!message.is_empty()),
            _ => panic!("Wrong error variant"),
        }
    }

    #[test]
    fn test_display() {
        let err = AnnotateError::ShapeTypeMismatch {
            expected: "polygon".to_string(),
            actual: "point".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Shape type mismatch: expected polygon but got point"
        );
    }
}
