use mcp_core::ErrorData;
use serde_json::json;
use thiserror::Error;

use crate::registry::CapabilityClass;
use crate::schema::ValidationError;

pub type BoxError = Box<dyn std::error::Error + Sync + Send>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("Line exceeds the maximum frame length")]
    LineTooLong,

    #[error("Invalid UTF-8 sequence")]
    Utf8,
}

impl TransportError {
    /// Whether the loop can answer this error and keep reading.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TransportError::Io(_))
    }

    pub fn into_error_data(self) -> ErrorData {
        match self {
            TransportError::Json(_) | TransportError::Utf8 | TransportError::LineTooLong => {
                ErrorData::parse_error(self.to_string(), None)
            }
            TransportError::InvalidMessage(_) => ErrorData::invalid_request(self.to_string(), None),
            TransportError::Io(_) => ErrorData::internal_error(self.to_string(), None),
        }
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Per-request failures, converted into a JSON-RPC error at the dispatch boundary.
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Unknown {class}: {name}")]
    UnknownCapability { class: CapabilityClass, name: String },

    #[error(transparent)]
    InvalidArguments(#[from] ValidationError),

    /// Raised by a capability handler; the message is passed through untouched.
    #[error("{0}")]
    Handler(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RouterError {
    pub fn handler(error: impl Into<BoxError>) -> Self {
        RouterError::Handler(error.into().to_string())
    }
}

impl From<RouterError> for ErrorData {
    fn from(err: RouterError) -> Self {
        let message = err.to_string();
        match err {
            RouterError::MethodNotFound(method) => ErrorData::method_not_found(&method),
            RouterError::InvalidParams(_) => {
                ErrorData::invalid_params(message, Some(json!({ "kind": "invalid_params" })))
            }
            RouterError::UnknownCapability { class, name } => {
                let data = Some(json!({
                    "kind": "unknown_capability",
                    "class": class.as_str(),
                    "name": name,
                }));
                match class {
                    CapabilityClass::Resource => ErrorData::resource_not_found(message, data),
                    CapabilityClass::Tool | CapabilityClass::Prompt => {
                        ErrorData::invalid_params(message, data)
                    }
                }
            }
            RouterError::InvalidArguments(validation) => ErrorData::invalid_params(
                message,
                Some(json!({
                    "kind": "invalid_arguments",
                    "fields": validation.issues,
                })),
            ),
            RouterError::Handler(_) => {
                ErrorData::internal_error(message, Some(json!({ "kind": "handler_error" })))
            }
            RouterError::Internal(_) => {
                ErrorData::internal_error(message, Some(json!({ "kind": "internal_error" })))
            }
        }
    }
}

/// Registration-time failures. Any of these aborts startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate {class} name: {name}")]
    DuplicateName { class: CapabilityClass, name: String },

    #[error("Template of {name} does not render: {reason}")]
    InvalidTemplate { name: String, reason: String },

    #[error("Input schema of {name} does not compile: {reason}")]
    InvalidSchema { name: String, reason: String },
}
