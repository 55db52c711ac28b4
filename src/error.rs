use thiserror::Error;

use crate::model::ODataErrorDetail;

/// Errors returned by ODA client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Base URL is not a valid absolute URL.
    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    /// Endpoint path could not be joined to the base URL.
    #[error("invalid endpoint path '{0}'")]
    InvalidPath(String),

    /// The requested operation id is not present in the generated catalog.
    #[error("unknown ODA operation '{0}'")]
    UnknownOperation(String),

    /// The entity set is not present in the generated catalog.
    #[error("unknown entity set '{0}'")]
    UnknownEntitySet(String),

    /// The navigation property does not exist on the entity set.
    #[error("entity set '{entity_set}' has no navigation '{navigation}'")]
    UnknownNavigation {
        entity_set: String,
        navigation: String,
    },

    /// The navigation property leads to a different entity set than requested.
    #[error("navigation '{navigation}' on '{entity_set}' leads to '{target}', not '{requested}'")]
    NavigationTarget {
        entity_set: String,
        navigation: String,
        target: String,
        requested: String,
    },

    /// A to-one navigation was used as a collection, or the reverse.
    #[error("navigation '{navigation}' on '{entity_set}' is {cardinality}")]
    NavigationCardinality {
        entity_set: String,
        navigation: String,
        cardinality: &'static str,
    },

    /// A required path template parameter was not provided.
    #[error("missing required path parameter '{parameter}' for operation '{operation_id}'")]
    MissingPathParameter {
        operation_id: String,
        parameter: String,
    },

    /// A query option outside the operation's allow-list was supplied.
    #[error("operation '{operation_id}' does not accept query parameter '{parameter}'")]
    UnsupportedQueryParameter {
        operation_id: String,
        parameter: String,
    },

    /// A field declared as a date could not be parsed as ISO-8601.
    #[error("invalid date at '{pointer}': '{value}'")]
    InvalidDate { pointer: String, value: String },

    /// The response did not have the shape the date descriptors expect.
    #[error("expected {expected} at '{pointer}'")]
    UnexpectedShape {
        pointer: String,
        expected: &'static str,
    },

    /// HTTP transport-layer request failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Response body could not be parsed as JSON, or JSON did not match the
    /// expected type.
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success HTTP status with an OData error envelope.
    #[error("service returned status {status}: [{}] {}", .detail.code, .detail.message.value)]
    Service {
        status: reqwest::StatusCode,
        detail: ODataErrorDetail,
    },

    /// Non-success HTTP status with any other payload.
    #[error("server returned status {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
}

impl ClientError {
    /// Returns the HTTP status for errors produced by a non-success response.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::Service { status, .. } | Self::HttpStatus { status, .. } => Some(*status),
            Self::Request(error) => error.status(),
            _ => None,
        }
    }
}
