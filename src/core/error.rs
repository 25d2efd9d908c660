use thiserror::Error;

use super::config::Environment;

/// Errors that can occur while building, signing or sending NFSe requests.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NfseError {
    /// The municipality code is not present in the registry.
    #[error("no web service parameters registered for municipality {0}")]
    UnknownMunicipality(String),

    /// The registry entry has no URL for the configured environment.
    #[error("no URL registered for the {environment} environment of municipality {municipality}")]
    MissingEndpointForEnvironment {
        municipality: String,
        environment: Environment,
    },

    /// More RPS than the standard accepts in a single batch.
    #[error("batch holds {count} RPS, the limit is {limit} per batch")]
    BatchSizeExceeded { count: usize, limit: usize },

    /// The composed request does not conform to the message schema.
    #[error("schema validation failed: {}", join_errors(.0))]
    SchemaValidationFailed(Vec<ValidationError>),

    /// Network error, HTTP error status or SOAP fault.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// The request parameters are inconsistent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Malformed client configuration or registry table.
    #[error("configuration error: {0}")]
    Config(String),

    /// The certificate bundle could not be read.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// The XML-DSig signature could not be produced.
    #[error("signing error: {0}")]
    Signing(String),

    /// XML generation or parsing error.
    #[error("XML error: {0}")]
    Xml(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single schema violation with element path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Slash-separated path to the offending element (e.g. "GerarNfseEnvio/Rps/InfRps").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
