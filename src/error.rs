use thiserror::Error;

use crate::graph::Span;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemporaError {
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Invalid operator {operator}: {message}")]
    InvalidOperator { operator: String, message: String },
    #[error("Unresolved reference: {reference}")]
    UnresolvedReference { reference: String },
    #[error("Cyclic reference through entity {id}")]
    CyclicReference { id: String },
    #[error("Unknown entity type '{type_name}' for entity {id}")]
    UnknownEntityType { id: String, type_name: String },
    #[error("Entity {id} of type {type_name} is missing property '{property}'")]
    MissingProperty { id: String, type_name: String, property: String },
    #[error("Entity {id} is nested more than {limit} references deep")]
    TooDeep { id: String, limit: usize },
    #[error("Duplicate entity id {0}")]
    DuplicateEntity(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Entity {id}{}: {source}", fmt_span(.span))]
    Entity {
        id: String,
        span: Option<Span>,
        #[source]
        source: Box<TemporaError>,
    },
}

impl TemporaError {
    /// The underlying error with any entity context stripped away.
    pub fn kind(&self) -> &TemporaError {
        match self {
            TemporaError::Entity { source, .. } => source.kind(),
            other => other,
        }
    }
    /// The id of the entity the error was attributed to, if any.
    pub fn entity(&self) -> Option<&str> {
        match self {
            TemporaError::Entity { id, .. } => Some(id),
            _ => None,
        }
    }
    pub(crate) fn invalid_operator(operator: &str, message: impl Into<String>) -> Self {
        Self::InvalidOperator { operator: operator.to_owned(), message: message.into() }
    }
    pub(crate) fn unresolved(reference: impl Into<String>) -> Self {
        Self::UnresolvedReference { reference: reference.into() }
    }
}

fn fmt_span(span: &Option<Span>) -> String {
    span.map(|s| format!(" at {s}")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, TemporaError>;

// Helper conversions
impl From<serde_json::Error> for TemporaError {
    fn from(e: serde_json::Error) -> Self { Self::Parse(e.to_string()) }
}
impl From<config::ConfigError> for TemporaError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
