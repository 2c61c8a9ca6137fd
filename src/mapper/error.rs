use thiserror::Error;

/// Errors raised while mapping between types
///
/// A failed mapping never yields a target value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// A value had the wrong shape for its declared field kind
    #[error("{path}: expected {expected}, found {found}")]
    Shape {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The source did not serialize to a key-value record
    #[error("{type_name} is not a record (found {found})")]
    NotARecord {
        type_name: &'static str,
        found: &'static str,
    },

    #[error("could not serialize {type_name}: {message}")]
    Serialize {
        type_name: &'static str,
        message: String,
    },

    /// The mapped record could not be turned into the target type
    #[error("could not build {target}: {message}")]
    Build {
        target: &'static str,
        message: String,
    },

    /// A rule was registered for a field the target does not declare
    #[error("{target} has no field '{field}'")]
    UnknownField { target: &'static str, field: String },
}
