/// Errors that can occur in the data layer.
///
/// The first four variants are structural: they point at a broken schema
/// declaration and are raised the first time a schema type is analyzed or a
/// statement template is built. `NotFound` and `Argument` are per-call
/// errors. `Database` wraps whatever the session backend reports.
#[derive(Debug)]
pub enum DataError {
    /// A schema type could not be resolved to a storage entity.
    Resolution(String),
    /// An entity attribute is neither a plain column nor a relationship.
    UnsupportedAttribute { entity: String, attribute: String },
    /// A statement template failed validation.
    Build(String),
    /// The requested behavior is deliberately unsupported.
    NotImplemented(String),
    NotFound(String),
    /// The caller passed an ambiguous or conflicting set of arguments.
    Argument(String),
    /// A row or payload could not be converted to or from a schema type.
    Serialization(serde_json::Error),
    Config(String),
    Database(Box<dyn std::error::Error + Send + Sync>),
    Other(String),
}

impl DataError {
    /// Construct a `Database` variant from any error type.
    ///
    /// Used by backend crates (e.g. `tabula-data-sqlx`) to wrap
    /// driver-specific errors.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }

    pub fn unsupported_attribute(entity: &str, attribute: &str) -> Self {
        DataError::UnsupportedAttribute {
            entity: entity.to_string(),
            attribute: attribute.to_string(),
        }
    }

    /// Errors that indicate a misconfigured schema rather than a runtime condition.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DataError::Resolution(_)
                | DataError::UnsupportedAttribute { .. }
                | DataError::Build(_)
                | DataError::NotImplemented(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DataError::NotFound(_))
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::Resolution(msg) => write!(f, "Resolution error: {msg}"),
            DataError::UnsupportedAttribute { entity, attribute } => {
                write!(f, "Unsupported attribute '{attribute}' on entity {entity}")
            }
            DataError::Build(msg) => write!(f, "Statement build error: {msg}"),
            DataError::NotImplemented(msg) => write!(f, "Not implemented: {msg}"),
            DataError::NotFound(msg) => write!(f, "Not found: {msg}"),
            DataError::Argument(msg) => write!(f, "Invalid arguments: {msg}"),
            DataError::Serialization(err) => write!(f, "Serialization error: {err}"),
            DataError::Config(msg) => write!(f, "Data config error: {msg}"),
            DataError::Database(err) => write!(f, "Database error: {err}"),
            DataError::Other(msg) => write!(f, "Data error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Serialization(err) => Some(err),
            DataError::Database(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Serialization(err)
    }
}
