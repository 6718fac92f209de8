use crate::value::ValueError;

/// Failures reported by a [`Store`](crate::Store) backend.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Condition failed for key: {0}")]
    ConditionFailed(String),
    #[error("Store unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Invalid utf8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("Corrupt item at {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: prost::DecodeError,
    },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable(message.into().into())
    }
}

#[cfg(feature = "tikv")]
impl From<tikv_client::Error> for StoreError {
    fn from(error: tikv_client::Error) -> Self {
        StoreError::Unavailable(Box::new(error))
    }
}

/// Schema declaration errors, raised while building a model or a registry.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Invalid name `{0}`: names must be non-empty and must not contain `#`")]
    InvalidName(String),
    #[error("Model {model} declares field {field} more than once")]
    DuplicateField { model: String, field: String },
    #[error("Model {0} has no unique key field")]
    MissingUniqueKey(String),
    #[error("Model {model} has more than one unique key: {fields:?}")]
    MultipleUniqueKeys { model: String, fields: Vec<String> },
    #[error("Model name {0} is already registered by another type")]
    DuplicateModelName(String),
    #[error("Relation {model}.{field} targets {target}, which is not registered before it")]
    UnregisteredTarget {
        model: String,
        field: String,
        target: String,
    },
    #[error("Relation {model}.{field} holds {kind} values but {target} is keyed by {key_kind}")]
    RelationKindMismatch {
        model: String,
        field: String,
        kind: String,
        target: String,
        key_kind: String,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("Referenced {model} item {key} (via {field}) not found")]
    NotFound {
        model: String,
        field: String,
        key: String,
    },
    #[error("Store error: {0}")]
    Store(StoreError),
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("Unknown field {field} on model {model}")]
    UnknownField { model: String, field: String },
    #[error("Model {0} is not registered with this table")]
    UnregisteredModel(String),
    #[error("Failed to decode {model}.{field}: {source}")]
    Decode {
        model: String,
        field: String,
        #[source]
        source: ValueError,
    },
    #[error("Item {key} belongs to model {found}, expected {expected}")]
    ModelMismatch {
        key: String,
        expected: String,
        found: String,
    },
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// True when the failure came from the store itself (timeouts, throttling,
    /// connection loss) rather than from the engine's own checks.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Store(StoreError::Unavailable(_)))
    }
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ConditionFailed(key) => Error::DuplicateKey(key),
            other => Error::Store(other),
        }
    }
}
