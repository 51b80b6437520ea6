//! Domain error types.

/// Top-level error type for gtauto.
#[derive(Debug, thiserror::Error)]
pub enum GtaError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no {kind} configuration matches id `{id}` in env `{env}`")]
    ConfigLookup {
        kind: String,
        id: String,
        env: String,
    },

    #[error("unsupported {kind} provider `{provider}`")]
    UnsupportedProvider { kind: String, provider: String },

    #[error("invalid column(s) for {table}: `{column}`")]
    NonexistentColumn { table: String, column: String },

    #[error("table `{table}` registered more than once")]
    DuplicateTable { table: String },

    #[error("no {table} record matches the key")]
    NotFound { table: String },

    #[error("{count} {table} records match a key expected to be unique")]
    AmbiguousResult { table: String, count: usize },

    #[error("duplicate key: {reason}")]
    DuplicateKey { reason: String },

    #[error("constraint violation: {reason}")]
    ConstraintViolation { reason: String },

    #[error("connection error: {reason}")]
    Connection { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("`{stored}` is not a member of enum {enum_type}")]
    UnknownEnumMember { enum_type: String, stored: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&GtaError> for std::process::ExitCode {
    fn from(err: &GtaError) -> Self {
        let code: u8 = match err {
            GtaError::Io(_) => 1,
            GtaError::ConfigParse { .. }
            | GtaError::ConfigMissing { .. }
            | GtaError::ConfigInvalid { .. }
            | GtaError::ConfigLookup { .. }
            | GtaError::UnsupportedProvider { .. } => 2,
            GtaError::Connection { .. } | GtaError::DatabaseQuery { .. } => 3,
            GtaError::NonexistentColumn { .. }
            | GtaError::DuplicateTable { .. }
            | GtaError::InvalidQuery { .. }
            | GtaError::UnknownEnumMember { .. } => 4,
            GtaError::NotFound { .. }
            | GtaError::AmbiguousResult { .. }
            | GtaError::DuplicateKey { .. }
            | GtaError::ConstraintViolation { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
