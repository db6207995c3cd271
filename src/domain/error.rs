//! Domain error types.

/// Top-level error type for melao.
#[derive(Debug, thiserror::Error)]
pub enum MelaoError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

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

    #[error("unknown asset {code}")]
    UnknownAsset { code: String },

    #[error("fetch failed for {code}: {reason}")]
    Fetch { code: String, reason: String },

    #[error("invalid input data: {reason}")]
    InvalidData { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MelaoError {
    /// Store-level failures halt a run; everything else is recoverable per asset.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MelaoError::Database { .. } | MelaoError::DatabaseQuery { .. }
        )
    }
}

impl From<&MelaoError> for std::process::ExitCode {
    fn from(err: &MelaoError) -> Self {
        let code: u8 = match err {
            MelaoError::Io(_) => 1,
            MelaoError::ConfigParse { .. }
            | MelaoError::ConfigMissing { .. }
            | MelaoError::ConfigInvalid { .. } => 2,
            MelaoError::Database { .. } | MelaoError::DatabaseQuery { .. } => 3,
            MelaoError::Fetch { .. } | MelaoError::InvalidData { .. } => 4,
            MelaoError::UnknownAsset { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
