use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Failed to find field {pattern} in schema")]
    FieldNotFound { pattern: String },

    #[error("Resource '{resource}', row {row}, field '{field}': {message}")]
    ValidationError {
        resource: String,
        row: usize,
        field: String,
        message: String,
    },

    #[error("Stage '{stage}' failed: {details}")]
    TransformationError { stage: String, details: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Io,
    Data,
    Schema,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::PatternError(_) => ErrorCategory::Configuration,
            EtlError::ApiError(_) => ErrorCategory::Network,
            EtlError::IoError(_) | EtlError::ZipError(_) => ErrorCategory::Io,
            EtlError::FieldNotFound { .. } | EtlError::ValidationError { .. } => {
                ErrorCategory::Schema
            }
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::TransformationError { .. }
            | EtlError::ProcessingError { .. } => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Schema | ErrorCategory::Data => {
                ErrorSeverity::High
            }
            ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::FieldNotFound { .. } => {
                "Check the field name pattern and the `resources` selector of the set_type step"
            }
            EtlError::ValidationError { .. } => {
                "Fix the source data or set `on_error` to ignore, drop or clear"
            }
            EtlError::PatternError(_) => {
                "Escape special characters or set `regex = false` to match the name literally"
            }
            EtlError::ApiError(_) => "Check the source URL and network connectivity, then retry",
            EtlError::CsvError(_) => "Make sure the CSV source has a header row and consistent columns",
            EtlError::SerializationError(_) => "Make sure the JSON source is an array of objects",
            EtlError::IoError(_) | EtlError::ZipError(_) => {
                "Check that the paths exist and are writable"
            }
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => "Review the flow configuration file",
            EtlError::TransformationError { .. } | EtlError::ProcessingError { .. } => {
                "Run again with --verbose to see which step failed"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Network => format!("Could not fetch a source: {}", self),
            ErrorCategory::Io => format!("File system problem: {}", self),
            ErrorCategory::Schema => format!("Schema problem: {}", self),
            ErrorCategory::Data => format!("Data problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
