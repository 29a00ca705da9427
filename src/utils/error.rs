use thiserror::Error;

#[derive(Error, Debug)]
pub enum HcsError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("TIFF decoding error: {0}")]
    TiffError(#[from] tiff::TiffError),

    #[error("Pattern error: {0}")]
    PatternError(#[from] regex::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Worker task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("{path} is not a MetaSeries file")]
    NotMetaSeriesError { path: String },

    #[error("Missing metadata '{key}' in {path}")]
    MissingMetadataError { path: String, key: String },

    #[error("Invalid metadata value '{value}' for '{key}': {reason}")]
    InvalidMetadataError {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Inconsistent metadata: {message}")]
    InconsistentMetadataError { message: String },

    #[error("Plate layout {0} is not supported")]
    UnsupportedLayoutError(String),

    #[error("Spatial unit '{0}' is not supported")]
    UnsupportedUnitError(String),

    #[error("Pixel type '{0}' is not supported")]
    UnsupportedPixelTypeError(String),

    #[error("Plate already exists: {path}")]
    PlateExistsError { path: String },

    #[error("Files belong to more than one plate: {names:?}")]
    MultiplePlatesError { names: Vec<String> },

    #[error("Well {well} is outside of the {layout}-well layout")]
    WellOutOfLayoutError { well: String, layout: u32 },

    #[error("Shape mismatch: {message}")]
    ShapeMismatchError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Configuration,
    Metadata,
    Layout,
    Processing,
    Runtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl HcsError {
    pub fn processing(message: impl Into<String>) -> Self {
        HcsError::ProcessingError {
            message: message.into(),
        }
    }

    pub fn inconsistent(message: impl Into<String>) -> Self {
        HcsError::InconsistentMetadataError {
            message: message.into(),
        }
    }

    pub fn shape_mismatch(message: impl Into<String>) -> Self {
        HcsError::ShapeMismatchError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            HcsError::IoError(_) | HcsError::CsvError(_) | HcsError::SerializationError(_) => {
                ErrorCategory::Io
            }
            HcsError::ConfigValidationError { .. }
            | HcsError::InvalidConfigValueError { .. }
            | HcsError::TomlError(_)
            | HcsError::PatternError(_) => ErrorCategory::Configuration,
            HcsError::TiffError(_)
            | HcsError::NotMetaSeriesError { .. }
            | HcsError::MissingMetadataError { .. }
            | HcsError::InvalidMetadataError { .. }
            | HcsError::InconsistentMetadataError { .. }
            | HcsError::UnsupportedPixelTypeError(_)
            | HcsError::UnsupportedUnitError(_) => ErrorCategory::Metadata,
            HcsError::UnsupportedLayoutError(_)
            | HcsError::PlateExistsError { .. }
            | HcsError::MultiplePlatesError { .. }
            | HcsError::WellOutOfLayoutError { .. } => ErrorCategory::Layout,
            HcsError::ShapeMismatchError { .. }
            | HcsError::ProcessingError { .. }
            | HcsError::ValidationError { .. } => ErrorCategory::Processing,
            HcsError::TaskError(_) => ErrorCategory::Runtime,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Layout => ErrorSeverity::High,
            ErrorCategory::Metadata => ErrorSeverity::High,
            ErrorCategory::Processing => ErrorSeverity::Medium,
            ErrorCategory::Io => ErrorSeverity::Critical,
            ErrorCategory::Runtime => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            HcsError::PlateExistsError { path } => {
                format!("Remove {} or choose another plate name", path)
            }
            HcsError::MultiplePlatesError { .. } => {
                "Point the acquisition directory at a single plate".to_string()
            }
            HcsError::UnsupportedLayoutError(_) => "Use a 96 or 384 well layout".to_string(),
            HcsError::WellOutOfLayoutError { .. } => {
                "Check that the plate layout matches the acquired wells".to_string()
            }
            HcsError::NotMetaSeriesError { .. } | HcsError::MissingMetadataError { .. } => {
                "Only MetaSeries TIFFs written by ImageXpress systems can be converted".to_string()
            }
            HcsError::InconsistentMetadataError { .. } => {
                "Fields of one channel were acquired with different settings; convert them separately"
                    .to_string()
            }
            HcsError::ShapeMismatchError { .. } => {
                "Try the stage-position montage strategy".to_string()
            }
            _ => match self.category() {
                ErrorCategory::Configuration => {
                    "Check the configuration file and command line arguments".to_string()
                }
                ErrorCategory::Io => {
                    "Check that the paths exist and are readable/writable".to_string()
                }
                ErrorCategory::Metadata => "Inspect the image metadata of the input files".to_string(),
                ErrorCategory::Layout => "Check the plate layout settings".to_string(),
                ErrorCategory::Processing => "Re-run with --verbose for details".to_string(),
                ErrorCategory::Runtime => "Re-run the conversion".to_string(),
            },
        }
    }

    pub fn user_friendly_message(&self) -> String {
        let prefix = match self.category() {
            ErrorCategory::Io => "File access failed",
            ErrorCategory::Configuration => "Configuration problem",
            ErrorCategory::Metadata => "Unreadable acquisition metadata",
            ErrorCategory::Layout => "Plate layout problem",
            ErrorCategory::Processing => "Conversion failed",
            ErrorCategory::Runtime => "Internal failure",
        };
        format!("{}: {}", prefix, self)
    }
}

pub type Result<T> = std::result::Result<T, HcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_errors_are_high_severity() {
        let err = HcsError::UnsupportedLayoutError("24".to_string());
        assert_eq!(err.category(), ErrorCategory::Layout);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.user_friendly_message().contains("24"));
    }

    #[test]
    fn test_io_errors_are_critical() {
        let err: HcsError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.recovery_suggestion().contains("paths"));
    }
}
