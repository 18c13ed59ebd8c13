use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostError {
    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("Raster error: {0}")]
    RasterError(#[from] tiff::TiffError),

    #[error("Job file error: {0}")]
    JobFileError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required field: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

impl PostError {
    pub fn user_friendly_message(&self) -> String {
        match self {
            PostError::CsvError(e) => format!("A CSV file could not be processed: {}", e),
            PostError::IoError(e) => format!("A file could not be read or written: {}", e),
            PostError::SerializationError(e) => format!("Output could not be serialized: {}", e),
            PostError::SqliteError(e) => format!("A sqlite database could not be queried: {}", e),
            PostError::RasterError(e) => format!("A DEM raster could not be decoded: {}", e),
            PostError::JobFileError(e) => format!("The job file is not valid TOML: {}", e),
            _ => self.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            PostError::CsvError(_) => {
                "Check that the input file is a G2CRM CSV export with the expected columns"
            }
            PostError::IoError(_) => "Check that the input paths exist and are readable",
            PostError::SqliteError(_) => {
                "Check that the MapOutputs file is a valid sqlite database"
            }
            PostError::RasterError(_) => {
                "Check that the DEM is a single-band GeoTIFF clipped to one model area"
            }
            PostError::JobFileError(_) => "Run with a job file matching the documented layout",
            PostError::ConfigError { .. }
            | PostError::InvalidConfigValueError { .. }
            | PostError::MissingConfigError { .. } => "Run with --help to see valid arguments",
            _ => "Re-run with --verbose for details",
        }
    }
}

pub type Result<T> = std::result::Result<T, PostError>;
