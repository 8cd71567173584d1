//! Error types and handling for weatherdash

use thiserror::Error;

/// Main error type for the weatherdash library
#[derive(Error, Debug)]
pub enum WeatherError {
    /// Connectivity, timeout or transport failure talking to the weather API
    #[error("Network error: {message}")]
    Network { message: String },

    /// The weather API rejected the request because of its quota
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after_secs: Option<u64>,
    },

    /// Geocoding or coordinates resolved to nothing usable
    #[error("Invalid location: {message}")]
    InvalidLocation { message: String },

    /// A chart or report was requested for zero records
    #[error("Empty series: {message}")]
    EmptySeries { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// The weather API answered with something we cannot use
    #[error("API error: {message}")]
    Api { message: String },

    /// Chart, report or export rendering failed
    #[error("Render error: {message}")]
    Render { message: String },

    /// Cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl WeatherError {
    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new rate limit error
    pub fn rate_limit<S: Into<String>>(message: S, retry_after_secs: Option<u64>) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after_secs,
        }
    }

    /// Create a new invalid location error
    pub fn invalid_location<S: Into<String>>(message: S) -> Self {
        Self::InvalidLocation {
            message: message.into(),
        }
    }

    /// Create a new empty series error
    pub fn empty_series<S: Into<String>>(message: S) -> Self {
        Self::EmptySeries {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a new render error
    pub fn render<S: Into<String>>(message: S) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            WeatherError::Network { .. } => {
                "Unable to reach the weather service. Please check your internet connection."
                    .to_string()
            }
            WeatherError::RateLimit {
                retry_after_secs: Some(secs),
                ..
            } => format!("The weather service is rate limiting us. Try again in {secs} seconds."),
            WeatherError::RateLimit { .. } => {
                "The weather service is rate limiting us. Try again later.".to_string()
            }
            WeatherError::InvalidLocation { message } => {
                format!("Location could not be resolved: {message}")
            }
            WeatherError::EmptySeries { .. } => "There is no data to display.".to_string(),
            WeatherError::Validation { message } => format!("Invalid input: {message}"),
            WeatherError::Api { .. } => {
                "The weather service returned an unexpected response.".to_string()
            }
            WeatherError::Render { .. } => "Unable to render the requested output.".to_string(),
            WeatherError::Cache { .. } => {
                "Cache operation failed. You may need to clear your cache.".to_string()
            }
            WeatherError::Config { .. } => {
                "Configuration error. Please check your config file.".to_string()
            }
            WeatherError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}

impl From<postcard::Error> for WeatherError {
    fn from(err: postcard::Error) -> Self {
        WeatherError::cache(format!("entry encoding failed: {err}"))
    }
}

impl From<tokio::task::JoinError> for WeatherError {
    fn from(err: tokio::task::JoinError) -> Self {
        WeatherError::cache(format!("blocking store task failed: {err}"))
    }
}
