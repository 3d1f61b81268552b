//! Error types and handling for Thermae
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Thermae operations
pub type Result<T> = std::result::Result<T, ThermaeError>;

/// Main error type for Thermae
#[derive(Debug, Error)]
pub enum ThermaeError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Network-related errors (meter unreachable, non-success status)
    #[error("Network error: {message}")]
    Network { message: String },

    /// GPIO / contactor output errors
    #[error("GPIO error: {message}")]
    Gpio { message: String },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors (settings slots, log files)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Update-check related errors
    #[error("Update error: {message}")]
    Update { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl ThermaeError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        ThermaeError::Config {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        ThermaeError::Network {
            message: message.into(),
        }
    }

    /// Create a new GPIO error
    pub fn gpio<S: Into<String>>(message: S) -> Self {
        ThermaeError::Gpio {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        ThermaeError::Web {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        ThermaeError::Io {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        ThermaeError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new update error
    pub fn update<S: Into<String>>(message: S) -> Self {
        ThermaeError::Update {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        ThermaeError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ThermaeError {
    fn from(err: std::io::Error) -> Self {
        ThermaeError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ThermaeError {
    fn from(err: serde_yaml::Error) -> Self {
        ThermaeError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ThermaeError {
    fn from(err: serde_json::Error) -> Self {
        ThermaeError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ThermaeError {
    fn from(err: reqwest::Error) -> Self {
        ThermaeError::network(err.to_string())
    }
}

impl From<gpio_cdev::Error> for ThermaeError {
    fn from(err: gpio_cdev::Error) -> Self {
        ThermaeError::gpio(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ThermaeError::config("test config error");
        assert!(matches!(err, ThermaeError::Config { .. }));

        let err = ThermaeError::network("meter offline");
        assert!(matches!(err, ThermaeError::Network { .. }));

        let err = ThermaeError::validation("field", "test validation error");
        assert!(matches!(err, ThermaeError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = ThermaeError::config("test error");
        assert_eq!(format!("{}", err), "Configuration error: test error");

        let err = ThermaeError::validation("seconds", "must be positive");
        assert_eq!(
            format!("{}", err),
            "Validation error: seconds - must be positive"
        );
    }
}
