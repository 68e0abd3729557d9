// Error types for laptrace

use snafu::Snafu;
use std::io;

/// Broad classes of failure, used by the user-visible error slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid cascade definition or unusable config file. Fatal at startup.
    Config,
    /// Network failure or server-reported error. The affected field stays disabled.
    Fetch,
    /// User action rejected before anything was fetched.
    Validation,
    /// Telemetry arrived but could not be rendered or written out.
    Render,
    /// Runtime or windowing failures outside the cascade.
    Runtime,
}

#[derive(Debug, Snafu)]
pub enum LaptraceError {
    // Cascade definition errors
    #[snafu(display("Invalid cascade definition: {reason}"))]
    InvalidCascade { reason: String },

    // Config management errors
    #[snafu(display("Could not find application data directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },
    #[snafu(display("Config file {path} is not valid: {source}"))]
    ConfigParseError {
        path: String,
        source: serde_json::Error,
    },

    // Errors while talking to the telemetry server
    #[snafu(display("{message}"))]
    ServerReported { message: String },
    #[snafu(display("Request to {endpoint} failed: {source}"))]
    TransportError {
        endpoint: String,
        source: reqwest::Error,
    },
    #[snafu(display("Unexpected response from {endpoint}: {reason}"))]
    MalformedResponse { endpoint: String, reason: String },
    #[snafu(display("Invalid server URL {url}"))]
    InvalidServerUrl { url: String },
    #[snafu(display("Could not load {field}: {message}"))]
    FieldLoadFailed { field: String, message: String },
    #[snafu(display("Could not load telemetry: {message}"))]
    TelemetryLoadFailed { message: String },
    #[snafu(display("Fetch task failed: {description}"))]
    FetchTaskFailed { description: String },

    // User input validation errors
    #[snafu(display("Select a {field} first"))]
    IncompleteSelection { field: String },
    #[snafu(display("Unknown field: {field}"))]
    UnknownField { field: String },
    #[snafu(display("{field} has no options to choose from yet"))]
    FieldNotReady { field: String },
    #[snafu(display("'{value}' is not an available {field}"))]
    UnavailableOption { field: String, value: String },

    // Output errors
    #[snafu(display("Error writing telemetry output"))]
    RenderIOError { source: io::Error },
    #[snafu(display("Error serializing telemetry output"))]
    RenderSerializeError { source: serde_json::Error },
    #[snafu(display("Could not write telemetry output: {message}"))]
    RenderFailed { message: String },

    // Process level errors
    #[snafu(display("Could not start async runtime"))]
    RuntimeError { source: io::Error },
    #[snafu(display("Viewer window error: {description}"))]
    GuiError { description: String },
}

impl LaptraceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCascade { .. }
            | Self::NoConfigDir
            | Self::ConfigIOError { .. }
            | Self::ConfigSerializeError { .. }
            | Self::ConfigParseError { .. }
            | Self::InvalidServerUrl { .. } => ErrorKind::Config,
            Self::ServerReported { .. }
            | Self::TransportError { .. }
            | Self::MalformedResponse { .. }
            | Self::FieldLoadFailed { .. }
            | Self::TelemetryLoadFailed { .. }
            | Self::FetchTaskFailed { .. } => ErrorKind::Fetch,
            Self::IncompleteSelection { .. }
            | Self::UnknownField { .. }
            | Self::FieldNotReady { .. }
            | Self::UnavailableOption { .. } => ErrorKind::Validation,
            Self::RenderIOError { .. }
            | Self::RenderSerializeError { .. }
            | Self::RenderFailed { .. } => ErrorKind::Render,
            Self::RuntimeError { .. } | Self::GuiError { .. } => ErrorKind::Runtime,
        }
    }

    pub(crate) fn invalid_cascade(reason: impl Into<String>) -> Self {
        Self::InvalidCascade {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_reported_error_displays_server_message() {
        let err = LaptraceError::ServerReported {
            message: "no laps recorded".to_string(),
        };
        assert_eq!(err.to_string(), "no laps recorded");
        assert_eq!(err.kind(), ErrorKind::Fetch);
    }

    #[test]
    fn test_validation_errors_are_classified() {
        let err = LaptraceError::IncompleteSelection {
            field: "lap".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "Select a lap first");
    }

    #[test]
    fn test_cascade_errors_are_config_errors() {
        assert_eq!(
            LaptraceError::invalid_cascade("duplicate field id 'gp'").kind(),
            ErrorKind::Config
        );
    }
}
