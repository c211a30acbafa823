use std::fmt;

/// Errors raised while building or querying telemetry datasets
///
/// Only conditions that make an input (or a request) unusable are errors.
/// Per-frame problems are collected as [`crate::Defect`]s instead.
#[derive(Debug, Clone, PartialEq)]
pub enum SrtError {
    /// No known layout matches the input
    UnrecognizedFormat { name: String },
    /// The input parsed, but no frame survived extraction
    EmptySession { name: String, defects: usize },
    /// Invalid view configuration (negative interval, negative smoothing)
    Configuration(String),
    /// A per-input accessor was called with a name that was never registered
    UnknownSession(String),
    /// The dataset has no usable session
    NoSessions,
    /// A prepared payload is missing required canonical fields
    InvalidPrepared { name: String, reason: String },
}

impl fmt::Display for SrtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SrtError::UnrecognizedFormat { name } => {
                write!(f, "Unrecognized telemetry format in '{}'", name)
            }
            SrtError::EmptySession { name, defects } => write!(
                f,
                "No usable frames in '{}' ({} defects recorded)",
                name, defects
            ),
            SrtError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            SrtError::UnknownSession(name) => write!(f, "Unknown input: {}", name),
            SrtError::NoSessions => write!(f, "Dataset has no parsed inputs"),
            SrtError::InvalidPrepared { name, reason } => {
                write!(f, "Invalid prepared data in '{}': {}", name, reason)
            }
        }
    }
}

impl SrtError {
    /// Name of the input an error belongs to, if it is tied to one
    pub fn input_name(&self) -> Option<&str> {
        match self {
            SrtError::UnrecognizedFormat { name }
            | SrtError::EmptySession { name, .. }
            | SrtError::InvalidPrepared { name, .. } => Some(name),
            SrtError::UnknownSession(name) => Some(name),
            SrtError::Configuration(_) | SrtError::NoSessions => None,
        }
    }
}

impl std::error::Error for SrtError {}

pub type Result<T> = std::result::Result<T, SrtError>;
