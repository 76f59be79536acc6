//! Error types for the recent files CLI

use recent_files::RecentFilesError;
use std::fmt;

#[derive(Debug)]
pub enum CliError {
    RecentFiles(RecentFilesError),
    Io(Box<std::io::Error>),
    Config(String),
    /// Fingerprint that is not in the registry
    NotTracked(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::RecentFiles(err) => write!(f, "{}", err),
            CliError::Io(err) => write!(f, "IO error: {}", err),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::NotTracked(fp) => write!(f, "No recent file with fingerprint {}", fp),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::RecentFiles(err) => Some(err),
            CliError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<RecentFilesError> for CliError {
    fn from(err: RecentFilesError) -> Self {
        CliError::RecentFiles(err)
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for CliError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        CliError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
