use reqwest::StatusCode;
use thiserror::Error;

type Cause = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Remote protocol error while {operation}: unexpected status {status}")]
    RemoteProtocol {
        operation: &'static str,
        status: StatusCode,
    },

    #[error("Archive error: {context}: {source}")]
    Archive {
        context: String,
        #[source]
        source: Cause,
    },

    #[error("Database error: {context}: {source}")]
    Database {
        context: String,
        #[source]
        source: Cause,
    },
}

impl BackupError {
    pub fn config(message: impl Into<String>) -> Self {
        BackupError::Configuration(message.into())
    }

    pub fn archive(context: impl Into<String>, source: impl Into<Cause>) -> Self {
        BackupError::Archive {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn database(context: impl Into<String>, source: impl Into<Cause>) -> Self {
        BackupError::Database {
            context: context.into(),
            source: source.into(),
        }
    }

    /// HTTP status carried by a remote protocol failure.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            BackupError::RemoteProtocol { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for BackupError {
    fn from(err: sqlx::Error) -> Self {
        BackupError::database("query failed", err)
    }
}

pub type BackupResult<T> = Result<T, BackupError>;
