use std::{io, path::PathBuf};

use thiserror::Error;

/// Failures of the process's outer plumbing: sockets, pool, files, logging.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("database error: {message}")]
    Database { message: String },
    #[error("upload directory `{}` is not usable: {source}", path.display())]
    UploadRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not install logging: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn upload_root(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::UploadRoot {
            path: path.into(),
            source,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
