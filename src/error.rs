//! Error types shared across the archive client and the launch pipeline.

use thiserror::Error;

/// Errors raised while talking to the archive.
///
/// Payloads are plain strings so outcomes can be cloned into fan-out reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveError {
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Generation already in progress: {0}")]
    Locked(String),

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("Failed to parse response from {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Invalid URL: {0}")]
    Url(String),
}

impl ArchiveError {
    pub(crate) fn transport(url: &str, err: &reqwest::Error) -> Self {
        ArchiveError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn parse(url: &str, message: impl ToString) -> Self {
        ArchiveError::Parse {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    /// Map a non-success status onto the error taxonomy.
    pub(crate) fn from_status(status: u16, url: &str) -> Self {
        match status {
            403 => ArchiveError::Forbidden(url.to_string()),
            404 => ArchiveError::NotFound(url.to_string()),
            423 => ArchiveError::Locked(url.to_string()),
            _ => ArchiveError::UnexpectedStatus {
                status,
                url: url.to_string(),
            },
        }
    }
}

/// Errors that end a launch short of navigation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("Metadata for session {0} was still missing after generation")]
    NotGenerated(String),

    #[error("Session context is missing an experiment ID")]
    MissingExperiment,

    #[error("Failed to open viewer: {0}")]
    Open(String),
}

/// Errors raised while assembling settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid base URL {url}: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Password given without a username")]
    PasswordWithoutUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_known_codes() {
        let url = "http://xnat/x";
        assert_eq!(
            ArchiveError::from_status(403, url),
            ArchiveError::Forbidden(url.to_string())
        );
        assert_eq!(
            ArchiveError::from_status(423, url),
            ArchiveError::Locked(url.to_string())
        );
        assert_eq!(
            ArchiveError::from_status(500, url),
            ArchiveError::UnexpectedStatus {
                status: 500,
                url: url.to_string()
            }
        );
    }

    #[test]
    fn test_launch_error_wraps_archive_error() {
        let err: LaunchError = ArchiveError::Forbidden("u".into()).into();
        assert_eq!(err.to_string(), "Permission denied: u");
    }
}
