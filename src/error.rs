use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Profile '{0}' not found in AWS config")]
    ProfileNotFound(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Renewal(#[from] RenewalError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure to turn a credential cache file into a usable record.
///
/// `Expired` is distinct from `Malformed` so the matcher can evict a stale
/// remembered mapping instead of merely skipping the candidate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed credential record: {0}")]
    Malformed(String),

    #[error("unparsable expiration date: {0}")]
    BadDate(String),

    #[error("credential expired at {0}")]
    Expired(chrono::DateTime<chrono::Utc>),
}

/// External process invocation failure (aws CLI).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("'{command}' exited with status {status}: {stderr}")]
    NonZeroExit {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("'{command}' did not complete within {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("'{command}' could not be launched: {message}")]
    NotFound { command: String, message: String },
}

/// Failure of the logout/login/verify renewal sequence. The session is left
/// in a not-authenticated state; the caller decides whether to retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenewalError {
    #[error("no active profile to renew")]
    NoActiveProfile,

    #[error("renewal failed during {step}: {message}")]
    Failed { step: &'static str, message: String },
}
