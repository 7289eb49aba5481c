use serde::de::StdError;
use std::fmt;
use std::path::PathBuf;
use std::sync::PoisonError;
use thiserror::Error;

pub type ArgusResult<T, E = ArgusError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum ArgusError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("tree-sitter error: {0}")]
    TreeSitter(#[from] tree_sitter::LanguageError),

    #[error("connection-pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("time error: {0}")]
    Time(#[from] std::time::SystemTimeError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no source files found under: {0}")]
    FileNotFound(String),

    #[error("failed to parse: {}", .0.display())]
    ParseFailed(PathBuf),

    #[error("analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("analysis cancelled")]
    Cancelled,

    #[error("poisoned lock: {0}")]
    Poison(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync + 'static>),

    #[error("{0}")]
    Msg(String),
}

impl ArgusError {
    /// Process exit code for the quality-gate wrapper.
    pub fn exit_code(&self) -> i32 {
        match self {
            ArgusError::InvalidInput(_) => 2,
            ArgusError::FileNotFound(_) => 3,
            _ => 1,
        }
    }
}

impl<T> From<PoisonError<T>> for ArgusError
where
    T: fmt::Debug,
{
    fn from(err: PoisonError<T>) -> Self {
        ArgusError::Poison(err.to_string())
    }
}

impl From<&str> for ArgusError {
    fn from(s: &str) -> Self {
        ArgusError::Msg(s.to_owned())
    }
}

impl From<String> for ArgusError {
    fn from(s: String) -> Self {
        ArgusError::Msg(s)
    }
}

impl From<Box<dyn std::error::Error>> for ArgusError {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        ArgusError::Msg(err.to_string())
    }
}

#[test]
fn io_conversion_retains_message() {
    let e = std::io::Error::other("boom!");
    let a: ArgusError = e.into();
    assert!(matches!(a, ArgusError::Io(_)));
    assert!(a.to_string().contains("boom"));
}

#[test]
fn exit_codes_follow_error_class() {
    assert_eq!(ArgusError::InvalidInput("x".into()).exit_code(), 2);
    assert_eq!(ArgusError::FileNotFound(".".into()).exit_code(), 3);
    assert_eq!(ArgusError::Cancelled.exit_code(), 1);
}

#[test]
fn simple_string_into_msg() {
    let a: ArgusError = "plain msg".into();
    assert!(matches!(a, ArgusError::Msg(s) if s == "plain msg"));
}
