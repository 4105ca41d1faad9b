use std::path::PathBuf;

use crate::decode::CharsetError;
use crate::{FailureKind, TransportError};

/// Expected console markup is missing or malformed. Signals a layout change.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("row {row}: missing column {column}")]
    MissingCell { row: usize, column: usize },
    #[error("row {row}: missing {what}")]
    MissingElement { row: usize, what: &'static str },
    #[error("row {row}: {what} has no `{attribute}` attribute")]
    MissingAttribute {
        row: usize,
        what: &'static str,
        attribute: &'static str,
    },
    #[error("row {row}: {what} is not a number: {value:?}")]
    InvalidNumber {
        row: usize,
        what: &'static str,
        value: String,
    },
    #[error("row {row}: unknown file status {value:?}")]
    UnknownStatus { row: usize, value: String },
    #[error("row {row}: no form control carries a form slot")]
    MissingFormSlot { row: usize },
    #[error("row {row}: continuation row without a preceding version row")]
    OrphanContinuation { row: usize },
    #[error(transparent)]
    DuplicateSlot(#[from] amo_core::DuplicateSlot),
    #[error("page is missing the {0}")]
    MissingPageField(&'static str),
    #[error("pagination shows a non-numeric page count: {0:?}")]
    InvalidPageCount(String),
    #[error("cannot resolve the add-on slug from {0}")]
    UnresolvedSlug(String),
    #[error("invalid selector {0:?}")]
    InvalidSelector(&'static str),
    #[error("expected {expected} content, got {actual:?}")]
    UnexpectedContentType {
        expected: &'static str,
        actual: Option<String>,
    },
    #[error(transparent)]
    Charset(#[from] CharsetError),
    #[error("invalid JSON body: {0}")]
    Json(serde_json::Error),
}

/// Why a single page's commit did not take.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageFailureCause {
    #[error("unexpected response status {0}")]
    UnexpectedStatus(u16),
    #[error("redirected to unexpected location {0:?}")]
    UnexpectedRedirect(Option<String>),
    #[error(transparent)]
    Transport(TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    /// 1-based page number.
    pub page: usize,
    pub cause: PageFailureCause,
}

/// One or more pages failed to commit after every page was attempted.
///
/// Pages listed in `committed` are live on the console; nothing is rolled back.
/// This holds even when a page failed because the session expired midway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", describe_commit(&.failures, &.committed))]
pub struct CommitAggregateError {
    pub failures: Vec<PageFailure>,
    pub committed: Vec<usize>,
}

impl CommitAggregateError {
    pub fn failed_pages(&self) -> Vec<usize> {
        self.failures.iter().map(|failure| failure.page).collect()
    }

    /// The first page failure caused by a rejected session, if any.
    pub fn authorization_failure(&self) -> Option<&TransportError> {
        self.failures.iter().find_map(|failure| match &failure.cause {
            PageFailureCause::Transport(err) if err.kind == FailureKind::Authorization => Some(err),
            _ => None,
        })
    }

    pub fn is_authorization(&self) -> bool {
        self.authorization_failure().is_some()
    }
}

fn describe_commit(failures: &[PageFailure], committed: &[usize]) -> String {
    let mut text = format!(
        "commit failed for {} of {} pages",
        failures.len(),
        failures.len() + committed.len()
    );
    for failure in failures {
        text.push_str(&format!("; page {}: {}", failure.page, failure.cause));
    }
    text
}

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("failed to decode console page: {0}")]
    Decode(#[from] DecodeError),
    /// The session was rejected; the transport failure is kept as reported.
    #[error("console session rejected: {0}")]
    Authorization(TransportError),
    #[error("console request failed: {0}")]
    Transport(TransportError),
    #[error(transparent)]
    Commit(#[from] CommitAggregateError),
    #[error("listing for {0} has not been loaded")]
    NotLoaded(String),
    #[error("banning user {user} failed: {reason}")]
    BanFailed { user: String, reason: String },
}

impl ConsoleError {
    /// True when the session was rejected, including during a partial commit.
    pub fn is_authorization(&self) -> bool {
        match self {
            ConsoleError::Authorization(_) => true,
            ConsoleError::Commit(aggregate) => aggregate.is_authorization(),
            _ => false,
        }
    }
}

impl From<TransportError> for ConsoleError {
    fn from(err: TransportError) -> Self {
        match err.kind {
            FailureKind::Authorization => ConsoleError::Authorization(err),
            _ => ConsoleError::Transport(err),
        }
    }
}

/// Failure talking to Redash or Bugzilla.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] TransportError),
    #[error("unexpected response status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
    #[error("failed to decode response: {0}")]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Sql(#[from] amo_core::SqlError),
    #[error("bugzilla error {code} - {message}")]
    Bugzilla { code: i64, message: String },
    #[error("redash job {job} failed: {message}")]
    QueryFailed { job: String, message: String },
    #[error("redash job {job} still running after {waited_secs}s")]
    QueryTimeout { job: String, waited_secs: u64 },
    #[error("an api key is required for {0}")]
    MissingApiKey(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(
        "refusing to open {path:?} as it has mode 0{mode:o} and may contain secrets; lock it down to 0600"
    )]
    InsecurePermissions { path: PathBuf, mode: u32 },
    #[error("{path:?} is still in ini format, convert it to JSON")]
    LegacyIni { path: PathBuf },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid console url {url:?}: {message}")]
    InvalidUrl { url: String, message: String },
}
