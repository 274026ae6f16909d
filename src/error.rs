use crate::{captcha::SolveError, item::ResultStatus, table::HeaderKey};

/// How the session reacts to a failed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Rotate identity and resume from the identity check.
    Restart,
    /// Record an error for the current task and move on to the next one.
    SkipItem,
    /// Give up on the whole remaining batch.
    Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to `{url}` timed out after {secs}s")]
    Timeout { url: String, secs: u64 },
    #[error("http error")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from `{url}`")]
    Status { status: u16, url: String },
    #[error("driver does not support {0}")]
    Unsupported(&'static str),
    #[error("driver error: {0}")]
    Driver(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no cell indexed at top={top}, left={left}")]
pub struct HeaderMismatchError {
    pub top: HeaderKey,
    pub left: HeaderKey,
}

#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    #[error("Transport error")]
    Transport(#[from] TransportError),
    #[error("Blocked by remote site: {reason}")]
    Blocked { reason: String },

    #[error("Data was not found")]
    DataNotFound,
    #[error("Invalid search number: {reason}")]
    InvalidSearchNo { reason: String },
    #[error("Captcha failed {attempts} times")]
    CaptchaExhausted { attempts: u32 },

    #[error("Page layout changed")]
    HeaderMismatch(#[from] HeaderMismatchError),
    #[error("Unexpected page format: {reason}")]
    Format { reason: String },
    #[error("Proxy pool exhausted")]
    ProxyPoolExhausted,
    #[error("Session restarted more than {restarts} times")]
    MaxRestart { restarts: u32 },
    #[error("Session exceeded its {secs}s budget")]
    SessionTimeout { secs: u64 },
    #[error("Captcha solver error")]
    Solve(#[from] SolveError),

    #[error("Got {task_ids} task ids for {search_nos} search numbers")]
    SearchNoLengthMismatch { task_ids: usize, search_nos: usize },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("IO error")]
    Io(#[from] std::io::Error),
    #[error("JSON error")]
    Json(#[from] serde_json::Error),
}

impl CrawlerError {
    pub fn format(reason: impl Into<String>) -> Self {
        CrawlerError::Format {
            reason: reason.into(),
        }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        CrawlerError::Blocked {
            reason: reason.into(),
        }
    }

    pub fn disposition(&self) -> Disposition {
        match self {
            CrawlerError::Transport(_) | CrawlerError::Blocked { .. } => Disposition::Restart,
            CrawlerError::DataNotFound
            | CrawlerError::InvalidSearchNo { .. }
            | CrawlerError::CaptchaExhausted { .. } => Disposition::SkipItem,
            _ => Disposition::Fatal,
        }
    }

    /// Status carried by the error record generated from this error.
    pub fn status(&self) -> ResultStatus {
        match self {
            CrawlerError::HeaderMismatch(_)
            | CrawlerError::Format { .. }
            | CrawlerError::ProxyPoolExhausted
            | CrawlerError::Solve(_)
            | CrawlerError::SearchNoLengthMismatch { .. }
            | CrawlerError::Config(_)
            | CrawlerError::Io(_)
            | CrawlerError::Json(_) => ResultStatus::Fatal,
            _ => ResultStatus::Error,
        }
    }

    /// Tagged detail string written into error records.
    pub fn detail(&self) -> String {
        match self {
            CrawlerError::Transport(TransportError::Timeout { url, .. }) => {
                format!("<website-timeout-error> url='{}'", url)
            }
            CrawlerError::Transport(TransportError::Status { status, url }) => {
                format!("<status-code-error> {} url='{}'", status, url)
            }
            CrawlerError::Transport(err) => format!("<general-error> {}", err),
            CrawlerError::Blocked { reason } => format!("<access-denied> {}", reason),
            CrawlerError::DataNotFound => "<data-not-found>".to_string(),
            CrawlerError::InvalidSearchNo { reason } => format!("<invalid-search-no> {}", reason),
            CrawlerError::CaptchaExhausted { attempts } => {
                format!("<max-retry-error> captcha failed {} times", attempts)
            }
            CrawlerError::HeaderMismatch(err) => format!("<format-error> {}", err),
            CrawlerError::Format { reason } => format!("<format-error> {}", reason),
            CrawlerError::ProxyPoolExhausted => "<proxy-max-retry-error>".to_string(),
            CrawlerError::MaxRestart { restarts } => {
                format!("<max-retry-error> restarted {} times", restarts)
            }
            CrawlerError::SessionTimeout { secs } => {
                format!("<task-did-not-end> session timeout after {}s", secs)
            }
            other => format!("<general-fatal-error> {}", other),
        }
    }
}
