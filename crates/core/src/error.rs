use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Throttled,
    Transport,
}

#[derive(Debug, Clone)]
pub struct EarningsError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl EarningsError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn invalid_input(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, detail)
    }

    pub fn throttled(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Throttled, detail)
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, detail)
    }
}

impl fmt::Display for EarningsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::NotFound => "not found",
            ErrorKind::Throttled => "upstream rate limit",
            ErrorKind::Transport => "upstream transport error",
        };
        write!(f, "{label}: {}", self.detail)
    }
}

impl std::error::Error for EarningsError {}

pub fn kind_of(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<EarningsError>())
        .map(|e| e.kind)
}
