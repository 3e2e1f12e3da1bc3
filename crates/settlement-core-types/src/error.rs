use thiserror::Error;

/// The settlement core's error taxonomy.
///
/// Every variant maps to exactly one HTTP status at the API boundary; see
/// `settlement-core-api::http::error_response`.
#[derive(Debug, Error)]
pub enum OrderError {
    // ── Validation ────────────────────────────────────────────────────────
    #[error("{0}")]
    Validation(String),

    #[error("unknown payment method: {0}")]
    UnknownPaymentMethod(String),

    #[error("amount must be greater than zero")]
    ZeroAmount,

    // ── Authorization ─────────────────────────────────────────────────────
    #[error("actor {actor} may not drive order into {target}")]
    Forbidden { actor: String, target: String },

    // ── Lookup ────────────────────────────────────────────────────────────
    #[error("order not found")]
    OrderNotFound,

    #[error("dispute not found for order")]
    DisputeNotFound,

    // ── State machine ────────────────────────────────────────────────────
    #[error("no transition {from} -> {to} is defined")]
    InvalidTransition { from: String, to: String },

    #[error("order is in a terminal state ({0}); no further transitions are permitted")]
    OrderTerminal(String),

    // ── Concurrency / idempotency ─────────────────────────────────────────
    #[error("version conflict: expected {expected}, row is at {actual}")]
    VersionConflict { expected: i64, actual: i64 },

    #[error("escrow already locked for this order")]
    AlreadyEscrowed,

    #[error("escrow has already been released or refunded for this order")]
    AlreadySettled,

    #[error("dispute already open for this order")]
    DuplicateDispute,

    // ── Ledger ────────────────────────────────────────────────────────────
    #[error("insufficient funds: need {need}, have {have}")]
    InsufficientFunds { need: String, have: String },

    #[error("unknown account: {0}")]
    UnknownAccount(String),

    // ── Internal ──────────────────────────────────────────────────────────
    #[error("database error: {0}")]
    Database(String),

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl OrderError {
    /// Coarse category used to pick an HTTP status code at the API boundary.
    pub fn category(&self) -> ErrorCategory {
        match self {
            OrderError::Validation(_)
            | OrderError::UnknownPaymentMethod(_)
            | OrderError::ZeroAmount => ErrorCategory::Validation,

            OrderError::Forbidden { .. } => ErrorCategory::Forbidden,

            OrderError::OrderNotFound | OrderError::DisputeNotFound => ErrorCategory::NotFound,

            OrderError::InvalidTransition { .. } | OrderError::OrderTerminal(_) => {
                ErrorCategory::InvalidTransition
            }

            OrderError::VersionConflict { .. }
            | OrderError::AlreadyEscrowed
            | OrderError::AlreadySettled
            | OrderError::DuplicateDispute => ErrorCategory::Conflict,

            OrderError::InsufficientFunds { .. } => ErrorCategory::InsufficientFunds,

            OrderError::UnknownAccount(_) | OrderError::Database(_) | OrderError::Internal(_) => {
                ErrorCategory::Internal
            }
        }
    }
}

/// Coarse bucket used to pick an HTTP status at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Forbidden,
    NotFound,
    InvalidTransition,
    Conflict,
    InsufficientFunds,
    Internal,
}

pub type Result<T> = std::result::Result<T, OrderError>;
