//! Error taxonomy for a sync cycle
//!
//! Row-level errors (`SchemaError`, `LookupError`) are recovered and counted in
//! the cycle report. Cycle-level errors (`FeedError`, `StoreError`) abort the
//! cycle and leave the persisted tables as they were, unless putting the
//! archive back after a failed write also fails (`SyncError::Rollback`).

/// A source row could not be turned into a canonical record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Required column missing or blank
    MissingField { column: String },
    /// Timestamp column present but not in any accepted format
    BadTimestamp { column: String, value: String },
    /// Id already produced by an earlier row of the same batch
    DuplicateId { id: String },
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::MissingField { column } => {
                write!(f, "required field '{}' is missing or blank", column)
            }
            SchemaError::BadTimestamp { column, value } => {
                write!(f, "field '{}' has unparseable timestamp '{}'", column, value)
            }
            SchemaError::DuplicateId { id } => write!(f, "duplicate id '{}'", id),
        }
    }
}

impl std::error::Error for SchemaError {}

/// The source feed could not deliver a complete record set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Token request was rejected or unreachable
    Auth { message: String },
    /// Export request failed or returned a non-success status
    Request { message: String },
    /// Export body could not be parsed
    Malformed { message: String },
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::Auth { message } => write!(f, "source feed authentication failed: {}", message),
            FeedError::Request { message } => write!(f, "source feed request failed: {}", message),
            FeedError::Malformed { message } => write!(f, "source feed returned malformed data: {}", message),
        }
    }
}

impl std::error::Error for FeedError {}

/// A single carrier lookup failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// No adapter/credentials configured for the carrier
    Unconfigured { carrier: String },
    /// Token request failed
    Auth { message: String },
    /// Transport failure or non-success status
    Request { message: String },
    /// Payload carried a date that could not be parsed
    UnparseableDate { value: String },
    /// Worker pool was shut down
    PoolClosed,
}

impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupError::Unconfigured { carrier } => {
                write!(f, "no lookup configured for carrier {}", carrier)
            }
            LookupError::Auth { message } => write!(f, "token request failed: {}", message),
            LookupError::Request { message } => write!(f, "{}", message),
            LookupError::UnparseableDate { value } => write!(f, "unparseable date {}", value),
            LookupError::PoolClosed => write!(f, "lookup pool closed"),
        }
    }
}

impl std::error::Error for LookupError {}

/// Read or write failure on a persisted table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Read { table: String, message: String },
    Write { table: String, message: String },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Read { table, message } => {
                write!(f, "failed to read table '{}': {}", table, message)
            }
            StoreError::Write { table, message } => {
                write!(f, "failed to write table '{}': {}", table, message)
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Cycle-level failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    Feed(FeedError),
    Store(StoreError),
    /// The active replace failed after the archive append, and writing the
    /// archive snapshot back failed too
    Rollback { cause: StoreError, rollback: StoreError },
}

impl SyncError {
    /// Whether the persisted tables are as they were before the cycle
    pub fn persisted_unchanged(&self) -> bool {
        !matches!(self, SyncError::Rollback { .. })
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Feed(e) => write!(f, "sync cycle aborted: {}", e),
            SyncError::Store(e) => write!(f, "sync cycle aborted: {}", e),
            SyncError::Rollback { cause, rollback } => write!(
                f,
                "sync cycle aborted: {}; restoring the archive also failed: {}",
                cause, rollback
            ),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Feed(e) => Some(e),
            SyncError::Store(e) => Some(e),
            SyncError::Rollback { cause, .. } => Some(cause),
        }
    }
}

impl From<FeedError> for SyncError {
    fn from(e: FeedError) -> Self {
        SyncError::Feed(e)
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        SyncError::Store(e)
    }
}
