use std::io;

use thiserror::Error;

use crate::{book_status::BookStatus, catalog::BookId, membership::MemberId};

/// Coarse classification of lending failures, for presentation layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Book or member id does not resolve
    NotFound,
    /// Issue attempted on a book that is not free for the requester
    Unavailable,
    /// Member already holds as many loans as allowed
    LimitExceeded,
    /// Someone earlier in the reservation queue has priority
    ReservedByOther,
    /// Requester holds no loan on the book
    NotIssued,
    /// Renewal blocked by waiting members
    HasReservations,
    /// Reservation attempted on a book that can simply be issued
    AlreadyAvailable,
    /// Reservation that would duplicate or contradict an existing claim
    DuplicateReservation,
    /// Member profile with an out-of-range value
    InvalidProfile,
}

/// Business-rule violation raised by a lending operation.
///
/// A failed operation never leaves a partial change behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LendingError {
    #[error("book {0} not found")]
    BookNotFound(BookId),
    #[error("member {0} not found")]
    MemberNotFound(MemberId),
    #[error("book {book} is {status} and cannot be issued")]
    Unavailable { book: BookId, status: BookStatus },
    #[error("member {member} already holds the maximum of {limit} books")]
    LimitExceeded { member: MemberId, limit: usize },
    #[error("book {book} is reserved for member {head}")]
    ReservedByOther { book: BookId, head: MemberId },
    #[error("book {book} is not issued to member {member}")]
    NotIssued { book: BookId, member: MemberId },
    #[error("book {book} cannot be renewed, {waiting} member(s) waiting")]
    HasReservations { book: BookId, waiting: usize },
    #[error("book {0} is available, issue it instead of reserving")]
    AlreadyAvailable(BookId),
    #[error("member {member} has already reserved book {book}")]
    DuplicateReservation { book: BookId, member: MemberId },
    #[error("member {member} already holds book {book}")]
    HolderCannotReserve { book: BookId, member: MemberId },
    #[error("member {member} has no reservation on book {book}")]
    NotReserved { book: BookId, member: MemberId },
    #[error("invalid member profile: {0}")]
    InvalidProfile(String),
}

impl LendingError {
    /// Classification of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BookNotFound(_) | Self::MemberNotFound(_) | Self::NotReserved { .. } => {
                ErrorKind::NotFound
            }
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            Self::ReservedByOther { .. } => ErrorKind::ReservedByOther,
            Self::NotIssued { .. } => ErrorKind::NotIssued,
            Self::HasReservations { .. } => ErrorKind::HasReservations,
            Self::AlreadyAvailable(_) => ErrorKind::AlreadyAvailable,
            Self::DuplicateReservation { .. } | Self::HolderCannotReserve { .. } => {
                ErrorKind::DuplicateReservation
            }
            Self::InvalidProfile(_) => ErrorKind::InvalidProfile,
        }
    }
}

/// Failure to load a lending configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failure to save or load an engine snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("snapshot JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("snapshot is inconsistent: {0}")]
    Inconsistent(String),
}
