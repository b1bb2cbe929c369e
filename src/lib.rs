//! Library lending and reservation engine.
//!
//! This crate tracks which member holds which book, orders competing claims
//! through per-book FIFO reservation queues, computes and extends due dates,
//! and charges overdue fines on return.
//!
//! The [`LendingEngine`] owns the [`Catalog`], the [`Membership`] roll, the
//! loan table and the reservation queues. "Today" comes from an injected
//! [`Clock`], so every date-dependent rule can be exercised deterministically.

pub mod book_status;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fine;
pub mod membership;
pub mod observers;
pub mod persistence;
pub mod report;
pub mod shared;

pub use book_status::BookStatus;
pub use catalog::{Book, BookDetails, BookId, Catalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Handoff, LendingConfig};
pub use engine::{
    AfterReturn, LendingEngine, LendingTransition, Loan, OverdueLoan, Reservation, ReturnReceipt,
};
pub use error::{ConfigError, ErrorKind, LendingError, SnapshotError};
pub use events::LendingEvent;
pub use fine::FinePolicy;
pub use membership::{Member, MemberId, MemberProfile, Membership};
pub use report::LendingReport;
pub use shared::SharedEngine;
