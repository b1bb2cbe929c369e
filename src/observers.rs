use tracing::info;

use crate::{book_status::BookStatus, catalog::BookId, events::LendingEvent};

/// Trait for lending transition observation
pub trait LendingObserver: Send + Sync {
    /// Called after an operation commits a transition
    fn on_transition(&self, book: BookId, from: BookStatus, to: BookStatus, event: &LendingEvent);
}

/// Logs all transitions that occur in the engine
#[derive(Debug)]
pub struct TransitionLogger;

impl LendingObserver for TransitionLogger {
    fn on_transition(&self, book: BookId, from: BookStatus, to: BookStatus, event: &LendingEvent) {
        info!(%book, %from, %to, ?event, "lending transition");
    }
}

/// Announces handoffs that a member would want to hear about
#[derive(Debug)]
pub struct NotificationService;

impl LendingObserver for NotificationService {
    fn on_transition(&self, book: BookId, from: BookStatus, to: BookStatus, event: &LendingEvent) {
        match (from, to, event) {
            (BookStatus::Issued, BookStatus::Issued, LendingEvent::Reissue { member }) => {
                info!(%book, %member, "notification: reserved book has been issued to you");
            }
            (_, BookStatus::Reserved, LendingEvent::HoldForClaim { member }) => {
                info!(%book, %member, "notification: reserved book is ready for collection");
            }
            (BookStatus::Issued, BookStatus::Available, LendingEvent::Return { .. }) => {
                info!(%book, "notification: book is back on the shelf");
            }
            _ => {}
        }
    }
}
