use std::sync::{Arc, PoisonError, RwLock};

use rust_decimal::Decimal;

use crate::{
    catalog::BookId,
    engine::{LendingEngine, Loan, OverdueLoan, Reservation, ReturnReceipt},
    error::LendingError,
    membership::MemberId,
};

/// Cloneable handle to one engine shared between threads.
///
/// Every mutating operation runs under a single write guard, so readers see
/// either the state before a return or the state after its reissue, never
/// the gap between them.
#[derive(Debug, Clone)]
pub struct SharedEngine {
    /// The engine behind the lock
    inner: Arc<RwLock<LendingEngine>>,
}

impl SharedEngine {
    /// Wrap an engine
    #[must_use]
    pub fn new(engine: LendingEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    /// Run a read-only closure against the engine
    pub fn read<R>(&self, f: impl FnOnce(&LendingEngine) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Run a closure holding the exclusive write guard
    pub fn write<R>(&self, f: impl FnOnce(&mut LendingEngine) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// See [`LendingEngine::issue`]
    ///
    /// # Errors
    ///
    /// Propagates the engine's error
    pub fn issue(&self, book: BookId, member: MemberId) -> Result<Loan, LendingError> {
        self.write(|engine| engine.issue(book, member))
    }

    /// See [`LendingEngine::return_book`]
    ///
    /// # Errors
    ///
    /// Propagates the engine's error
    pub fn return_book(
        &self,
        book: BookId,
        member: MemberId,
    ) -> Result<ReturnReceipt, LendingError> {
        self.write(|engine| engine.return_book(book, member))
    }

    /// See [`LendingEngine::renew`]
    ///
    /// # Errors
    ///
    /// Propagates the engine's error
    pub fn renew(&self, book: BookId, member: MemberId) -> Result<Loan, LendingError> {
        self.write(|engine| engine.renew(book, member))
    }

    /// See [`LendingEngine::reserve`]
    ///
    /// # Errors
    ///
    /// Propagates the engine's error
    pub fn reserve(&self, book: BookId, member: MemberId) -> Result<usize, LendingError> {
        self.write(|engine| engine.reserve(book, member))
    }

    /// See [`LendingEngine::cancel_reservation`]
    ///
    /// # Errors
    ///
    /// Propagates the engine's error
    pub fn cancel_reservation(&self, book: BookId, member: MemberId) -> Result<(), LendingError> {
        self.write(|engine| engine.cancel_reservation(book, member))
    }

    /// Owned copy of the active loans
    ///
    /// # Errors
    ///
    /// `MemberNotFound` for an unknown member
    pub fn active_loans(&self, member: Option<MemberId>) -> Result<Vec<Loan>, LendingError> {
        self.read(|engine| {
            let loans = engine.active_loans(member)?;
            Ok(loans.into_iter().cloned().collect())
        })
    }

    /// See [`LendingEngine::overdue_loans`]
    #[must_use]
    pub fn overdue_loans(&self) -> Vec<OverdueLoan> {
        self.read(LendingEngine::overdue_loans)
    }

    /// See [`LendingEngine::reservations_for`]
    ///
    /// # Errors
    ///
    /// `MemberNotFound` for an unknown member
    pub fn reservations_for(&self, member: MemberId) -> Result<Vec<Reservation>, LendingError> {
        self.read(|engine| engine.reservations_for(member))
    }

    /// Current fine balance of a member
    ///
    /// # Errors
    ///
    /// `MemberNotFound` for an unknown member
    pub fn fine_balance(&self, member: MemberId) -> Result<Decimal, LendingError> {
        self.read(|engine| {
            engine
                .membership()
                .find_member(member)
                .map(crate::membership::Member::fine_balance)
                .ok_or(LendingError::MemberNotFound(member))
        })
    }
}
