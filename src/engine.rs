use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt,
    sync::Arc,
};

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    book_status::BookStatus,
    catalog::{Book, BookDetails, BookId, Catalog},
    clock::Clock,
    config::{Handoff, LendingConfig},
    error::LendingError,
    events::LendingEvent,
    fine::days_overdue,
    membership::{Member, MemberId, MemberProfile, Membership},
    observers::LendingObserver,
};

/// An active issuance of one book to one member
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Loan {
    /// Book on loan
    pub book: BookId,
    /// Borrower
    pub member: MemberId,
    /// Date the loan started
    pub issued_on: NaiveDate,
    /// Date the book is due back
    pub due_date: NaiveDate,
    /// Number of successful renewals
    pub renewals: u32,
}

impl Loan {
    /// Whether the loan is past due on `today`
    #[must_use]
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date < today
    }
}

/// A recorded status change
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LendingTransition {
    /// Book whose status changed
    pub book: BookId,
    /// The status before the transition
    pub from: BookStatus,
    /// The status after the transition
    pub to: BookStatus,
    /// The event that triggered the transition
    pub event: LendingEvent,
    /// Date the transition happened
    pub on: NaiveDate,
}

/// Where a returned book went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AfterReturn {
    /// Back on the shelf
    Shelved,
    /// Issued to the head of the reservation queue
    Reissued(Loan),
    /// Held for the head of the reservation queue to collect
    Held(MemberId),
}

/// Outcome of a successful return
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnReceipt {
    /// The loan that was closed
    pub loan: Loan,
    /// Date of return
    pub returned_on: NaiveDate,
    /// Whole days past the due date
    pub days_overdue: u32,
    /// Fine added to the borrower's balance
    pub fine: Decimal,
    /// What happened to the book afterwards
    pub next: AfterReturn,
}

/// A loan past its due date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverdueLoan {
    /// The loan
    pub loan: Loan,
    /// Whole days late as of today
    pub days_overdue: u32,
    /// Fine the borrower would pay if returning today
    pub accrued_fine: Decimal,
}

/// A member's place in one reservation queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// Reserved book
    pub book: BookId,
    /// 1-based queue position
    pub position: usize,
}

/// Lending and reservation engine.
///
/// Owns the catalog, the membership roll, the loan table and the reservation
/// queues. Of the records it does not own it only writes book status and
/// member fine balances.
pub struct LendingEngine {
    /// Book records
    pub(crate) catalog: Catalog,
    /// Member records
    pub(crate) membership: Membership,
    /// Active loans keyed by book; at most one per book
    pub(crate) loans: BTreeMap<BookId, Loan>,
    /// FIFO reservation queues; never empty when present
    pub(crate) reservations: BTreeMap<BookId, VecDeque<MemberId>>,
    /// Lending policy
    pub(crate) config: LendingConfig,
    /// Source of today's date
    pub(crate) clock: Arc<dyn Clock>,
    /// Record of recent transitions, oldest first
    pub(crate) history: VecDeque<LendingTransition>,
    /// Registered transition observers
    observers: Vec<Box<dyn LendingObserver>>,
}

// Manual implementation of Debug for LendingEngine
impl fmt::Debug for LendingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LendingEngine")
            .field("catalog", &self.catalog)
            .field("membership", &self.membership)
            .field("loans", &self.loans)
            .field("reservations", &self.reservations)
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("history", &self.history)
            .field("observers_count", &self.observers.len())
            .finish()
    }
}

/// `start` plus `days`, saturating at the last representable date
fn add_days(start: NaiveDate, days: u32) -> NaiveDate {
    start
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

impl LendingEngine {
    /// Create an engine over existing catalog and membership records
    #[must_use]
    pub fn new(
        catalog: Catalog,
        membership: Membership,
        config: LendingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            membership,
            loans: BTreeMap::new(),
            reservations: BTreeMap::new(),
            config,
            clock,
            history: VecDeque::new(),
            observers: Vec::new(),
        }
    }

    /// Create an engine with empty records and the default policy
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Catalog::new(),
            Membership::new(),
            LendingConfig::default(),
            clock,
        )
    }

    /// Register an observer to be notified of status transitions
    pub fn register_observer(&mut self, observer: Box<dyn LendingObserver>) {
        self.observers.push(observer);
    }

    /// Book records
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Member records
    #[must_use]
    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    /// Lending policy in force
    #[must_use]
    pub fn config(&self) -> &LendingConfig {
        &self.config
    }

    /// Today's date according to the injected clock
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Recent transitions, oldest first
    #[must_use]
    pub fn history(&self) -> &VecDeque<LendingTransition> {
        &self.history
    }

    /// Add a book to the catalog
    pub fn add_book(&mut self, details: BookDetails) -> BookId {
        let id = self.catalog.add(details);
        debug!(book = %id, "book added");
        id
    }

    /// Edit a book's title, author and category
    ///
    /// # Errors
    ///
    /// Returns `LendingError::BookNotFound` if the id is unknown
    pub fn edit_book(&mut self, book: BookId, details: BookDetails) -> Result<(), LendingError> {
        if self.catalog.edit(book, details) {
            Ok(())
        } else {
            Err(LendingError::BookNotFound(book))
        }
    }

    /// Delete a book together with its loan and reservation queue.
    ///
    /// No transition is recorded: the book leaves the status machine.
    ///
    /// # Errors
    ///
    /// Returns `LendingError::BookNotFound` if the id is unknown
    pub fn remove_book(&mut self, book: BookId) -> Result<Book, LendingError> {
        let removed = self
            .catalog
            .remove(book)
            .ok_or(LendingError::BookNotFound(book))?;
        self.loans.remove(&book);
        let waiting = self
            .reservations
            .remove(&book)
            .map_or(0, |queue| queue.len());
        info!(%book, status = %removed.status(), waiting, "book removed");
        Ok(removed)
    }

    /// Register a new member
    ///
    /// # Errors
    ///
    /// Returns `LendingError::InvalidProfile` if the profile is out of range
    pub fn register_member(
        &mut self,
        name: &str,
        profile: MemberProfile,
    ) -> Result<MemberId, LendingError> {
        profile.validate()?;
        let id = self.membership.register(name, profile);
        debug!(member = %id, "member registered");
        Ok(id)
    }

    /// Replace a member's borrowing profile
    ///
    /// # Errors
    ///
    /// Returns `LendingError::InvalidProfile` if the profile is out of range,
    /// `LendingError::MemberNotFound` if the id is unknown
    pub fn set_member_profile(
        &mut self,
        member: MemberId,
        profile: MemberProfile,
    ) -> Result<(), LendingError> {
        profile.validate()?;
        if self.membership.set_profile(member, profile) {
            Ok(())
        } else {
            Err(LendingError::MemberNotFound(member))
        }
    }

    /// Loan cap for a member; `None` means unbounded
    #[must_use]
    pub fn loan_limit(&self, member: &Member) -> Option<usize> {
        let own = member.profile.max_books_allowed;
        own.or(self.config.default_max_books)
    }

    /// Loan period in days for a member
    #[must_use]
    pub fn loan_period(&self, member: &Member) -> u32 {
        let own = member.profile.loan_period_override;
        own.unwrap_or(self.config.loan_period_days)
    }

    /// Number of loans a member currently holds
    #[must_use]
    pub fn active_loan_count(&self, member: MemberId) -> usize {
        self.loans
            .values()
            .filter(|loan| loan.member == member)
            .count()
    }

    /// Whether `member` may take one more loan
    fn check_limit(&self, member: &Member) -> Result<(), LendingError> {
        match self.loan_limit(member) {
            Some(limit) if self.active_loan_count(member.id()) >= limit => {
                Err(LendingError::LimitExceeded {
                    member: member.id(),
                    limit,
                })
            }
            _ => Ok(()),
        }
    }

    /// Head of a book's reservation queue
    fn queue_head(&self, book: BookId) -> Option<MemberId> {
        self.reservations
            .get(&book)
            .and_then(|queue| queue.front().copied())
    }

    /// Whether `member` is waiting in a book's queue
    fn is_queued(&self, book: BookId, member: MemberId) -> bool {
        self.reservations
            .get(&book)
            .is_some_and(|queue| queue.contains(&member))
    }

    /// Drop the head of a book's queue, deleting the queue once empty
    fn pop_queue_head(&mut self, book: BookId) -> Option<MemberId> {
        let queue = self.reservations.get_mut(&book)?;
        let head = queue.pop_front();
        if queue.is_empty() {
            self.reservations.remove(&book);
        }
        head
    }

    /// Book lookup that reports a missing id
    fn book(&self, book: BookId) -> Result<&Book, LendingError> {
        self.catalog
            .find_book(book)
            .ok_or(LendingError::BookNotFound(book))
    }

    /// Member lookup that reports a missing id
    fn member(&self, member: MemberId) -> Result<&Member, LendingError> {
        self.membership
            .find_member(member)
            .ok_or(LendingError::MemberNotFound(member))
    }

    /// Loan on `book` held by `member`
    fn held_loan(&self, book: BookId, member: MemberId) -> Result<&Loan, LendingError> {
        self.book(book)?;
        self.loans
            .get(&book)
            .filter(|loan| loan.member == member)
            .ok_or(LendingError::NotIssued { book, member })
    }

    /// Write a status change to the catalog, history and observers
    fn transition(&mut self, book: BookId, to: BookStatus, event: LendingEvent) {
        let Some(entry) = self.catalog.find_book_mut(book) else {
            return;
        };
        let from = entry.status();
        entry.set_status(to);
        self.record(book, from, to, event);
    }

    /// Append to history and notify observers
    fn record(&mut self, book: BookId, from: BookStatus, to: BookStatus, event: LendingEvent) {
        let on = self.clock.today();
        self.history.push_back(LendingTransition {
            book,
            from,
            to,
            event,
            on,
        });
        while self.history.len() > self.config.max_history {
            self.history.pop_front();
        }
        for observer in &self.observers {
            observer.on_transition(book, from, to, &event);
        }
    }

    /// Create a loan and mark the book issued
    fn open_loan(&mut self, book: BookId, member: &Member, event: LendingEvent) -> Loan {
        let issued_on = self.clock.today();
        let loan = Loan {
            book,
            member: member.id(),
            issued_on,
            due_date: add_days(issued_on, self.loan_period(member)),
            renewals: 0,
        };
        self.loans.insert(book, loan.clone());
        self.transition(book, BookStatus::Issued, event);
        loan
    }

    /// Issue a book to a member.
    ///
    /// The book must be available, or held for this member at the head of its
    /// reservation queue, and the member must be under their loan cap. A
    /// member at the head of the queue leaves it on success.
    ///
    /// # Errors
    ///
    /// `BookNotFound`, `MemberNotFound`, `Unavailable` when the book is out on
    /// loan, `LimitExceeded` at the loan cap, `ReservedByOther` when someone
    /// else is first in the queue
    pub fn issue(&mut self, book: BookId, member: MemberId) -> Result<Loan, LendingError> {
        let status = self.book(book)?.status();
        let borrower = self.member(member)?.clone();
        if status == BookStatus::Issued || self.loans.contains_key(&book) {
            return Err(LendingError::Unavailable { book, status });
        }
        self.check_limit(&borrower)?;
        let head = self.queue_head(book);
        if let Some(head) = head.filter(|head| *head != member) {
            return Err(LendingError::ReservedByOther { book, head });
        }

        if head.is_some() {
            self.pop_queue_head(book);
        }
        let loan = self.open_loan(book, &borrower, LendingEvent::Issue { member });
        debug!(%book, %member, due = %loan.due_date, "book issued");
        Ok(loan)
    }

    /// Return a book borrowed by `member`.
    ///
    /// Any fine is charged to the borrower. A waiting queue then either gets
    /// the book straight away or has it held for its head member, depending on
    /// the handoff policy and whether the head member can take another loan.
    ///
    /// # Errors
    ///
    /// `BookNotFound`, or `NotIssued` when `member` does not hold the book
    pub fn return_book(
        &mut self,
        book: BookId,
        member: MemberId,
    ) -> Result<ReturnReceipt, LendingError> {
        let loan = self.held_loan(book, member)?.clone();
        let returned_on = self.clock.today();
        let fine = self.config.fine_policy().assess(loan.due_date, returned_on);

        let immediate = self.config.handoff == Handoff::Immediate;
        let claimant = self.queue_head(book).map(|head| {
            let ready = self
                .membership
                .find_member(head)
                .filter(|m| immediate && self.check_limit(m).is_ok())
                .cloned();
            (head, ready)
        });

        self.loans.remove(&book);
        if let Some(borrower) = self.membership.find_member_mut(member) {
            borrower.charge(fine);
        }
        if fine > Decimal::ZERO {
            warn!(%book, %member, %fine, "late return fined");
        }

        let next = match claimant {
            None => {
                self.transition(book, BookStatus::Available, LendingEvent::Return { member });
                AfterReturn::Shelved
            }
            Some((head, Some(next_borrower))) => {
                self.pop_queue_head(book);
                let event = LendingEvent::Reissue { member: head };
                AfterReturn::Reissued(self.open_loan(book, &next_borrower, event))
            }
            Some((head, None)) => {
                let event = LendingEvent::HoldForClaim { member: head };
                self.transition(book, BookStatus::Reserved, event);
                AfterReturn::Held(head)
            }
        };

        debug!(%book, %member, ?next, "book returned");
        Ok(ReturnReceipt {
            days_overdue: days_overdue(loan.due_date, returned_on),
            loan,
            returned_on,
            fine,
            next,
        })
    }

    /// Extend a loan by one loan period from its current due date.
    ///
    /// # Errors
    ///
    /// `BookNotFound`, `NotIssued` when `member` does not hold the book,
    /// `HasReservations` when anyone is waiting for it
    pub fn renew(&mut self, book: BookId, member: MemberId) -> Result<Loan, LendingError> {
        self.held_loan(book, member)?;
        if let Some(queue) = self.reservations.get(&book) {
            return Err(LendingError::HasReservations {
                book,
                waiting: queue.len(),
            });
        }
        let period = self
            .member(member)
            .map_or(self.config.loan_period_days, |m| self.loan_period(m));

        let Some(loan) = self.loans.get_mut(&book) else {
            return Err(LendingError::NotIssued { book, member });
        };
        loan.due_date = add_days(loan.due_date, period);
        loan.renewals = loan.renewals.saturating_add(1);
        let renewed = loan.clone();
        let event = LendingEvent::Renew { member };
        self.record(book, BookStatus::Issued, BookStatus::Issued, event);
        debug!(%book, %member, due = %renewed.due_date, "loan renewed");
        Ok(renewed)
    }

    /// Join the reservation queue of a book that is not available.
    ///
    /// Returns the member's 1-based position in the queue.
    ///
    /// # Errors
    ///
    /// `BookNotFound`, `MemberNotFound`, `AlreadyAvailable` for a book that can
    /// be issued directly, `HolderCannotReserve` for the current borrower,
    /// `DuplicateReservation` when the member is already queued
    pub fn reserve(&mut self, book: BookId, member: MemberId) -> Result<usize, LendingError> {
        let status = self.book(book)?.status();
        self.member(member)?;
        if status == BookStatus::Available {
            return Err(LendingError::AlreadyAvailable(book));
        }
        let holder = self.loans.get(&book).map(|loan| loan.member);
        if holder == Some(member) {
            return Err(LendingError::HolderCannotReserve { book, member });
        }
        if self.is_queued(book, member) {
            return Err(LendingError::DuplicateReservation { book, member });
        }

        let queue = self.reservations.entry(book).or_default();
        queue.push_back(member);
        let position = queue.len();
        // Issued stays issued, a held book stays reserved
        self.transition(book, status, LendingEvent::Reserve { member });
        debug!(%book, %member, position, "book reserved");
        Ok(position)
    }

    /// Leave a reservation queue.
    ///
    /// A held book whose queue empties goes back on the shelf.
    ///
    /// # Errors
    ///
    /// `BookNotFound`, or `NotReserved` when the member is not queued
    pub fn cancel_reservation(
        &mut self,
        book: BookId,
        member: MemberId,
    ) -> Result<(), LendingError> {
        let status = self.book(book)?.status();
        let queue = self
            .reservations
            .get_mut(&book)
            .filter(|queue| queue.contains(&member))
            .ok_or(LendingError::NotReserved { book, member })?;
        queue.retain(|queued| *queued != member);
        let emptied = queue.is_empty();
        if emptied {
            self.reservations.remove(&book);
        }

        let to = if emptied && status == BookStatus::Reserved && !self.loans.contains_key(&book) {
            BookStatus::Available
        } else {
            status
        };
        self.transition(book, to, LendingEvent::CancelReservation { member });
        debug!(%book, %member, "reservation cancelled");
        Ok(())
    }

    /// Loan currently open on a book
    #[must_use]
    pub fn loan(&self, book: BookId) -> Option<&Loan> {
        self.loans.get(&book)
    }

    /// Active loans of one member, or of everyone when `member` is `None`
    ///
    /// # Errors
    ///
    /// `MemberNotFound` for an unknown member
    pub fn active_loans(&self, member: Option<MemberId>) -> Result<Vec<&Loan>, LendingError> {
        if let Some(member) = member {
            self.member(member)?;
        }
        Ok(self
            .loans
            .values()
            .filter(|loan| member.is_none_or(|member| loan.member == member))
            .collect())
    }

    /// Loans whose due date is strictly before today
    #[must_use]
    pub fn overdue_loans(&self) -> Vec<OverdueLoan> {
        let today = self.clock.today();
        let policy = self.config.fine_policy();
        self.loans
            .values()
            .filter(|loan| loan.is_overdue(today))
            .map(|loan| OverdueLoan {
                loan: loan.clone(),
                days_overdue: days_overdue(loan.due_date, today),
                accrued_fine: policy.assess(loan.due_date, today),
            })
            .collect()
    }

    /// Fine `member` would be charged for returning `book` today
    ///
    /// # Errors
    ///
    /// `BookNotFound`, or `NotIssued` when `member` does not hold the book
    pub fn accrued_fine(&self, book: BookId, member: MemberId) -> Result<Decimal, LendingError> {
        let loan = self.held_loan(book, member)?;
        let today = self.clock.today();
        Ok(self.config.fine_policy().assess(loan.due_date, today))
    }

    /// Books `member` is queued for, with positions
    ///
    /// # Errors
    ///
    /// `MemberNotFound` for an unknown member
    pub fn reservations_for(&self, member: MemberId) -> Result<Vec<Reservation>, LendingError> {
        self.member(member)?;
        Ok(self
            .reservations
            .iter()
            .filter_map(|(book, queue)| {
                queue
                    .iter()
                    .position(|queued| *queued == member)
                    .map(|index| Reservation {
                        book: *book,
                        position: index.saturating_add(1),
                    })
            })
            .collect())
    }

    /// Members waiting for a book, in queue order
    ///
    /// # Errors
    ///
    /// `BookNotFound` for an unknown book
    pub fn reservation_queue(&self, book: BookId) -> Result<Vec<MemberId>, LendingError> {
        self.book(book)?;
        Ok(self
            .reservations
            .get(&book)
            .map(|queue| queue.iter().copied().collect())
            .unwrap_or_default())
    }

    /// All non-empty reservation queues
    pub fn all_reservations(&self) -> impl Iterator<Item = (BookId, &VecDeque<MemberId>)> {
        self.reservations.iter().map(|(book, queue)| (*book, queue))
    }

    /// Members carrying an outstanding fine balance
    #[must_use]
    pub fn members_with_fines(&self) -> Vec<&Member> {
        self.membership
            .members()
            .filter(|member| member.fine_balance() > Decimal::ZERO)
            .collect()
    }

    /// Check the relationships between statuses, loans and queues
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated rule
    pub fn check_consistency(&self) -> Result<(), String> {
        for (book, loan) in &self.loans {
            if loan.book != *book {
                return Err(format!("loan keyed by {book} names book {}", loan.book));
            }
            match self.catalog.find_book(*book) {
                Some(record) if record.status() == BookStatus::Issued => {}
                Some(record) => {
                    return Err(format!("book {book} has a loan but is {}", record.status()));
                }
                None => return Err(format!("loan references unknown book {book}")),
            }
            if self.membership.find_member(loan.member).is_none() {
                return Err(format!("unknown member {} holds book {book}", loan.member));
            }
        }
        for (book, queue) in &self.reservations {
            let Some(record) = self.catalog.find_book(*book) else {
                return Err(format!("reservation queue references unknown book {book}"));
            };
            if queue.is_empty() {
                return Err(format!("book {book} has an empty reservation queue"));
            }
            if record.status() == BookStatus::Available {
                return Err(format!("book {book} is available with a waiting queue"));
            }
            let mut seen = BTreeSet::new();
            for member in queue {
                if self.membership.find_member(*member).is_none() {
                    return Err(format!("unknown member {member} is queued for book {book}"));
                }
                if !seen.insert(*member) {
                    return Err(format!("member {member} is queued twice for book {book}"));
                }
            }
            let holder = self.loans.get(book).map(|loan| loan.member);
            if let Some(holder) = holder.filter(|holder| queue.contains(holder)) {
                return Err(format!("borrower {holder} is queued for book {book}"));
            }
        }
        for member in self.membership.members() {
            if let Err(err) = member.profile.validate() {
                return Err(format!("member {}: {err}", member.id()));
            }
        }
        for record in self.catalog.books() {
            let id = record.id();
            match record.status() {
                BookStatus::Issued if !self.loans.contains_key(&id) => {
                    return Err(format!("book {id} is issued without a loan"));
                }
                BookStatus::Reserved
                    if self.loans.contains_key(&id) || !self.reservations.contains_key(&id) =>
                {
                    return Err(format!("book {id} is reserved without a waiting queue"));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
