use std::{
    collections::{BTreeMap, VecDeque},
    fs,
    path::Path,
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    catalog::{Book, BookId, Catalog},
    clock::Clock,
    config::LendingConfig,
    engine::{LendingEngine, LendingTransition, Loan},
    error::SnapshotError,
    membership::{Member, MemberId, Membership},
    observers::{NotificationService, TransitionLogger},
};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// One book's reservation queue, head first
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueueRecord {
    /// Reserved book
    pub book: BookId,
    /// Waiting members in order
    pub members: Vec<MemberId>,
}

/// Serializable representation of the engine state
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Snapshot {
    /// Format version, checked on load
    pub version: u32,
    /// Next book id to hand out
    pub next_book_id: u32,
    /// Next member id to hand out
    pub next_member_id: u32,
    /// Book records
    pub books: Vec<Book>,
    /// Member records, fine balances included
    pub members: Vec<Member>,
    /// Active loans
    pub loans: Vec<Loan>,
    /// Non-empty reservation queues
    pub reservations: Vec<QueueRecord>,
    /// Recent transitions, oldest first
    #[serde(default)]
    pub history: Vec<LendingTransition>,
}

impl LendingEngine {
    /// Capture the lending state
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            next_book_id: self.catalog.next_id(),
            next_member_id: self.membership.next_id(),
            books: self.catalog.books().cloned().collect(),
            members: self.membership.members().cloned().collect(),
            loans: self.loans.values().cloned().collect(),
            reservations: self
                .reservations
                .iter()
                .map(|(book, queue)| QueueRecord {
                    book: *book,
                    members: queue.iter().copied().collect(),
                })
                .collect(),
            history: self.history.iter().cloned().collect(),
        }
    }

    /// Rebuild an engine from a snapshot
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::UnsupportedVersion` for a foreign version and
    /// `SnapshotError::Inconsistent` when the records contradict each other
    pub fn from_snapshot(
        snapshot: Snapshot,
        config: LendingConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SnapshotError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        let (next_book, next_member) = (snapshot.next_book_id, snapshot.next_member_id);
        let stray_book = snapshot.books.iter().any(|b| b.id().0 >= next_book);
        let stray_member = snapshot.members.iter().any(|m| m.id().0 >= next_member);
        if stray_book || stray_member {
            return Err(SnapshotError::Inconsistent(
                "record id beyond the next id".to_string(),
            ));
        }

        let book_count = snapshot.books.len();
        let member_count = snapshot.members.len();
        let catalog = Catalog::from_parts(snapshot.books, snapshot.next_book_id);
        let membership = Membership::from_parts(snapshot.members, snapshot.next_member_id);
        if catalog.len() != book_count || membership.len() != member_count {
            return Err(SnapshotError::Inconsistent(
                "duplicate record ids".to_string(),
            ));
        }

        let mut loans = BTreeMap::new();
        for loan in snapshot.loans {
            if loans.insert(loan.book, loan).is_some() {
                return Err(SnapshotError::Inconsistent(
                    "two loans for one book".to_string(),
                ));
            }
        }
        let mut reservations = BTreeMap::new();
        for record in snapshot.reservations {
            let queue: VecDeque<MemberId> = record.members.into_iter().collect();
            if reservations.insert(record.book, queue).is_some() {
                return Err(SnapshotError::Inconsistent(
                    "two queues for one book".to_string(),
                ));
            }
        }

        let mut engine = Self::new(catalog, membership, config, clock);
        engine.loans = loans;
        engine.reservations = reservations;
        let kept = engine.config.max_history;
        let skip = snapshot.history.len().saturating_sub(kept);
        engine.history = snapshot.history.into_iter().skip(skip).collect();
        engine
            .check_consistency()
            .map_err(SnapshotError::Inconsistent)?;
        Ok(engine)
    }

    /// Save the lending state to a JSON file
    ///
    /// # Errors
    ///
    /// Returns a `SnapshotError` if the state cannot be serialized or the file
    /// cannot be written
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        let serialized = serde_json::to_string_pretty(&self.snapshot())?;
        debug!(path = %path.display(), "saving snapshot");
        fs::write(path, serialized)?;
        Ok(())
    }

    /// Load the lending state from a JSON file
    ///
    /// # Errors
    ///
    /// Returns a `SnapshotError` if:
    /// - The file cannot be read
    /// - The JSON parsing fails
    /// - The snapshot version or contents are rejected by [`LendingEngine::from_snapshot`]
    pub fn load_from_path(
        path: impl AsRef<Path>,
        config: LendingConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading snapshot");
        let contents = fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        let mut engine = Self::from_snapshot(snapshot, config, clock)?;

        // Re-register standard observers
        engine.register_observer(Box::new(TransitionLogger));
        engine.register_observer(Box::new(NotificationService));

        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::indexing_slicing)]

    use std::sync::Arc;

    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use super::Snapshot;
    use crate::{
        book_status::BookStatus,
        catalog::BookDetails,
        clock::{Clock, ManualClock},
        config::LendingConfig,
        engine::{AfterReturn, LendingEngine},
        error::SnapshotError,
        membership::{MemberId, MemberProfile},
    };

    /// Engine with a loan, a late return and a waiting member
    fn populated(clock: Arc<ManualClock>) -> LendingEngine {
        let mut engine = LendingEngine::with_clock(clock.clone());
        let dune = engine.add_book(BookDetails::new("Dune", "Frank Herbert", "Fiction"));
        let sicp = engine.add_book(BookDetails::new("SICP", "Abelson", "Programming"));
        let standard = MemberProfile::standard();
        let alice = engine.register_member("Alice", standard).unwrap();
        let premium = MemberProfile::premium();
        let bob = engine.register_member("Bob", premium).unwrap();
        engine.issue(sicp, bob).unwrap();
        clock.advance(30);
        engine.return_book(sicp, bob).unwrap();
        engine.issue(dune, alice).unwrap();
        engine.reserve(dune, bob).unwrap();
        engine
    }

    /// Clock used by the snapshot tests
    fn clock() -> Arc<ManualClock> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Arc::new(ManualClock::new(start))
    }

    /// Rebuild with the default policy
    fn restore(
        snapshot: Snapshot,
        clock: Arc<ManualClock>,
    ) -> Result<LendingEngine, SnapshotError> {
        LendingEngine::from_snapshot(snapshot, LendingConfig::default(), clock)
    }

    #[test]
    fn test_save_and_load_file() {
        let clock = clock();
        let engine = populated(clock.clone());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");

        engine.save_to_path(&path).unwrap();
        let config = LendingConfig::default();
        let loaded = LendingEngine::load_from_path(&path, config, clock).unwrap();

        assert_eq!(loaded.snapshot(), engine.snapshot());
        let mut members = loaded.membership().members();
        let bob = members.find(|m| m.name == "Bob").unwrap();
        assert_eq!(bob.fine_balance(), dec!(1.00));
        assert_eq!(bob.profile, MemberProfile::premium());
        assert_eq!(loaded.all_reservations().count(), 1);
        assert_eq!(loaded.catalog().next_id(), 3);
    }

    #[test]
    fn test_loaded_engine_keeps_lending() {
        let clock = clock();
        let snapshot = populated(clock.clone()).snapshot();
        let mut engine = restore(snapshot, clock.clone()).unwrap();
        let mut books = engine.catalog().books();
        let dune = books.find(|b| b.title == "Dune").unwrap().id();
        drop(books);
        let alice = engine.loan(dune).unwrap().member;

        let receipt = engine.return_book(dune, alice).unwrap();
        assert!(matches!(receipt.next, AfterReturn::Reissued(_)));
        assert_eq!(engine.loan(dune).unwrap().issued_on, clock.today());
    }

    #[test]
    fn test_rejects_other_versions() {
        let clock = clock();
        let snapshot = Snapshot {
            version: 2,
            ..populated(clock.clone()).snapshot()
        };
        let err = restore(snapshot, clock).unwrap_err();
        let expected = SnapshotError::UnsupportedVersion {
            found: 2,
            expected: 1,
        };
        assert_eq!(err.to_string(), expected.to_string());
    }

    #[test]
    fn test_rejects_inconsistent_records() {
        let clock = clock();
        let mut snapshot = populated(clock.clone()).snapshot();
        let issued = BookStatus::Issued;
        assert!(snapshot.books.iter().any(|b| b.status() == issued));
        snapshot.loans.clear();

        let err = restore(snapshot, clock).unwrap_err();
        assert!(matches!(err, SnapshotError::Inconsistent(_)));
    }

    #[test]
    fn test_rejects_unknown_member_refs() {
        let clock = clock();
        let snapshot = populated(clock.clone()).snapshot();

        let mut orphan_loan = snapshot.clone();
        orphan_loan.loans[0].member = MemberId(99);
        let err = restore(orphan_loan, clock.clone()).unwrap_err();
        assert!(matches!(err, SnapshotError::Inconsistent(ref msg) if msg.contains("M99")));

        let mut orphan_queue = snapshot;
        orphan_queue.reservations[0].members = vec![MemberId(77)];
        let err = restore(orphan_queue, clock).unwrap_err();
        assert!(matches!(err, SnapshotError::Inconsistent(ref msg) if msg.contains("M77")));
    }

    #[test]
    fn test_rejects_zero_loan_period_profile() {
        let clock = clock();
        let mut snapshot = populated(clock.clone()).snapshot();
        let zero = MemberProfile::standard().with_loan_period(0);
        snapshot.members[0].profile = zero;

        let err = restore(snapshot, clock).unwrap_err();
        assert!(matches!(err, SnapshotError::Inconsistent(_)));
    }

    #[test]
    fn test_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = LendingConfig::default();
        let err = LendingEngine::load_from_path(&path, config, clock()).unwrap_err();
        assert!(matches!(err, SnapshotError::Json(_)));

        let absent = dir.path().join("absent.json");
        let config = LendingConfig::default();
        let missing = LendingEngine::load_from_path(absent, config, clock());
        assert!(matches!(missing, Err(SnapshotError::Io(_))));
    }
}
