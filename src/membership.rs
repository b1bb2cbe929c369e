use std::{collections::BTreeMap, fmt};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LendingError;

/// Identifier of a member, assigned sequentially from 1
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct MemberId(pub u32);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.0)
    }
}

/// Borrowing policy attached to a member.
///
/// A premium membership is just a different profile, not a different kind of member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MemberProfile {
    /// Cap on simultaneous loans; `None` falls back to the configured default
    pub max_books_allowed: Option<usize>,
    /// Loan period in days; `None` falls back to the configured period
    pub loan_period_override: Option<u32>,
}

impl MemberProfile {
    /// Profile that uses the configured defaults
    #[must_use]
    pub fn standard() -> Self {
        Self::default()
    }

    /// Two extra weeks on top of the standard fourteen days
    #[must_use]
    pub fn premium() -> Self {
        Self {
            max_books_allowed: None,
            loan_period_override: Some(28),
        }
    }

    /// Set the loan cap
    #[must_use]
    pub fn with_max_books(mut self, max_books_allowed: usize) -> Self {
        self.max_books_allowed = Some(max_books_allowed);
        self
    }

    /// Set the loan period
    #[must_use]
    pub fn with_loan_period(mut self, days: u32) -> Self {
        self.loan_period_override = Some(days);
        self
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `LendingError::InvalidProfile` for a zero loan period
    pub fn validate(&self) -> Result<(), LendingError> {
        if self.loan_period_override == Some(0) {
            return Err(LendingError::InvalidProfile(
                "loan_period_override must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A library member
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Member {
    /// Stable identifier
    id: MemberId,
    /// Display name
    pub name: String,
    /// Borrowing policy
    pub profile: MemberProfile,
    /// Accumulated late-return fines, only written by the lending engine
    fine_balance: Decimal,
}

impl Member {
    /// Identifier of this member
    #[must_use]
    pub fn id(&self) -> MemberId {
        self.id
    }

    /// Outstanding fines
    #[must_use]
    pub fn fine_balance(&self) -> Decimal {
        self.fine_balance
    }

    /// Add a fine to the balance. Balances never decrease here.
    pub(crate) fn charge(&mut self, amount: Decimal) {
        if amount > Decimal::ZERO {
            self.fine_balance = self.fine_balance.saturating_add(amount);
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.name)
    }
}

/// The set of member records
#[derive(Debug, Clone)]
pub struct Membership {
    /// Members keyed by id
    members: BTreeMap<MemberId, Member>,
    /// Id handed to the next registered member
    next_id: u32,
}

impl Default for Membership {
    fn default() -> Self {
        Self::new()
    }
}

impl Membership {
    /// Create an empty membership roll
    #[must_use]
    pub fn new() -> Self {
        Self {
            members: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Rebuild from stored records
    pub(crate) fn from_parts(members: Vec<Member>, next_id: u32) -> Self {
        Self {
            members: members
                .into_iter()
                .map(|member| (member.id, member))
                .collect(),
            next_id,
        }
    }

    /// Id the next registered member will receive
    #[must_use]
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Register a member with a zero fine balance
    pub fn register(&mut self, name: &str, profile: MemberProfile) -> MemberId {
        let id = MemberId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        let member = Member {
            id,
            name: name.to_string(),
            profile,
            fine_balance: Decimal::ZERO,
        };
        self.members.insert(id, member);
        id
    }

    /// Change a member's borrowing profile. Returns `false` if the id is unknown.
    pub fn set_profile(&mut self, id: MemberId, profile: MemberProfile) -> bool {
        let Some(member) = self.members.get_mut(&id) else {
            return false;
        };
        member.profile = profile;
        true
    }

    /// Look up a member
    #[must_use]
    pub fn find_member(&self, id: MemberId) -> Option<&Member> {
        self.members.get(&id)
    }

    /// Mutable lookup for fine charges
    pub(crate) fn find_member_mut(&mut self, id: MemberId) -> Option<&mut Member> {
        self.members.get_mut(&id)
    }

    /// All members in id order
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// Number of members
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether nobody is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::{MemberId, MemberProfile, Membership};
    use crate::error::LendingError;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_register_assigns_sequential_ids() {
        let mut membership = Membership::new();
        let alice = membership.register("Alice", MemberProfile::standard());
        let bob = membership.register("Bob", MemberProfile::premium());
        assert_eq!((alice, bob), (MemberId(1), MemberId(2)));
        let bob = membership.find_member(bob).unwrap();
        assert_eq!(bob.profile.loan_period_override, Some(28));
        let alice = membership.find_member(alice).unwrap();
        assert_eq!(alice.fine_balance(), dec!(0));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_charge_ignores_non_positive_amounts() {
        let mut membership = Membership::new();
        let id = membership.register("Carol", MemberProfile::standard());
        let member = membership.find_member_mut(id).unwrap();
        member.charge(dec!(1.50));
        member.charge(dec!(0));
        member.charge(dec!(-3));
        assert_eq!(member.fine_balance(), dec!(1.50));
    }

    #[test]
    fn test_profile_validation() {
        assert!(MemberProfile::premium().validate().is_ok());
        let one_day = MemberProfile::standard().with_loan_period(1);
        assert!(one_day.validate().is_ok());
        let err = MemberProfile::standard().with_loan_period(0).validate();
        assert!(matches!(err, Err(LendingError::InvalidProfile(_))));
    }

    #[test]
    fn test_set_profile_unknown_member() {
        let mut membership = Membership::new();
        let known = membership.set_profile(MemberId(5), MemberProfile::premium());
        assert!(!known);
    }
}
