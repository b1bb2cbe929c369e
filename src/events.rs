use serde::{Deserialize, Serialize};

use crate::membership::MemberId;

/// Events that move a book between lending statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LendingEvent {
    /// Book issued to a member at the counter
    Issue { member: MemberId },
    /// Borrower returned the book
    Return { member: MemberId },
    /// Returned book handed straight to the head of its reservation queue
    Reissue { member: MemberId },
    /// Returned book held for the head of its reservation queue
    HoldForClaim { member: MemberId },
    /// Borrower extended the due date
    Renew { member: MemberId },
    /// Member joined the reservation queue
    Reserve { member: MemberId },
    /// Member left the reservation queue
    CancelReservation { member: MemberId },
}

impl LendingEvent {
    /// Member the event acted on
    #[must_use]
    pub fn member(self) -> MemberId {
        match self {
            Self::Issue { member }
            | Self::Return { member }
            | Self::Reissue { member }
            | Self::HoldForClaim { member }
            | Self::Renew { member }
            | Self::Reserve { member }
            | Self::CancelReservation { member } => member,
        }
    }
}
