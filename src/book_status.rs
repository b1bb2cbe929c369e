use std::fmt;

use serde::{Deserialize, Serialize};

/// Lending status of a catalogued book
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookStatus {
    /// Book is on the shelf and nobody is waiting for it
    #[default]
    Available,
    /// Book is out on an active loan
    Issued,
    /// Book has no loan but members are queued for it
    Reserved,
}

impl BookStatus {
    /// Get a human-readable description of the status
    #[must_use]
    pub fn get_description(self) -> &'static str {
        match self {
            Self::Available => "Book is available for issue",
            Self::Issued => "Book is issued to a member",
            Self::Reserved => "Book is held for the next member in the reservation queue",
        }
    }

    /// Stable upper-case label, matching the serialized form
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Issued => "ISSUED",
            Self::Reserved => "RESERVED",
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::BookStatus;

    #[test]
    fn test_default_is_available() {
        assert_eq!(BookStatus::default(), BookStatus::Available);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_serialized_label_matches_display() {
        let json = serde_json::to_string(&BookStatus::Reserved).unwrap();
        assert_eq!(json, "\"RESERVED\"");
        assert_eq!(BookStatus::Reserved.to_string(), "RESERVED");
    }
}
