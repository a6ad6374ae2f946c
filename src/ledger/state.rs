//! Transaction Lifecycle States
//!
//! State IDs are stored as SMALLINT in `transactions.status`.

use std::fmt;

/// Transaction lifecycle states
///
/// ```text
/// PENDING → COMPLETED → REVERSED
///    ↓
///  FAILED
/// ```
///
/// Terminal states: COMPLETED (only reversible), FAILED (-10), REVERSED (-20).
/// No transition ever moves backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum TransactionStatus {
    /// Durable record that a transfer was attempted; no ledger entries yet
    Pending = 0,

    /// Both ledger legs committed together with this status
    Completed = 10,

    /// Terminal: the atomic write never committed
    Failed = -10,

    /// Terminal: a completed transfer was reversed
    Reversed = -20,
}

impl TransactionStatus {
    /// Check if this is a terminal state for its idempotency key
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Whether `next` is a legal forward edge from this state
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Completed)
                | (TransactionStatus::Pending, TransactionStatus::Failed)
                | (TransactionStatus::Completed, TransactionStatus::Reversed)
        )
    }

    /// Get the numeric state ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from PostgreSQL state ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransactionStatus::Pending),
            10 => Some(TransactionStatus::Completed),
            -10 => Some(TransactionStatus::Failed),
            -20 => Some(TransactionStatus::Reversed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Reversed => "REVERSED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for TransactionStatus {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        TransactionStatus::from_id(value).ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Reversed.is_terminal());
        assert!(!TransactionStatus::Pending.is_terminal());
    }

    #[test]
    fn test_forward_only_transitions() {
        use TransactionStatus::*;

        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        assert!(Completed.can_transition_to(Reversed));

        assert!(!Completed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Reversed.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Reversed));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_invalid_state_id() {
        assert!(TransactionStatus::from_id(999).is_none());
        assert!(TransactionStatus::from_id(-30).is_none());
        assert_eq!(
            TransactionStatus::from_id(-10),
            Some(TransactionStatus::Failed)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(TransactionStatus::Pending.to_string(), "PENDING");
        assert_eq!(TransactionStatus::Completed.to_string(), "COMPLETED");
        assert_eq!(TransactionStatus::Reversed.to_string(), "REVERSED");
    }
}
