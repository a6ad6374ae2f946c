//! Ledger Core Types
//!
//! `Transaction` is the mutable-by-status record of a transfer attempt.
//! `LedgerEntry` is write-once: its fields are private and there is no setter.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;

use super::state::TransactionStatus;
use crate::account::AccountId;

/// Current time at storage precision (microseconds), so a record read back
/// from PostgreSQL compares equal to the one that was written.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(ulid::Ulid);

        impl $name {
            pub fn new() -> Self {
                Self(ulid::Ulid::new())
            }

            pub fn inner(&self) -> ulid::Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(ulid::Ulid::from_string(s)?))
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }
    };
}

ulid_id!(
    /// Transaction identifier (ULID: sortable, no coordination needed)
    TransactionId
);

ulid_id!(
    /// Ledger entry identifier
    EntryId
);

/// Side of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum EntryType {
    Debit = 1,
    Credit = 2,
}

impl EntryType {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(EntryType::Debit),
            2 => Some(EntryType::Credit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Debit => "DEBIT",
            EntryType::Credit => "CREDIT",
        }
    }

    /// Contribution of an entry of this type to the account balance
    #[inline]
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            EntryType::Debit => -amount,
            EntryType::Credit => amount,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transfer attempt between two accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,
    pub from_account: AccountId,
    pub to_account: AccountId,
    pub amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub idempotency_key: String,
    /// Reason recorded when the transaction moved to FAILED
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a new PENDING transaction
    pub fn pending(
        from_account: AccountId,
        to_account: AccountId,
        amount: Decimal,
        currency: impl Into<String>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        let ts = now();
        Self {
            id: TransactionId::new(),
            from_account,
            to_account,
            amount,
            currency: currency.into(),
            status: TransactionStatus::Pending,
            idempotency_key: idempotency_key.into(),
            error: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    /// Copy of this record after a status transition at `at`
    pub fn transitioned(&self, status: TransactionStatus, at: DateTime<Utc>) -> Self {
        Self {
            status,
            updated_at: at,
            ..self.clone()
        }
    }
}

/// One side of a completed transfer. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    id: EntryId,
    account: AccountId,
    transaction_id: TransactionId,
    entry_type: EntryType,
    amount: Decimal,
    created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Rehydrate a stored entry
    pub(crate) fn from_parts(
        id: EntryId,
        account: AccountId,
        transaction_id: TransactionId,
        entry_type: EntryType,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account,
            transaction_id,
            entry_type,
            amount,
            created_at,
        }
    }

    /// The DEBIT (from account) and CREDIT (to account) legs of a transaction
    pub fn legs(tx: &Transaction, at: DateTime<Utc>) -> [LedgerEntry; 2] {
        let leg = |account: &AccountId, entry_type| LedgerEntry {
            id: EntryId::new(),
            account: account.clone(),
            transaction_id: tx.id,
            entry_type,
            amount: tx.amount,
            created_at: at,
        };
        [
            leg(&tx.from_account, EntryType::Debit),
            leg(&tx.to_account, EntryType::Credit),
        ]
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    /// Positive magnitude
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Signed contribution to the owning account's balance
    pub fn signed_amount(&self) -> Decimal {
        self.entry_type.signed(self.amount)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction::pending(
            AccountId::from("A"),
            AccountId::from("B"),
            Decimal::from(40),
            "INR",
            "K1",
        )
    }

    #[test]
    fn test_pending_transaction_defaults() {
        let tx = sample_tx();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.created_at, tx.updated_at);
        assert!(tx.error.is_none());
    }

    #[test]
    fn test_legs_are_balanced() {
        let tx = sample_tx();
        let [debit, credit] = LedgerEntry::legs(&tx, now());

        assert_eq!(debit.entry_type(), EntryType::Debit);
        assert_eq!(debit.account(), &tx.from_account);
        assert_eq!(credit.entry_type(), EntryType::Credit);
        assert_eq!(credit.account(), &tx.to_account);
        assert_eq!(debit.amount(), credit.amount());
        assert_eq!(debit.signed_amount() + credit.signed_amount(), Decimal::ZERO);
        assert_eq!(debit.transaction_id(), tx.id);
        assert_ne!(debit.id(), credit.id());
    }

    #[test]
    fn test_transitioned_keeps_identity() {
        let tx = sample_tx();
        let at = now();
        let done = tx.transitioned(TransactionStatus::Completed, at);
        assert_eq!(done.id, tx.id);
        assert_eq!(done.created_at, tx.created_at);
        assert_eq!(done.updated_at, at);
        assert_eq!(done.status, TransactionStatus::Completed);
    }

    #[test]
    fn test_id_parse() {
        let id = TransactionId::new();
        let parsed: TransactionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-ulid".parse::<TransactionId>().is_err());
    }

    #[test]
    fn test_now_is_microsecond_precision() {
        assert_eq!(now().timestamp_subsec_nanos() % 1_000, 0);
    }
}
