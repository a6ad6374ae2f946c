//! Balance Deriver
//!
//! A balance is never stored. It is the fold of an account's ledger entries:
//! `Σ CREDIT − Σ DEBIT`.

use std::sync::Arc;

use rust_decimal::Decimal;

use super::error::StoreError;
use super::repository::LedgerRepository;
use super::types::LedgerEntry;
use crate::account::AccountId;

/// Fold the entries belonging to `account`; entries of other accounts are ignored.
///
/// Fails with [`StoreError::BalanceOverflow`] instead of panicking when the
/// sum leaves the `Decimal` range.
pub fn derive_balance<'a, I>(account: &AccountId, entries: I) -> Result<Decimal, StoreError>
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    entries
        .into_iter()
        .filter(|e| e.account() == account)
        .try_fold(Decimal::ZERO, |acc, e| acc.checked_add(e.signed_amount()))
        .ok_or_else(|| StoreError::BalanceOverflow(account.to_string()))
}

/// Computes balances from the ledger repository on every call
#[derive(Clone)]
pub struct BalanceDeriver {
    ledger: Arc<dyn LedgerRepository>,
}

impl BalanceDeriver {
    pub fn new(ledger: Arc<dyn LedgerRepository>) -> Self {
        Self { ledger }
    }

    pub async fn balance(&self, account: &AccountId) -> Result<Decimal, StoreError> {
        self.ledger.balance_of(account).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::{Transaction, now};

    fn legs(from: &str, to: &str, amount: i64) -> [LedgerEntry; 2] {
        legs_of(from, to, Decimal::from(amount))
    }

    fn legs_of(from: &str, to: &str, amount: Decimal) -> [LedgerEntry; 2] {
        let tx = Transaction::pending(
            AccountId::from(from),
            AccountId::from(to),
            amount,
            "INR",
            ulid::Ulid::new().to_string(),
        );
        LedgerEntry::legs(&tx, now())
    }

    #[test]
    fn test_empty_ledger_is_zero() {
        let entries: Vec<LedgerEntry> = Vec::new();
        assert_eq!(
            derive_balance(&AccountId::from("A"), &entries).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_credits_minus_debits() {
        let mut entries = Vec::new();
        entries.extend(legs("T", "A", 100));
        entries.extend(legs("A", "B", 40));
        entries.extend(legs("B", "A", 5));

        assert_eq!(derive_balance(&"A".into(), &entries).unwrap(), Decimal::from(65));
        assert_eq!(derive_balance(&"B".into(), &entries).unwrap(), Decimal::from(35));
        assert_eq!(derive_balance(&"T".into(), &entries).unwrap(), Decimal::from(-100));
    }

    #[test]
    fn test_ledger_sums_to_zero() {
        let mut entries = Vec::new();
        entries.extend(legs("T", "A", 100));
        entries.extend(legs("A", "B", 40));

        let total: Decimal = ["T", "A", "B"]
            .iter()
            .map(|a| derive_balance(&AccountId::from(*a), &entries).unwrap())
            .sum();
        assert_eq!(total, Decimal::ZERO);
    }

    #[test]
    fn test_overflowing_sum_is_an_error() {
        let half = Decimal::MAX / Decimal::TWO + Decimal::ONE;
        let mut entries = Vec::new();
        entries.extend(legs_of("T", "A", half));
        entries.extend(legs_of("U", "A", half));

        assert_eq!(
            derive_balance(&"A".into(), &entries),
            Err(StoreError::BalanceOverflow("A".to_string()))
        );
        // Other accounts still fold
        assert_eq!(derive_balance(&"T".into(), &entries).unwrap(), -half);
    }
}
