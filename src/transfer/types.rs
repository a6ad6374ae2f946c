//! Transfer request/response types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::TransferError;
use crate::account::AccountId;
use crate::ledger::Transaction;

/// Authenticated caller, supplied by the authentication layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    System,
}

impl Role {
    /// Unknown roles are treated as plain users
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("system") {
            Role::System
        } else {
            Role::User
        }
    }
}

impl Principal {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            name: None,
            role: Role::User,
        }
    }

    pub fn system(id: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            ..Self::user(id)
        }
    }

    #[inline]
    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// `POST /transfers` body. Fields are optional so that missing ones surface
/// as validation errors rather than deserialization failures.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    #[schema(example = "acc-alice")]
    pub from_account: Option<String>,
    #[schema(example = "acc-bob")]
    pub to_account: Option<String>,
    #[schema(value_type = Option<String>, example = "40.00")]
    pub amount: Option<Decimal>,
    #[schema(example = "7f1c2a9e-transfer-1")]
    pub idempotency_key: Option<String>,
}

/// `POST /transfers/system/initial-funds` body
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FundingRequest {
    pub to_account: Option<String>,
    #[schema(value_type = Option<String>, example = "100.00")]
    pub amount: Option<Decimal>,
    pub idempotency_key: Option<String>,
}

/// Fractional digits the ledger stores (`NUMERIC(30, 8)`)
pub const AMOUNT_SCALE: u32 = 8;

/// Exclusive upper bound: 22 integer digits
pub fn max_amount() -> Decimal {
    Decimal::from_i128_with_scale(10_i128.pow(22), 0)
}

/// A request that passed field validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTransfer {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Decimal,
    pub idempotency_key: String,
}

fn required(field: Option<String>, name: &'static str) -> Result<String, TransferError> {
    match field {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(TransferError::MissingField(name)),
    }
}

impl ValidTransfer {
    pub fn new(
        from: Option<String>,
        to: Option<String>,
        amount: Option<Decimal>,
        idempotency_key: Option<String>,
    ) -> Result<Self, TransferError> {
        let from = required(from, "fromAccount")?;
        let to = required(to, "toAccount")?;
        let amount = amount.ok_or(TransferError::MissingField("amount"))?;
        let idempotency_key = required(idempotency_key, "idempotencyKey")?;

        if amount <= Decimal::ZERO {
            return Err(TransferError::InvalidAmount);
        }
        // Trailing zeros are dropped so every store echoes the same value
        let amount = amount.normalize();
        if amount.scale() > AMOUNT_SCALE || amount >= max_amount() {
            return Err(TransferError::AmountOutOfRange {
                max_scale: AMOUNT_SCALE,
                max: max_amount().to_string(),
            });
        }
        if from == to {
            return Err(TransferError::SameAccount);
        }

        Ok(Self {
            from: AccountId::new(from),
            to: AccountId::new(to),
            amount,
            idempotency_key,
        })
    }
}

impl TryFrom<TransferRequest> for ValidTransfer {
    type Error = TransferError;

    fn try_from(req: TransferRequest) -> Result<Self, Self::Error> {
        ValidTransfer::new(
            req.from_account,
            req.to_account,
            req.amount,
            req.idempotency_key,
        )
    }
}

/// Result of a transfer submission that is not an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Executed now; the transaction is COMPLETED
    Created(Transaction),
    /// The key belongs to a COMPLETED transaction; returned verbatim
    Replayed(Transaction),
    /// The key belongs to a transaction still PENDING
    InProgress(Transaction),
}

impl TransferOutcome {
    pub fn transaction(&self) -> &Transaction {
        match self {
            TransferOutcome::Created(tx)
            | TransferOutcome::Replayed(tx)
            | TransferOutcome::InProgress(tx) => tx,
        }
    }

    pub fn into_transaction(self) -> Transaction {
        match self {
            TransferOutcome::Created(tx)
            | TransferOutcome::Replayed(tx)
            | TransferOutcome::InProgress(tx) => tx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(from: &str, to: &str, amount: i64, key: &str) -> TransferRequest {
        TransferRequest {
            from_account: Some(from.into()),
            to_account: Some(to.into()),
            amount: Some(Decimal::from(amount)),
            idempotency_key: Some(key.into()),
        }
    }

    #[test]
    fn test_valid_request() {
        let valid = ValidTransfer::try_from(request("A", "B", 40, "K1")).unwrap();
        assert_eq!(valid.from.as_str(), "A");
        assert_eq!(valid.amount, Decimal::from(40));
    }

    #[test]
    fn test_missing_fields() {
        let mut req = request("A", "B", 40, "K1");
        req.idempotency_key = None;
        assert_eq!(
            ValidTransfer::try_from(req).unwrap_err(),
            TransferError::MissingField("idempotencyKey")
        );

        let mut req = request("A", "B", 40, "K1");
        req.from_account = Some("  ".into());
        assert_eq!(
            ValidTransfer::try_from(req).unwrap_err(),
            TransferError::MissingField("fromAccount")
        );

        let mut req = request("A", "B", 40, "K1");
        req.amount = None;
        assert_eq!(
            ValidTransfer::try_from(req).unwrap_err(),
            TransferError::MissingField("amount")
        );
    }

    #[test]
    fn test_amount_and_same_account() {
        assert_eq!(
            ValidTransfer::try_from(request("A", "B", 0, "K")).unwrap_err(),
            TransferError::InvalidAmount
        );
        assert_eq!(
            ValidTransfer::try_from(request("A", "B", -5, "K")).unwrap_err(),
            TransferError::InvalidAmount
        );
        assert_eq!(
            ValidTransfer::try_from(request("A", "A", 5, "K")).unwrap_err(),
            TransferError::SameAccount
        );
    }

    #[test]
    fn test_amount_bounds() {
        let mut req = request("A", "B", 1, "K");
        req.amount = Some(Decimal::new(1, 9));
        assert!(matches!(
            ValidTransfer::try_from(req).unwrap_err(),
            TransferError::AmountOutOfRange { max_scale: 8, .. }
        ));

        let mut req = request("A", "B", 1, "K");
        req.amount = Some(max_amount());
        assert!(matches!(
            ValidTransfer::try_from(req).unwrap_err(),
            TransferError::AmountOutOfRange { .. }
        ));

        let mut req = request("A", "B", 1, "K");
        req.amount = Some(max_amount() - Decimal::ONE);
        assert!(ValidTransfer::try_from(req).is_ok());

        // Trailing zeros beyond the stored scale are not precision
        let mut req = request("A", "B", 1, "K");
        req.amount = Some(Decimal::new(1_500_000_000_000, 12));
        let valid = ValidTransfer::try_from(req).unwrap();
        assert_eq!(valid.amount.to_string(), "1.5");
    }

    #[test]
    fn test_camel_case_body() {
        let body = r#"{"fromAccount":"A","toAccount":"B","amount":"12.50","idempotencyKey":"K"}"#;
        let req: TransferRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.amount, Some(Decimal::new(1250, 2)));
        assert_eq!(req.to_account.as_deref(), Some("B"));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("SYSTEM"), Role::System);
        assert_eq!(Role::parse("admin"), Role::User);
        assert!(Principal::system("ops").is_system());
    }
}
