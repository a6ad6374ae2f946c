//! Account records as seen by the transfer core (read-only)

use std::fmt;

use serde::{Deserialize, Serialize};

/// Account identifier issued by the account registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Account status
///
/// Status codes: 1=ACTIVE, 2=FROZEN, 3=CLOSED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum AccountStatus {
    Active = 1,
    Frozen = 2,
    Closed = 3,
}

impl AccountStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(AccountStatus::Active),
            2 => Some(AccountStatus::Frozen),
            3 => Some(AccountStatus::Closed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Frozen => "FROZEN",
            AccountStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account record owned by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Principal that owns the account
    pub owner_id: String,
    pub status: AccountStatus,
    /// ISO 4217 currency code
    pub currency: String,
}

impl Account {
    pub fn new(
        id: impl Into<AccountId>,
        owner_id: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            status: AccountStatus::Active,
            currency: currency.into(),
        }
    }

    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    pub fn is_owned_by(&self, principal_id: &str) -> bool {
        self.owner_id == principal_id
    }
}
