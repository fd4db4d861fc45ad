use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for a loan record
pub type LoanId = Uuid;

/// unique identifier for a payment record
pub type PaymentId = Uuid;

/// opaque owner key scoping store queries; assigned by the identity
/// provider, never inspected here
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerKey(pub String);

impl OwnerKey {
    pub fn new(key: impl Into<String>) -> Self {
        OwnerKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// direction of a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanType {
    /// money lent out to someone
    Lent,
    /// money borrowed from someone
    Borrowed,
}

/// loan status; persisted as a cache but always re-derivable from the
/// projected remaining amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LoanStatus {
    #[default]
    Active,
    Paid,
}

/// how a manually recorded payment was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Check,
    BankTransfer,
    Other,
}
