use thiserror::Error;

use crate::decimal::{Money, Rate};
use crate::types::{LoanId, PaymentId};

#[derive(Error, Debug)]
pub enum LoanError {
    #[error("person name must be non-empty and at most {max} characters")]
    InvalidPersonName {
        max: usize,
    },

    #[error("description exceeds {max} characters")]
    DescriptionTooLong {
        max: usize,
    },

    #[error("principal must be positive: {amount}")]
    InvalidPrincipal {
        amount: Money,
    },

    #[error("interest rate must not be negative: {rate}")]
    InvalidInterestRate {
        rate: Rate,
    },

    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount {
        amount: Money,
    },

    #[error("payment exceeds remaining balance: remaining {remaining}, requested {requested}")]
    PaymentExceedsBalance {
        remaining: Money,
        requested: Money,
    },

    #[error("payment exceeds final installment due: due {due}, requested {requested}")]
    PaymentExceedsFinalInstallment {
        due: Money,
        requested: Money,
    },

    #[error("loan not found: {id}")]
    LoanNotFound {
        id: LoanId,
    },

    #[error("payment not found: {id}")]
    PaymentNotFound {
        id: PaymentId,
    },

    #[error("store operation failed: {source}")]
    Store {
        #[from]
        source: StoreError,
    },
}

/// failures surfaced by the external record store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("network error: {message}")]
    Network {
        message: String,
    },

    #[error("record not found: {key}")]
    NotFound {
        key: String,
    },

    #[error("permission denied for owner {owner}")]
    PermissionDenied {
        owner: String,
    },

    #[error("serialization error: {message}")]
    Serialization {
        message: String,
    },
}

impl StoreError {
    /// transient failures are retried; the rest fail immediately
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Network { .. })
    }
}

pub type Result<T> = std::result::Result<T, LoanError>;
