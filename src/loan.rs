use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::schedule::{InstallmentPeriod, Schedule};
use crate::types::{LoanId, LoanStatus, LoanType, PaymentId, PaymentMethod};

pub const MAX_PERSON_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// a tracked loan, lent or borrowed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub id: LoanId,
    pub person_name: String,
    pub loan_type: LoanType,

    /// amount before interest
    pub original_principal: Money,
    /// total amount due: principal plus total interest when a schedule
    /// exists, else equal to the principal
    pub amount: Money,
    /// denormalized outstanding-balance cache; advisory only — decision
    /// logic re-derives it through the projection module
    #[serde(default)]
    pub remaining_amount: Option<Money>,
    #[serde(default)]
    pub interest_rate: Rate,

    pub date: NaiveDate,
    /// presence triggered schedule generation at creation/edit time
    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    /// cached status; advisory only, same rule as `remaining_amount`
    #[serde(default)]
    pub status: LoanStatus,

    /// immutable schedule snapshot, present iff `due_date` was set
    #[serde(default)]
    pub monthly_breakdown: Option<Vec<InstallmentPeriod>>,

    /// payment records keyed by store-assigned id; insertion order is
    /// irrelevant, reconciliation sorts by timestamp
    #[serde(default)]
    pub payments: HashMap<PaymentId, PaymentRecord>,

    #[serde(default)]
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// validated input for creating or editing a loan
#[derive(Debug, Clone)]
pub struct LoanDraft {
    pub person_name: String,
    pub loan_type: LoanType,
    pub principal: Money,
    pub interest_rate: Rate,
    pub date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl LoanDraft {
    pub fn validate(&self) -> Result<()> {
        let name = self.person_name.trim();
        if name.is_empty() || name.chars().count() > MAX_PERSON_NAME_LEN {
            return Err(LoanError::InvalidPersonName {
                max: MAX_PERSON_NAME_LEN,
            });
        }
        if !self.principal.is_positive() {
            return Err(LoanError::InvalidPrincipal {
                amount: self.principal,
            });
        }
        if self.interest_rate.is_negative() {
            return Err(LoanError::InvalidInterestRate {
                rate: self.interest_rate,
            });
        }
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(LoanError::DescriptionTooLong {
                    max: MAX_DESCRIPTION_LEN,
                });
            }
        }
        Ok(())
    }
}

impl LoanRecord {
    /// create a loan from a validated draft, generating the installment
    /// schedule when a workable due date is present
    pub fn create(draft: LoanDraft, now: DateTime<Utc>) -> Result<Self> {
        draft.validate()?;

        let schedule = Schedule::build(
            draft.principal,
            draft.date,
            draft.due_date,
            draft.interest_rate,
        );
        let (amount, monthly_breakdown) = match schedule {
            Some(s) => (s.total_amount, Some(s.periods)),
            None => (draft.principal, None),
        };

        Ok(Self {
            id: Uuid::new_v4(),
            person_name: draft.person_name.trim().to_string(),
            loan_type: draft.loan_type,
            original_principal: draft.principal,
            amount,
            remaining_amount: Some(amount),
            interest_rate: draft.interest_rate,
            date: draft.date,
            due_date: draft.due_date,
            status: LoanStatus::Active,
            monthly_breakdown,
            payments: HashMap::new(),
            description: draft.description,
            created_at: now,
            updated_at: now,
        })
    }

    /// rebuild the loan's terms from an edited draft, keeping id, payments,
    /// and creation time; the schedule snapshot is regenerated
    pub fn apply_edit(&mut self, draft: LoanDraft, now: DateTime<Utc>) -> Result<()> {
        draft.validate()?;

        let schedule = Schedule::build(
            draft.principal,
            draft.date,
            draft.due_date,
            draft.interest_rate,
        );
        let (amount, monthly_breakdown) = match schedule {
            Some(s) => (s.total_amount, Some(s.periods)),
            None => (draft.principal, None),
        };

        self.person_name = draft.person_name.trim().to_string();
        self.loan_type = draft.loan_type;
        self.original_principal = draft.principal;
        self.amount = amount;
        self.interest_rate = draft.interest_rate;
        self.date = draft.date;
        self.due_date = draft.due_date;
        self.monthly_breakdown = monthly_breakdown;
        self.description = draft.description;
        self.updated_at = now;
        Ok(())
    }

    /// fill optional fields once at the store boundary; records written by
    /// older clients may lack the denormalized cache entirely
    pub fn fill_defaults(&mut self) {
        if self.remaining_amount.is_none() {
            self.remaining_amount = Some(self.amount);
        }
    }

    /// the cached outstanding balance; possibly stale relative to
    /// `payments` — prefer `projection::project` for any decision
    pub fn cached_remaining(&self) -> Money {
        self.remaining_amount.unwrap_or(self.amount)
    }

    pub fn has_schedule(&self) -> bool {
        self.monthly_breakdown
            .as_ref()
            .map(|b| !b.is_empty())
            .unwrap_or(false)
    }

    /// sum of all recorded payments, regardless of schedule
    pub fn payments_total(&self) -> Money {
        self.payments.values().map(|p| p.amount).sum()
    }
}

/// proof image reference returned by the blob-upload service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofAttachment {
    pub url: String,
    pub public_id: String,
}

/// extra fields carried by manually entered payments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ManualPaymentDetails {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub witness_name: Option<String>,
    #[serde(default)]
    pub witness_contact: Option<String>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub receipt_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// a single recorded payment; append-only, never mutated in place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub amount: Money,
    /// orders application against the schedule; storage order is irrelevant
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub proof: Option<ProofAttachment>,
    #[serde(default)]
    pub details: Option<ManualPaymentDetails>,
}

impl PaymentRecord {
    pub fn new(amount: Money, timestamp: DateTime<Utc>) -> Result<Self> {
        if !amount.is_positive() {
            return Err(LoanError::InvalidPaymentAmount { amount });
        }
        Ok(Self {
            id: Uuid::new_v4(),
            amount,
            timestamp,
            proof: None,
            details: None,
        })
    }

    pub fn with_proof(mut self, proof: ProofAttachment) -> Self {
        self.proof = Some(proof);
        self
    }

    pub fn with_details(mut self, details: ManualPaymentDetails) -> Self {
        self.details = Some(details);
        self
    }
}
