use serde::{Deserialize, Serialize};

use crate::decimal::{Money, CENTAVO};
use crate::loan::LoanRecord;
use crate::reconcile::{lump_sum_remaining, remaining_from_schedule};
use crate::types::LoanStatus;

/// authoritative remaining amount and status for a loan, derived live from
/// its schedule and payments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub remaining_amount: Money,
    pub status: LoanStatus,
}

impl Projection {
    pub fn is_settled(&self) -> bool {
        self.status == LoanStatus::Paid
    }
}

/// derive the loan's remaining amount and status
///
/// this is the one function every consumer (dashboard, list rendering,
/// due-date filtering, export) calls; the persisted `remaining_amount` and
/// `status` fields are a cache this projection overwrites, never an input.
/// the cache can go stale when a crash lands between recording a payment
/// and writing the cache back, which is exactly why decisions come from
/// here
pub fn project(loan: &LoanRecord) -> Projection {
    let remaining_amount = match &loan.monthly_breakdown {
        Some(breakdown) if !breakdown.is_empty() => {
            remaining_from_schedule(breakdown, &loan.payments)
        }
        _ => lump_sum_remaining(loan.amount, &loan.payments),
    };

    let status = if remaining_amount <= CENTAVO {
        LoanStatus::Paid
    } else {
        LoanStatus::Active
    };

    Projection {
        remaining_amount,
        status,
    }
}
