use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::loan::LoanRecord;
use crate::projection::project;
use crate::types::{LoanId, LoanType};

/// dashboard due-soon window
pub const DASHBOARD_DUE_SOON_DAYS: i64 = 7;
/// filter/search-bar due-soon window; deliberately narrower than the
/// dashboard's, the two are not the same constant
pub const FILTER_DUE_SOON_DAYS: i64 = 3;

/// per-direction aggregate totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeTotals {
    pub count: usize,
    /// sum of stored loan amounts
    pub original: Money,
    /// sum of live-projected remaining amounts
    pub current: Money,
    /// original minus current
    pub paid: Money,
}

/// rolled-up portfolio statistics for dashboard and export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub lent: TypeTotals,
    pub borrowed: TypeTotals,
    /// percent of loans fully paid, 0 with no loans
    pub completion_rate: Decimal,
    /// lent remaining minus borrowed remaining; positive means money is
    /// owed to the user
    pub net_position: Decimal,
}

impl LedgerSummary {
    pub fn net_framing(&self) -> NetPosition {
        if self.net_position.is_zero() {
            NetPosition::Settled
        } else if self.net_position.is_sign_positive() {
            NetPosition::OwedToYou(Money::from_decimal(self.net_position))
        } else {
            NetPosition::YouOwe(Money::from_decimal(-self.net_position))
        }
    }
}

/// sign-derived framing of the net position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetPosition {
    OwedToYou(Money),
    YouOwe(Money),
    Settled,
}

/// an active loan classified against its due date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueClassification {
    pub loan_id: LoanId,
    pub person_name: String,
    pub due_date: NaiveDate,
    pub remaining_amount: Money,
    /// days past due for overdue loans, days until due for due-soon loans
    pub days: i64,
}

/// roll all loans up into summary statistics
///
/// totals come from the live projection, never the cached fields, so the
/// dashboard and the exported report always agree
pub fn summarize(loans: &[LoanRecord]) -> LedgerSummary {
    let mut lent = TypeTotals::default();
    let mut borrowed = TypeTotals::default();
    let mut settled = 0usize;

    for loan in loans {
        let projection = project(loan);
        if projection.remaining_amount.is_zero() {
            settled += 1;
        }

        let bucket = match loan.loan_type {
            LoanType::Lent => &mut lent,
            LoanType::Borrowed => &mut borrowed,
        };
        bucket.count += 1;
        bucket.original += loan.amount;
        bucket.current += projection.remaining_amount;
    }

    lent.paid = lent.original.saturating_sub(lent.current);
    borrowed.paid = borrowed.original.saturating_sub(borrowed.current);

    let completion_rate = if loans.is_empty() {
        Decimal::ZERO
    } else {
        Decimal::from(settled) / Decimal::from(loans.len()) * Decimal::from(100)
    };

    let net_position = lent.current.as_decimal() - borrowed.current.as_decimal();

    LedgerSummary {
        lent,
        borrowed,
        completion_rate,
        net_position,
    }
}

/// active loans whose due date has passed, with days overdue
pub fn overdue(loans: &[LoanRecord], time_provider: &SafeTimeProvider) -> Vec<DueClassification> {
    let today = time_provider.now().date_naive();
    classify(loans, |due, remaining| {
        if due <= today && remaining.is_positive() {
            Some((today - due).num_days())
        } else {
            None
        }
    })
}

/// active loans coming due within the next `window_days` days; the
/// dashboard passes [`DASHBOARD_DUE_SOON_DAYS`], the filter bar
/// [`FILTER_DUE_SOON_DAYS`]
pub fn due_within(
    loans: &[LoanRecord],
    window_days: i64,
    time_provider: &SafeTimeProvider,
) -> Vec<DueClassification> {
    let today = time_provider.now().date_naive();
    classify(loans, |due, remaining| {
        let days_until = (due - today).num_days();
        if days_until > 0 && days_until <= window_days && remaining.is_positive() {
            Some(days_until)
        } else {
            None
        }
    })
}

fn classify(
    loans: &[LoanRecord],
    mut rule: impl FnMut(NaiveDate, Money) -> Option<i64>,
) -> Vec<DueClassification> {
    let mut matched = Vec::new();
    for loan in loans {
        let Some(due_date) = loan.due_date else {
            continue;
        };
        let projection = project(loan);
        if projection.is_settled() {
            continue;
        }
        if let Some(days) = rule(due_date, projection.remaining_amount) {
            matched.push(DueClassification {
                loan_id: loan.id,
                person_name: loan.person_name.clone(),
                due_date,
                remaining_amount: projection.remaining_amount,
                days,
            });
        }
    }
    matched
}
