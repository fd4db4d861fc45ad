use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};

/// one scheduled monthly installment
///
/// this is the immutable schedule shape persisted on the loan; paid-state
/// (`paid_amount`, `is_paid`, `paid_date`) is never stored here — it is
/// re-derived from the payment collection on every use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPeriod {
    /// 1-based sequence index, fixed at creation
    pub month: u32,
    pub due_date: NaiveDate,
    pub principal_amount: Money,
    pub interest_amount: Money,
    pub total_amount: Money,
}

/// monthly breakdown for a loan with a due date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub periods: Vec<InstallmentPeriod>,
    pub total_interest: Money,
    pub total_amount: Money,
    /// representative installment (non-final principal share + interest)
    pub monthly_payment: Money,
}

impl Schedule {
    /// build the monthly breakdown for a loan, flat add-on method
    ///
    /// returns `None` when the due date does not yield at least one full
    /// period; the loan then degrades to lump-sum tracking, which is not
    /// an error
    ///
    /// period count uses a fixed 30-day-per-period approximation while the
    /// per-period due dates use true calendar-month arithmetic; the two can
    /// disagree near 31-day-month boundaries and both are kept as-is
    pub fn build(
        principal: Money,
        start_date: NaiveDate,
        due_date: Option<NaiveDate>,
        monthly_rate: Rate,
    ) -> Option<Self> {
        let due_date = due_date?;
        if due_date <= start_date {
            return None;
        }

        let days = (due_date - start_date).num_days();
        let period_count = days_to_period_count(days);
        if period_count == 0 {
            return None;
        }

        let interest_per_period = if monthly_rate.is_zero() {
            Money::ZERO
        } else {
            (principal * monthly_rate.as_decimal()).normalized()
        };

        // equal principal shares, final period absorbs the rounding
        // remainder so the shares sum exactly to the principal
        let principal_per_period = principal / Decimal::from(period_count);

        let mut periods = Vec::with_capacity(period_count as usize);
        let mut allocated = Money::ZERO;

        for i in 0..period_count {
            let is_last = i == period_count - 1;
            let principal_amount = if is_last {
                principal - allocated
            } else {
                principal_per_period
            };
            allocated += principal_amount;

            periods.push(InstallmentPeriod {
                month: i + 1,
                due_date: add_calendar_months(start_date, i + 1),
                principal_amount,
                interest_amount: interest_per_period,
                total_amount: principal_amount + interest_per_period,
            });
        }

        let total_interest = interest_per_period * Decimal::from(period_count);
        let total_amount = principal + total_interest;
        let monthly_payment = principal_per_period + interest_per_period;

        Some(Self {
            periods,
            total_interest,
            total_amount,
            monthly_payment,
        })
    }

    pub fn period_count(&self) -> u32 {
        self.periods.len() as u32
    }
}

/// ceil(days / 30), the 30-day-month approximation used for period count
fn days_to_period_count(days: i64) -> u32 {
    if days <= 0 {
        return 0;
    }
    (days as u64).div_ceil(30) as u32
}

/// advance a date by whole calendar months, clamping to month end
/// (Jan 31 + 1 month = Feb 28/29)
fn add_calendar_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months)).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn money(v: Decimal) -> Money {
        Money::from_decimal(v)
    }

    #[test]
    fn test_three_period_flat_addon() {
        // 1000 at 5%/month over ~90 days: 3 periods, 50 interest each,
        // principal shares 333.33 / 333.33 / 333.34
        let schedule = Schedule::build(
            Money::from_major(1000),
            d(2024, 1, 1),
            Some(d(2024, 3, 31)),
            Rate::DEFAULT_MONTHLY,
        )
        .unwrap();

        assert_eq!(schedule.period_count(), 3);
        assert_eq!(schedule.total_interest, Money::from_major(150));
        assert_eq!(schedule.total_amount, Money::from_major(1150));
        assert_eq!(schedule.monthly_payment, money(dec!(383.33)));

        let principals: Vec<Money> =
            schedule.periods.iter().map(|p| p.principal_amount).collect();
        assert_eq!(
            principals,
            vec![money(dec!(333.33)), money(dec!(333.33)), money(dec!(333.34))]
        );

        for p in &schedule.periods {
            assert_eq!(p.interest_amount, Money::from_major(50));
        }
        let totals: Vec<Money> = schedule.periods.iter().map(|p| p.total_amount).collect();
        assert_eq!(
            totals,
            vec![money(dec!(383.33)), money(dec!(383.33)), money(dec!(383.34))]
        );
    }

    #[test]
    fn test_principal_shares_sum_exactly() {
        // awkward divisions must still sum cent-exact
        for (principal, days) in [(dec!(1000), 90), (dec!(999.99), 200), (dec!(0.07), 65)] {
            let schedule = Schedule::build(
                money(principal),
                d(2024, 1, 1),
                Some(d(2024, 1, 1) + chrono::Duration::days(days)),
                Rate::DEFAULT_MONTHLY,
            )
            .unwrap();
            let sum: Money = schedule.periods.iter().map(|p| p.principal_amount).sum();
            assert_eq!(sum, money(principal), "principal {} over {} days", principal, days);
        }
    }

    #[test]
    fn test_zero_rate_has_zero_interest() {
        let schedule = Schedule::build(
            Money::from_major(600),
            d(2024, 1, 1),
            Some(d(2024, 3, 1)),
            Rate::ZERO,
        )
        .unwrap();

        assert_eq!(schedule.total_interest, Money::ZERO);
        for p in &schedule.periods {
            assert_eq!(p.interest_amount, Money::ZERO);
            assert_eq!(p.total_amount, p.principal_amount);
        }
        assert_eq!(schedule.total_amount, Money::from_major(600));
    }

    #[test]
    fn test_no_schedule_without_due_date() {
        assert!(Schedule::build(
            Money::from_major(100),
            d(2024, 1, 1),
            None,
            Rate::DEFAULT_MONTHLY
        )
        .is_none());
    }

    #[test]
    fn test_no_schedule_when_due_not_after_start() {
        let start = d(2024, 5, 10);
        for due in [d(2024, 5, 10), d(2024, 4, 1)] {
            assert!(Schedule::build(
                Money::from_major(100),
                start,
                Some(due),
                Rate::DEFAULT_MONTHLY
            )
            .is_none());
        }
    }

    #[test]
    fn test_single_day_gap_is_one_period() {
        // ceil(1 / 30) = 1
        let schedule = Schedule::build(
            Money::from_major(100),
            d(2024, 1, 1),
            Some(d(2024, 1, 2)),
            Rate::DEFAULT_MONTHLY,
        )
        .unwrap();
        assert_eq!(schedule.period_count(), 1);
        assert_eq!(schedule.periods[0].principal_amount, Money::from_major(100));
        assert_eq!(schedule.periods[0].total_amount, Money::from_major(105));
    }

    #[test]
    fn test_period_count_uses_30_day_approximation() {
        // 31 days -> ceil(31/30) = 2 periods even though it is one calendar month
        let schedule = Schedule::build(
            Money::from_major(100),
            d(2024, 1, 1),
            Some(d(2024, 2, 1)),
            Rate::ZERO,
        )
        .unwrap();
        assert_eq!(schedule.period_count(), 2);
    }

    #[test]
    fn test_due_dates_use_calendar_months() {
        let schedule = Schedule::build(
            Money::from_major(900),
            d(2024, 1, 31),
            Some(d(2024, 4, 25)),
            Rate::ZERO,
        )
        .unwrap();

        let due_dates: Vec<NaiveDate> =
            schedule.periods.iter().map(|p| p.due_date).collect();
        // end-of-month clamping: Jan 31 + 1 month lands on Feb 29 (leap year)
        assert_eq!(due_dates[0], d(2024, 2, 29));
        assert_eq!(due_dates[1], d(2024, 3, 31));
        assert_eq!(due_dates[2], d(2024, 4, 30));
    }

    #[test]
    fn test_interest_total_matches_per_period_sum() {
        let schedule = Schedule::build(
            money(dec!(2500.50)),
            d(2024, 1, 1),
            Some(d(2024, 7, 1)),
            Rate::from_percentage(3),
        )
        .unwrap();
        let sum: Money = schedule.periods.iter().map(|p| p.interest_amount).sum();
        assert_eq!(sum, schedule.total_interest);
    }
}
