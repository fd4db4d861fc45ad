pub mod decimal;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod loan;
pub mod projection;
pub mod reconcile;
pub mod report;
pub mod schedule;
pub mod store;
pub mod types;

// re-export key types
pub use decimal::{Money, Rate, CENTAVO};
pub use errors::{LoanError, Result, StoreError};
pub use events::{Event, EventStore};
pub use ledger::Ledger;
pub use loan::{
    LoanDraft, LoanRecord, ManualPaymentDetails, PaymentRecord, ProofAttachment,
};
pub use projection::{project, Projection};
pub use reconcile::{
    lump_sum_remaining, reconcile, remaining_from_schedule, validate_payment,
    ReconciledPeriod,
};
pub use report::{
    due_within, overdue, summarize, DueClassification, LedgerSummary, NetPosition,
    TypeTotals, DASHBOARD_DUE_SOON_DAYS, FILTER_DUE_SOON_DAYS,
};
pub use schedule::{InstallmentPeriod, Schedule};
pub use store::{
    LoanSnapshot, MemoryStore, ProofStorage, RecordStore, RetryPolicy, SnapshotHandler,
    Subscription,
};
pub use types::{LoanId, LoanStatus, LoanType, OwnerKey, PaymentId, PaymentMethod};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
