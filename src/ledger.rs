use hourglass_rs::SafeTimeProvider;

use crate::errors::Result;
use crate::events::{Event, EventStore};
use crate::loan::{LoanDraft, LoanRecord, PaymentRecord};
use crate::projection::{project, Projection};
use crate::reconcile::validate_payment;
use crate::store::{ProofStorage, RecordStore, RetryPolicy};
use crate::types::{OwnerKey, PaymentId};

/// orchestrates loan and payment mutations against the record store
///
/// every mutation validates before touching anything, persists through the
/// store with bounded retry, then recomputes the projection and writes the
/// denormalized `remaining_amount`/`status` cache back. the payment-write
/// and cache-write-back pair is not transactional — a failure in between
/// leaves the cache stale, which is why consumers derive decisions from
/// the live projection, not the cache
pub struct Ledger<S: RecordStore, P: ProofStorage> {
    owner: OwnerKey,
    store: S,
    proofs: P,
    retry: RetryPolicy,
    pub events: EventStore,
}

impl<S: RecordStore, P: ProofStorage> Ledger<S, P> {
    pub fn new(owner: OwnerKey, store: S, proofs: P) -> Self {
        Self {
            owner,
            store,
            proofs,
            retry: RetryPolicy::default(),
            events: EventStore::new(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// validate a draft, build the record (with schedule snapshot when a
    /// due date is present), and persist it
    pub fn create_loan(
        &mut self,
        draft: LoanDraft,
        time_provider: &SafeTimeProvider,
    ) -> Result<LoanRecord> {
        let now = time_provider.now();
        let loan = LoanRecord::create(draft, now)?;

        self.retry
            .run("create_loan", || self.store.create_loan(&self.owner, &loan))?;

        self.events.emit(Event::LoanCreated {
            loan_id: loan.id,
            amount: loan.amount,
            has_schedule: loan.has_schedule(),
            timestamp: now,
        });

        Ok(loan)
    }

    /// apply an edited draft to an existing loan; the schedule snapshot is
    /// regenerated and the cache re-projected against existing payments
    pub fn update_loan(
        &mut self,
        loan: &mut LoanRecord,
        draft: LoanDraft,
        time_provider: &SafeTimeProvider,
    ) -> Result<Projection> {
        let now = time_provider.now();
        loan.apply_edit(draft, now)?;

        let projection = self.write_back(loan, now)?;

        self.events.emit(Event::LoanUpdated {
            loan_id: loan.id,
            amount: loan.amount,
            timestamp: now,
        });

        Ok(projection)
    }

    /// delete a loan; the store cascades to its payments, and any proof
    /// images are cleaned up best-effort afterwards
    pub fn delete_loan(
        &mut self,
        loan: LoanRecord,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        self.retry
            .run("delete_loan", || self.store.delete_loan(&self.owner, loan.id))?;

        for payment in loan.payments.values() {
            self.cleanup_proof(payment);
        }

        self.events.emit(Event::LoanDeleted {
            loan_id: loan.id,
            payments_removed: loan.payments.len(),
            timestamp: time_provider.now(),
        });

        Ok(())
    }

    /// record a payment: guard against overpayment, append to the store,
    /// then write the re-projected cache back
    pub fn add_payment(
        &mut self,
        loan: &mut LoanRecord,
        payment: PaymentRecord,
        time_provider: &SafeTimeProvider,
    ) -> Result<Projection> {
        let now = time_provider.now();
        validate_payment(loan, payment.amount)?;

        self.retry.run("append_payment", || {
            self.store.append_payment(&self.owner, loan.id, &payment)
        })?;

        let amount = payment.amount;
        let payment_id = payment.id;
        loan.payments.insert(payment.id, payment);

        let old_status = loan.status;
        let projection = self.write_back(loan, now)?;

        self.events.emit(Event::PaymentRecorded {
            loan_id: loan.id,
            payment_id,
            amount,
            remaining_after: projection.remaining_amount,
            timestamp: now,
        });
        if projection.status != old_status {
            self.events.emit(Event::StatusChanged {
                loan_id: loan.id,
                old_status,
                new_status: projection.status,
                timestamp: now,
            });
            if projection.is_settled() {
                self.events.emit(Event::LoanSettled {
                    loan_id: loan.id,
                    final_payment: amount,
                    timestamp: now,
                });
            }
        }

        Ok(projection)
    }

    /// remove a payment, refunding its amount into the remaining balance;
    /// proof-image cleanup failures never block the removal
    pub fn delete_payment(
        &mut self,
        loan: &mut LoanRecord,
        payment_id: PaymentId,
        time_provider: &SafeTimeProvider,
    ) -> Result<Projection> {
        let now = time_provider.now();
        let payment = loan
            .payments
            .get(&payment_id)
            .cloned()
            .ok_or(crate::errors::LoanError::PaymentNotFound { id: payment_id })?;

        self.retry.run("remove_payment", || {
            self.store.remove_payment(&self.owner, loan.id, payment_id)
        })?;

        loan.payments.remove(&payment_id);
        self.cleanup_proof(&payment);

        let old_status = loan.status;
        let projection = self.write_back(loan, now)?;

        self.events.emit(Event::PaymentRemoved {
            loan_id: loan.id,
            payment_id,
            amount: payment.amount,
            remaining_after: projection.remaining_amount,
            timestamp: now,
        });
        if projection.status != old_status {
            self.events.emit(Event::StatusChanged {
                loan_id: loan.id,
                old_status,
                new_status: projection.status,
                timestamp: now,
            });
        }

        Ok(projection)
    }

    /// recompute the projection and persist the denormalized cache
    fn write_back(
        &mut self,
        loan: &mut LoanRecord,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Projection> {
        let projection = project(loan);
        loan.remaining_amount = Some(projection.remaining_amount);
        loan.status = projection.status;
        loan.updated_at = now;

        self.retry
            .run("replace_loan", || self.store.replace_loan(&self.owner, loan))?;

        Ok(projection)
    }

    /// non-critical cleanup: log and swallow, never roll back the caller
    fn cleanup_proof(&self, payment: &PaymentRecord) {
        if let Some(proof) = &payment.proof {
            if let Err(err) = self.proofs.delete(&proof.public_id) {
                tracing::warn!(
                    payment_id = %payment.id,
                    public_id = %proof.public_id,
                    error = %err,
                    "orphaned proof image cleanup failed"
                );
            }
        }
    }
}
