use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::errors::StoreError;
use crate::loan::{LoanRecord, PaymentRecord};
use crate::types::{LoanId, OwnerKey, PaymentId};

/// one realtime snapshot: every loan owned by the subscribed key
pub type LoanSnapshot = HashMap<LoanId, LoanRecord>;

/// callback invoked with each snapshot pushed by the store
pub type SnapshotHandler = Box<dyn FnMut(LoanSnapshot) + Send>;

/// keyed-record store contract; the hosted realtime backend sits behind
/// this seam, calculation code only ever sees plain records
pub trait RecordStore {
    fn create_loan(&self, owner: &OwnerKey, loan: &LoanRecord) -> Result<(), StoreError>;

    fn replace_loan(&self, owner: &OwnerKey, loan: &LoanRecord) -> Result<(), StoreError>;

    /// removes the loan and cascades to all its payments
    fn delete_loan(&self, owner: &OwnerKey, loan_id: LoanId) -> Result<(), StoreError>;

    fn append_payment(
        &self,
        owner: &OwnerKey,
        loan_id: LoanId,
        payment: &PaymentRecord,
    ) -> Result<(), StoreError>;

    fn remove_payment(
        &self,
        owner: &OwnerKey,
        loan_id: LoanId,
        payment_id: PaymentId,
    ) -> Result<(), StoreError>;

    fn fetch_loans(&self, owner: &OwnerKey) -> Result<LoanSnapshot, StoreError>;

    /// register for pushed snapshots; returns a cancellable handle.
    /// calculation functions are never subscribers themselves — they are
    /// invoked by the handler
    fn subscribe(&self, owner: &OwnerKey, handler: SnapshotHandler) -> Box<dyn Subscription>;
}

/// handle returned by [`RecordStore::subscribe`]
pub trait Subscription {
    fn unsubscribe(self: Box<Self>);
}

/// blob-hosting contract for payment proof images; only cleanup is needed
/// here, uploads happen in the UI layer
pub trait ProofStorage {
    fn delete(&self, public_id: &str) -> Result<(), StoreError>;
}

/// proof storage that does nothing, for ledgers without image hosting
impl ProofStorage for () {
    fn delete(&self, _public_id: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

/// bounded exponential backoff for mutating store calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// delay before retry number `attempt` (0-based): base * 2^attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }

    /// run a store operation, retrying transient failures; the final
    /// failure surfaces to the caller, never silently swallowed
    pub fn run<T>(
        &self,
        operation: &str,
        mut op: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        ?delay,
                        error = %err,
                        "store operation failed, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// in-memory store used by tests; supports injecting a run of transient
/// failures to exercise the retry path
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<OwnerKey, LoanSnapshot>,
    subscribers: Vec<Subscriber>,
    next_subscriber_id: u64,
    fail_next: u32,
}

struct Subscriber {
    id: u64,
    owner: OwnerKey,
    handler: SnapshotHandler,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// make the next `count` operations fail with a network error
    pub fn fail_next(&self, count: u32) {
        self.inner.lock().unwrap().fail_next = count;
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(StoreError::Network {
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    /// snapshot with store-boundary defaults filled once
    fn snapshot(inner: &Inner, owner: &OwnerKey) -> LoanSnapshot {
        inner
            .records
            .get(owner)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|(id, mut loan)| {
                loan.fill_defaults();
                (id, loan)
            })
            .collect()
    }

    fn notify(&self, owner: &OwnerKey) {
        // take the subscribers out so handlers run without the lock held
        let (snapshot, mut subscribers) = {
            let mut inner = self.inner.lock().unwrap();
            let snapshot = Self::snapshot(&inner, owner);
            (snapshot, std::mem::take(&mut inner.subscribers))
        };

        for subscriber in subscribers.iter_mut() {
            if &subscriber.owner == owner {
                (subscriber.handler)(snapshot.clone());
            }
        }

        let mut inner = self.inner.lock().unwrap();
        // keep any subscribers added while handlers ran
        subscribers.append(&mut inner.subscribers);
        inner.subscribers = subscribers;
    }
}

impl RecordStore for MemoryStore {
    fn create_loan(&self, owner: &OwnerKey, loan: &LoanRecord) -> Result<(), StoreError> {
        self.check_failure()?;
        self.inner
            .lock()
            .unwrap()
            .records
            .entry(owner.clone())
            .or_default()
            .insert(loan.id, loan.clone());
        self.notify(owner);
        Ok(())
    }

    fn replace_loan(&self, owner: &OwnerKey, loan: &LoanRecord) -> Result<(), StoreError> {
        self.check_failure()?;
        {
            let mut inner = self.inner.lock().unwrap();
            let loans = inner.records.entry(owner.clone()).or_default();
            if !loans.contains_key(&loan.id) {
                return Err(StoreError::NotFound {
                    key: loan.id.to_string(),
                });
            }
            loans.insert(loan.id, loan.clone());
        }
        self.notify(owner);
        Ok(())
    }

    fn delete_loan(&self, owner: &OwnerKey, loan_id: LoanId) -> Result<(), StoreError> {
        self.check_failure()?;
        {
            let mut inner = self.inner.lock().unwrap();
            let removed = inner
                .records
                .entry(owner.clone())
                .or_default()
                .remove(&loan_id);
            if removed.is_none() {
                return Err(StoreError::NotFound {
                    key: loan_id.to_string(),
                });
            }
        }
        self.notify(owner);
        Ok(())
    }

    fn append_payment(
        &self,
        owner: &OwnerKey,
        loan_id: LoanId,
        payment: &PaymentRecord,
    ) -> Result<(), StoreError> {
        self.check_failure()?;
        {
            let mut inner = self.inner.lock().unwrap();
            let loan = inner
                .records
                .entry(owner.clone())
                .or_default()
                .get_mut(&loan_id)
                .ok_or_else(|| StoreError::NotFound {
                    key: loan_id.to_string(),
                })?;
            loan.payments.insert(payment.id, payment.clone());
        }
        self.notify(owner);
        Ok(())
    }

    fn remove_payment(
        &self,
        owner: &OwnerKey,
        loan_id: LoanId,
        payment_id: PaymentId,
    ) -> Result<(), StoreError> {
        self.check_failure()?;
        {
            let mut inner = self.inner.lock().unwrap();
            let loan = inner
                .records
                .entry(owner.clone())
                .or_default()
                .get_mut(&loan_id)
                .ok_or_else(|| StoreError::NotFound {
                    key: loan_id.to_string(),
                })?;
            if loan.payments.remove(&payment_id).is_none() {
                return Err(StoreError::NotFound {
                    key: payment_id.to_string(),
                });
            }
        }
        self.notify(owner);
        Ok(())
    }

    fn fetch_loans(&self, owner: &OwnerKey) -> Result<LoanSnapshot, StoreError> {
        self.check_failure()?;
        let inner = self.inner.lock().unwrap();
        Ok(Self::snapshot(&inner, owner))
    }

    fn subscribe(&self, owner: &OwnerKey, handler: SnapshotHandler) -> Box<dyn Subscription> {
        let id = {
            let mut inner = self.inner.lock().unwrap();
            let id = inner.next_subscriber_id;
            inner.next_subscriber_id += 1;
            inner.subscribers.push(Subscriber {
                id,
                owner: owner.clone(),
                handler,
            });
            id
        };
        // push the current snapshot immediately, like the hosted backend
        self.notify(owner);
        Box::new(MemorySubscription {
            store: self.inner.clone(),
            id,
        })
    }
}

struct MemorySubscription {
    store: Arc<Mutex<Inner>>,
    id: u64,
}

impl Subscription for MemorySubscription {
    fn unsubscribe(self: Box<Self>) {
        let mut inner = self.store.lock().unwrap();
        inner.subscribers.retain(|s| s.id != self.id);
    }
}
