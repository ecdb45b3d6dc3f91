use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::errors::{LoanError, Result};
use crate::ledger::InstallmentLedger;
use crate::loan::Loan;
use crate::types::{InstallmentId, LoanId};

/// a loan together with the installments it owns, stored as one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub loan: Loan,
    pub ledger: InstallmentLedger,
    /// bumped on every successful commit
    pub version: u64,
}

impl LoanRecord {
    pub fn new(loan: Loan) -> Self {
        let ledger = InstallmentLedger::new(loan.id());
        Self {
            loan,
            ledger,
            version: 0,
        }
    }
}

/// storage seam for loan records.
///
/// Writes are whole-record and carry the version the caller read; a stale
/// version fails with `ConcurrentModification` and leaves the store untouched.
pub trait LoanStore: Send + Sync {
    /// store a brand new record at version 1
    fn insert(&self, record: LoanRecord) -> Result<u64>;

    /// clone of the current record
    fn load(&self, loan_id: LoanId) -> Result<LoanRecord>;

    /// owning loan of an installment
    fn find_loan_by_installment(&self, installment_id: InstallmentId) -> Result<LoanId>;

    /// replace the record if its stored version still equals `expected_version`.
    /// Returns the new version
    fn commit(&self, record: LoanRecord, expected_version: u64) -> Result<u64>;

    /// delete the record and its installments
    fn remove(&self, loan_id: LoanId, expected_version: u64) -> Result<LoanRecord>;

    /// point-in-time copy of every record
    fn snapshot(&self) -> Result<Vec<LoanRecord>>;
}

#[derive(Debug, Default)]
struct Tables {
    records: HashMap<LoanId, LoanRecord>,
    installment_index: HashMap<InstallmentId, LoanId>,
}

impl Tables {
    fn index(&mut self, record: &LoanRecord) {
        let loan_id = record.loan.id();
        for installment in record.ledger.installments() {
            self.installment_index.insert(installment.id, loan_id);
        }
    }

    fn unindex(&mut self, record: &LoanRecord) {
        for installment in record.ledger.installments() {
            self.installment_index.remove(&installment.id);
        }
    }

    fn check_version(&self, loan_id: LoanId, expected: u64) -> Result<()> {
        let current = self
            .records
            .get(&loan_id)
            .ok_or_else(|| LoanError::loan_not_found(loan_id))?;
        if current.version != expected {
            return Err(LoanError::ConcurrentModification {
                loan_id,
                expected,
                found: current.version,
            });
        }
        Ok(())
    }
}

/// in-memory store, all tables behind one read/write lock
#[derive(Debug, Default)]
pub struct InMemoryLoanStore {
    tables: RwLock<Tables>,
}

impl InMemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LoanStore for InMemoryLoanStore {
    fn insert(&self, mut record: LoanRecord) -> Result<u64> {
        let loan_id = record.loan.id();
        let mut tables = self.tables.write();
        if tables.records.contains_key(&loan_id) {
            return Err(LoanError::Storage {
                message: format!("loan {} already stored", loan_id),
            });
        }
        record.version = 1;
        tables.index(&record);
        tables.records.insert(loan_id, record);
        Ok(1)
    }

    fn load(&self, loan_id: LoanId) -> Result<LoanRecord> {
        self.tables
            .read()
            .records
            .get(&loan_id)
            .cloned()
            .ok_or_else(|| LoanError::loan_not_found(loan_id))
    }

    fn find_loan_by_installment(&self, installment_id: InstallmentId) -> Result<LoanId> {
        self.tables
            .read()
            .installment_index
            .get(&installment_id)
            .copied()
            .ok_or_else(|| LoanError::installment_not_found(installment_id))
    }

    fn commit(&self, mut record: LoanRecord, expected_version: u64) -> Result<u64> {
        let loan_id = record.loan.id();
        if record.ledger.loan_id() != loan_id {
            return Err(LoanError::Storage {
                message: format!("ledger of loan {} attached to loan {}", record.ledger.loan_id(), loan_id),
            });
        }

        let mut tables = self.tables.write();
        tables.check_version(loan_id, expected_version)?;

        record.version = expected_version + 1;
        if let Some(previous) = tables.records.remove(&loan_id) {
            tables.unindex(&previous);
        }
        tables.index(&record);
        let version = record.version;
        tables.records.insert(loan_id, record);
        Ok(version)
    }

    fn remove(&self, loan_id: LoanId, expected_version: u64) -> Result<LoanRecord> {
        let mut tables = self.tables.write();
        tables.check_version(loan_id, expected_version)?;
        let record = tables
            .records
            .remove(&loan_id)
            .ok_or_else(|| LoanError::loan_not_found(loan_id))?;
        tables.unindex(&record);
        Ok(record)
    }

    fn snapshot(&self) -> Result<Vec<LoanRecord>> {
        Ok(self.tables.read().records.values().cloned().collect())
    }
}

/// one mutex per loan id, held only while some caller is using it
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<LoanId, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// run `work` while holding the lock of `loan_id`
    pub fn with_lock<T>(&self, loan_id: LoanId, work: impl FnOnce() -> T) -> T {
        let lock = self.handle(loan_id);
        let value = {
            let _guard = lock.lock();
            work()
        };
        self.release(loan_id, &lock);
        value
    }

    fn handle(&self, loan_id: LoanId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(loan_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// handles are only cloned under the map lock, so a count of two
    /// (map + caller) means nobody else is waiting on this loan
    fn release(&self, loan_id: LoanId, lock: &Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        if Arc::strong_count(lock) == 2 {
            locks.remove(&loan_id);
        }
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amortization::AmortizationCalculator;
    use crate::decimal::{Money, Rate};
    use crate::types::PeriodUnit;
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    fn record() -> LoanRecord {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let loan = Loan::request(
            Uuid::new_v4(),
            Money::from_major(1_200),
            3,
            "school fees".to_string(),
            now,
        )
        .unwrap();
        LoanRecord::new(loan)
    }

    #[test]
    fn test_insert_load_commit() {
        let store = InMemoryLoanStore::new();
        let mut rec = record();
        let loan_id = rec.loan.id();
        assert_eq!(store.insert(rec.clone()).unwrap(), 1);
        assert!(store.insert(rec.clone()).is_err());

        let loaded = store.load(loan_id).unwrap();
        assert_eq!(loaded.version, 1);

        rec.loan.renegotiate_installments(4, Utc::now()).unwrap();
        assert_eq!(store.commit(rec, 1).unwrap(), 2);
        assert_eq!(store.load(loan_id).unwrap().loan.installment_count(), 4);
    }

    #[test]
    fn test_stale_commit_is_rejected() {
        let store = InMemoryLoanStore::new();
        let rec = record();
        let loan_id = rec.loan.id();
        store.insert(rec).unwrap();

        let first = store.load(loan_id).unwrap();
        let second = store.load(loan_id).unwrap();
        store.commit(first, 1).unwrap();

        let err = store.commit(second, 1).unwrap_err();
        assert_eq!(
            err,
            LoanError::ConcurrentModification {
                loan_id,
                expected: 1,
                found: 2
            }
        );
        assert_eq!(store.load(loan_id).unwrap().version, 2);
    }

    #[test]
    fn test_installment_index_follows_commits() {
        let store = InMemoryLoanStore::new();
        let mut rec = record();
        let loan_id = rec.loan.id();
        store.insert(rec.clone()).unwrap();

        let schedule = AmortizationCalculator::default()
            .schedule(Money::from_major(1_200), 3, Rate::ZERO)
            .unwrap();
        let first_due = NaiveDate::from_ymd_opt(2024, 4, 25).unwrap();
        rec.loan
            .approve(Money::from_major(1_200), &schedule, first_due, Uuid::new_v4(), Utc::now())
            .unwrap();
        rec.ledger
            .generate_schedule(&rec.loan, &schedule, first_due, PeriodUnit::Monthly)
            .unwrap();
        let installment_id = rec.ledger.installments()[2].id;
        store.commit(rec, 1).unwrap();

        assert_eq!(store.find_loan_by_installment(installment_id).unwrap(), loan_id);

        let removed = store.remove(loan_id, 2).unwrap();
        assert_eq!(removed.ledger.len(), 3);
        assert!(store.is_empty());
        assert!(matches!(
            store.find_loan_by_installment(installment_id),
            Err(LoanError::NotFound { entity: "installment", .. })
        ));
    }

    #[test]
    fn test_keyed_locks_per_loan() {
        let locks = KeyedLocks::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let inner = locks.with_lock(a, || {
            assert_eq!(locks.len(), 1);
            // other loans are not blocked
            locks.with_lock(b, || locks.len())
        });
        assert_eq!(inner, 2);
        assert!(locks.is_empty());
    }

    #[test]
    fn test_keyed_locks_serialize_and_release() {
        let locks = KeyedLocks::new();
        let loan_id = Uuid::new_v4();
        let counter = Mutex::new(0u32);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..100 {
                        locks.with_lock(loan_id, || *counter.lock() += 1);
                    }
                });
            }
        });

        assert_eq!(*counter.lock(), 800);
        assert!(locks.is_empty());
    }
}
