//! # Loan Registry
//!
//! A total mapping from [`LoanId`] to [`LoanRecord`]. Reads of unknown keys
//! return the `Empty` sentinel rather than an error: "never created" is a
//! valid state, not a lookup failure. There is no delete.
//!
//! The registry holds no business rules. The lifecycle engine validates every
//! transition before it calls [`LoanStore::put`].

use std::collections::BTreeMap;

use crate::loan::{LoanId, LoanRecord, LoanStatus};

/// Storage backend for loan records.
pub trait LoanStore {
    /// The record under `id`, or [`LoanRecord::empty`].
    fn get(&self, id: &LoanId) -> LoanRecord;

    /// Overwrite the record under `id`.
    fn put(&mut self, id: LoanId, record: LoanRecord);

    /// Every stored record, ordered by identifier.
    fn records(&self) -> Vec<(LoanId, LoanRecord)>;

    /// Number of identifiers ever created.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records currently in `status`.
    fn with_status(&self, status: LoanStatus) -> Vec<(LoanId, LoanRecord)> {
        self.records()
            .into_iter()
            .filter(|(_, r)| r.status == status)
            .collect()
    }
}

/// In-memory registry.
#[derive(Debug, Default, Clone)]
pub struct MemoryRegistry {
    loans: BTreeMap<LoanId, LoanRecord>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoanStore for MemoryRegistry {
    fn get(&self, id: &LoanId) -> LoanRecord {
        self.loans.get(id).cloned().unwrap_or_default()
    }

    fn put(&mut self, id: LoanId, record: LoanRecord) {
        self.loans.insert(id, record);
    }

    fn records(&self) -> Vec<(LoanId, LoanRecord)> {
        self.loans
            .iter()
            .map(|(id, record)| (*id, record.clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.loans.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendpact_protocol::identity::Address;

    fn record(amount: u128, status: LoanStatus) -> LoanRecord {
        LoanRecord {
            amount,
            receiver: Address::from_bytes([3; 20]),
            ttl: 10,
            status,
            funder: None,
        }
    }

    #[test]
    fn unknown_id_reads_as_empty() {
        let registry = MemoryRegistry::new();
        let r = registry.get(&LoanId::from_bytes([9; 32]));
        assert_eq!(r, LoanRecord::empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn put_overwrites() {
        let mut registry = MemoryRegistry::new();
        let id = LoanId::from_bytes([1; 32]);
        registry.put(id, record(5, LoanStatus::Created));
        registry.put(id, record(5, LoanStatus::Approved));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&id).status, LoanStatus::Approved);
    }

    #[test]
    fn filter_by_status() {
        let mut registry = MemoryRegistry::new();
        registry.put(LoanId::from_bytes([1; 32]), record(5, LoanStatus::Approved));
        registry.put(LoanId::from_bytes([2; 32]), record(6, LoanStatus::Created));
        registry.put(LoanId::from_bytes([3; 32]), record(7, LoanStatus::Approved));

        let approved = registry.with_status(LoanStatus::Approved);
        assert_eq!(approved.len(), 2);
        assert_eq!(approved[0].1.amount, 5);
        assert_eq!(approved[1].1.amount, 7);
    }
}
