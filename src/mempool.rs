//! Mempool admission
//!
//! Pending transactions are kept in arrival order. A candidate is admitted
//! only if it validates against the committed UTXO set with every already
//! pending transaction folded in, so two pending entries can never spend the
//! same outpoint.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::RejectReason;
use crate::transaction::{validate_and_apply, TxContext};
use crate::types::*;

/// Result of mempool acceptance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MempoolResult {
    Accepted,
    Rejected(RejectReason),
}

impl MempoolResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, MempoolResult::Accepted)
    }
}

/// Ordered pool of admitted, unconfirmed transactions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mempool {
    transactions: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a pool from persisted entries without re-validating them
    pub fn from_transactions(transactions: Vec<Transaction>) -> Self {
        Mempool { transactions }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.transactions.iter().any(|tx| tx.txid() == txid)
    }

    /// AcceptToMemoryPool: validate `tx` against the pending view and append it
    pub fn admit(&mut self, tx: Transaction, utxo_set: &UtxoSet) -> MempoolResult {
        let result = accept_to_memory_pool(&tx, utxo_set, self);
        match &result {
            MempoolResult::Accepted => {
                debug!("admitted {} to mempool", tx.txid());
                self.transactions.push(tx);
            }
            MempoolResult::Rejected(reason) => {
                debug!("rejected {}: {}", tx.txid(), reason);
            }
        }
        result
    }

    /// Admit a caller-built record; an asserted txid must match the re-derived one
    pub fn admit_record(&mut self, record: TransactionRecord, utxo_set: &UtxoSet) -> MempoolResult {
        match Transaction::try_from(record) {
            Ok(tx) => self.admit(tx, utxo_set),
            Err(reason) => {
                debug!("rejected submitted record: {}", reason);
                MempoolResult::Rejected(reason)
            }
        }
    }

    /// Drop every pending transaction whose txid is in `included`
    pub fn remove_included(&mut self, included: &[Hash]) {
        self.transactions
            .retain(|tx| !included.iter().any(|txid| txid == tx.txid()));
    }
}

/// AcceptToMemoryPool: 𝒯𝒳 × 𝒰𝒮 × 𝒯𝒳* → {accepted, rejected}
///
/// 1. Build a disposable clone of us
/// 2. Fold every pending transaction into the clone, best effort
/// 3. Validate-and-apply tx against the folded clone in mempool context
pub fn accept_to_memory_pool(tx: &Transaction, utxo_set: &UtxoSet, mempool: &Mempool) -> MempoolResult {
    let mut view = pending_view(utxo_set, mempool);
    match validate_and_apply(tx, &mut view, TxContext::Mempool) {
        ValidationResult::Valid => MempoolResult::Accepted,
        ValidationResult::Invalid(reason) => MempoolResult::Rejected(reason),
    }
}

/// Committed UTXO set with the pending transactions applied in order.
///
/// A pending entry that no longer validates is skipped but stays in the pool;
/// stale entries are never evicted here.
pub fn pending_view(utxo_set: &UtxoSet, mempool: &Mempool) -> UtxoSet {
    let mut view = utxo_set.clone();
    for pending in mempool.iter() {
        if let ValidationResult::Invalid(reason) =
            validate_and_apply(pending, &mut view, TxContext::Mempool)
        {
            debug!("skipping stale mempool entry {}: {}", pending.txid(), reason);
        }
    }
    view
}
