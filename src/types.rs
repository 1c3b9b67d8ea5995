//! Core ledger types

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::constants::*;
use crate::error::RejectReason;
use crate::hash::{hash_value, CanonicalForm};

/// Hash type: lowercase hex SHA-256 digest, or one of the fixed sentinels
pub type Hash = String;

/// Natural number type
pub type Natural = u64;

/// Integer type
pub type Integer = i64;

/// OutPoint: (originating txid, output position)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash,
    pub index: Natural,
}

impl OutPoint {
    pub fn new(txid: impl Into<Hash>, index: Natural) -> Self {
        OutPoint {
            txid: txid.into(),
            index,
        }
    }
}

/// Transaction Input: the outpoint being spent and the address claiming it.
/// Addresses are unauthenticated strings; ownership is plain equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    #[serde(flatten)]
    pub prevout: OutPoint,
    pub address: String,
}

impl TransactionInput {
    pub fn new(txid: impl Into<Hash>, index: Natural, address: impl Into<String>) -> Self {
        TransactionInput {
            prevout: OutPoint::new(txid, index),
            address: address.into(),
        }
    }
}

impl CanonicalForm for TransactionInput {
    fn canonical_value(&self) -> Value {
        json!({
            "txid": self.prevout.txid,
            "index": self.prevout.index,
            "address": self.address,
        })
    }
}

/// Transaction Output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub amount: Integer,
    pub address: String,
}

impl TransactionOutput {
    pub fn new(amount: Integer, address: impl Into<String>) -> Self {
        TransactionOutput {
            amount,
            address: address.into(),
        }
    }
}

impl CanonicalForm for TransactionOutput {
    fn canonical_value(&self) -> Value {
        json!({
            "amount": self.amount,
            "address": self.address,
        })
    }
}

/// Transaction record as submitted by a caller.
/// `txid` is optional; when present it must match the re-derived identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<Hash>,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
}

/// Transaction with its identity fixed at construction.
///
/// The fields are private: `txid` is derived once from the canonical form of
/// `{inputs, outputs}` and nothing can change either side afterwards.
/// Deserialisation keeps the stored txid as written, so an edited record still
/// loads and [`Transaction::is_intact`] reports the mismatch during replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredTransaction")]
pub struct Transaction {
    txid: Hash,
    inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
}

impl Transaction {
    pub fn new(inputs: Vec<TransactionInput>, outputs: Vec<TransactionOutput>) -> Self {
        let txid = compute_txid(&inputs, &outputs);
        Transaction {
            txid,
            inputs,
            outputs,
        }
    }

    pub fn txid(&self) -> &Hash {
        &self.txid
    }

    pub fn inputs(&self) -> &[TransactionInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TransactionOutput] {
        &self.outputs
    }

    /// Sum of output amounts, `None` on overflow
    pub fn total_output(&self) -> Option<Integer> {
        self.outputs
            .iter()
            .try_fold(0i64, |acc, o| acc.checked_add(o.amount))
    }

    /// True when the stored txid still matches the inputs and outputs
    pub fn is_intact(&self) -> bool {
        self.txid == compute_txid(&self.inputs, &self.outputs)
    }

    pub fn to_record(&self) -> TransactionRecord {
        TransactionRecord {
            txid: Some(self.txid.clone()),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        }
    }
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = RejectReason;

    fn try_from(record: TransactionRecord) -> std::result::Result<Self, Self::Error> {
        let tx = Transaction::new(record.inputs, record.outputs);
        match record.txid {
            Some(claimed) if claimed != tx.txid => Err(RejectReason::TxidMismatch),
            _ => Ok(tx),
        }
    }
}

/// Persisted transaction shape; a missing txid is derived
#[derive(Deserialize)]
struct StoredTransaction {
    #[serde(default)]
    txid: Option<Hash>,
    inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
}

impl From<StoredTransaction> for Transaction {
    fn from(stored: StoredTransaction) -> Self {
        match stored.txid {
            Some(txid) => Transaction {
                txid,
                inputs: stored.inputs,
                outputs: stored.outputs,
            },
            None => Transaction::new(stored.inputs, stored.outputs),
        }
    }
}

impl CanonicalForm for Transaction {
    fn canonical_value(&self) -> Value {
        json!({
            "txid": self.txid,
            "inputs": self.inputs.iter().map(CanonicalForm::canonical_value).collect::<Vec<_>>(),
            "outputs": self.outputs.iter().map(CanonicalForm::canonical_value).collect::<Vec<_>>(),
        })
    }
}

/// txid = H({inputs, outputs})
pub fn compute_txid(inputs: &[TransactionInput], outputs: &[TransactionOutput]) -> Hash {
    hash_value(&json!({
        "inputs": inputs.iter().map(CanonicalForm::canonical_value).collect::<Vec<_>>(),
        "outputs": outputs.iter().map(CanonicalForm::canonical_value).collect::<Vec<_>>(),
    }))
}

/// Unspent output value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UTXO {
    pub amount: Integer,
    pub address: String,
}

impl From<&TransactionOutput> for UTXO {
    fn from(output: &TransactionOutput) -> Self {
        UTXO {
            amount: output.amount,
            address: output.address.clone(),
        }
    }
}

/// UTXO Set: OutPoint → UTXO
pub type UtxoSet = HashMap<OutPoint, UTXO>;

/// Flattened UTXO entry as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoRecord {
    pub txid: Hash,
    pub index: Natural,
    pub amount: Integer,
    pub address: String,
}

/// Flatten a UTXO set into records ordered by outpoint
pub fn utxo_records(utxo_set: &UtxoSet) -> Vec<UtxoRecord> {
    let mut records: Vec<UtxoRecord> = utxo_set
        .iter()
        .map(|(outpoint, utxo)| UtxoRecord {
            txid: outpoint.txid.clone(),
            index: outpoint.index,
            amount: utxo.amount,
            address: utxo.address.clone(),
        })
        .collect();
    records.sort_by(|a, b| (&a.txid, a.index).cmp(&(&b.txid, b.index)));
    records
}

/// Rebuild a UTXO set from its flattened records
pub fn utxo_set_from_records(records: Vec<UtxoRecord>) -> UtxoSet {
    records
        .into_iter()
        .map(|r| {
            (
                OutPoint::new(r.txid, r.index),
                UTXO {
                    amount: r.amount,
                    address: r.address,
                },
            )
        })
        .collect()
}

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(RejectReason),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

/// Coinbase input for the given block height
pub fn coinbase_input(height: Natural) -> TransactionInput {
    TransactionInput::new(COINBASE_SENTINEL, height, COINBASE_ADDRESS)
}
