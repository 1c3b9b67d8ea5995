//! Block structure and per-block transaction replay
//!
//! A block starts life as an [`UnsealedBlock`] whose nonce may change freely.
//! The proof-of-work search in [`crate::pow`] is the only way to produce a
//! sealed [`Block`]; once sealed, every field is read-only.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::constants::*;
use crate::error::ChainViolation;
use crate::hash::{hash_value, CanonicalForm};
use crate::transaction::{is_coinbase, validate_and_apply, TxContext};
use crate::types::*;

/// Block under construction: no hash yet, nonce still mutable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsealedBlock {
    pub index: Natural,
    pub transactions: Vec<Transaction>,
    pub timestamp: Natural,
    pub previous_hash: Hash,
    pub nonce: Natural,
}

impl UnsealedBlock {
    pub fn new(
        index: Natural,
        transactions: Vec<Transaction>,
        timestamp: Natural,
        previous_hash: impl Into<Hash>,
    ) -> Self {
        UnsealedBlock {
            index,
            transactions,
            timestamp,
            previous_hash: previous_hash.into(),
            nonce: 0,
        }
    }

    /// Content hash at the current nonce
    pub fn compute_hash(&self) -> Hash {
        hash_value(&content_value(
            self.index,
            &self.transactions,
            self.timestamp,
            &self.previous_hash,
            self.nonce,
        ))
    }
}

/// Sealed block. `hash` is the cached content hash found by the miner; the
/// chain validator compares it against a fresh [`Block::compute_hash`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    index: Natural,
    transactions: Vec<Transaction>,
    timestamp: Natural,
    previous_hash: Hash,
    nonce: Natural,
    hash: Hash,
    #[serde(default = "default_difficulty")]
    difficulty: Natural,
}

fn default_difficulty() -> Natural {
    DEFAULT_DIFFICULTY
}

impl Block {
    /// Seal an unsealed block with the nonce and digest that satisfied `difficulty`
    pub(crate) fn seal(block: UnsealedBlock, hash: Hash, difficulty: Natural) -> Self {
        Block {
            index: block.index,
            transactions: block.transactions,
            timestamp: block.timestamp,
            previous_hash: block.previous_hash,
            nonce: block.nonce,
            hash,
            difficulty,
        }
    }

    pub fn index(&self) -> Natural {
        self.index
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn timestamp(&self) -> Natural {
        self.timestamp
    }

    pub fn previous_hash(&self) -> &Hash {
        &self.previous_hash
    }

    pub fn nonce(&self) -> Natural {
        self.nonce
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn difficulty(&self) -> Natural {
        self.difficulty
    }

    /// Fresh content hash; difficulty and the cached hash are not hashed
    pub fn compute_hash(&self) -> Hash {
        hash_value(&content_value(
            self.index,
            &self.transactions,
            self.timestamp,
            &self.previous_hash,
            self.nonce,
        ))
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| is_coinbase(tx))
    }
}

/// Hashed block content: {index, nonce, previous_hash, timestamp, transactions}
pub fn content_value(
    index: Natural,
    transactions: &[Transaction],
    timestamp: Natural,
    previous_hash: &str,
    nonce: Natural,
) -> Value {
    json!({
        "index": index,
        "transactions": transactions.iter().map(CanonicalForm::canonical_value).collect::<Vec<_>>(),
        "timestamp": timestamp,
        "previous_hash": previous_hash,
        "nonce": nonce,
    })
}

/// ConnectBlock: ℬ × 𝒰𝒮 → {valid, invalid} × 𝒰𝒮
///
/// For block b replayed onto the view us:
/// 1. A coinbase may only sit at position 0
/// 2. The coinbase height tag must equal b.index
/// 3. The coinbase may pay at most `block_reward`
/// 4. Every other transaction must pass validate-and-apply against us,
///    folding its effect in before the next one is checked
///
/// Header rules (linkage, content hash, work) belong to the chain walk.
pub fn connect_block(
    block: &Block,
    utxo_set: &mut UtxoSet,
    block_reward: Integer,
) -> std::result::Result<(), ChainViolation> {
    if let Some(coinbase) = block.coinbase() {
        let tagged = coinbase.inputs()[0].prevout.index;
        if tagged != block.index {
            return Err(ChainViolation::CoinbaseHeight {
                index: block.index,
                tagged,
            });
        }

        match coinbase.total_output() {
            Some(total) if total <= block_reward => {}
            _ => return Err(ChainViolation::CoinbaseReward(block.index)),
        }
    }

    for (position, tx) in block.transactions.iter().enumerate() {
        if let ValidationResult::Invalid(reason) =
            validate_and_apply(tx, utxo_set, TxContext::Block { position })
        {
            return Err(ChainViolation::InvalidTransaction {
                index: block.index,
                position,
                reason,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectReason;
    use crate::transaction::create_coinbase_transaction;

    fn unsealed(index: Natural, miner: &str) -> UnsealedBlock {
        UnsealedBlock::new(
            index,
            vec![create_coinbase_transaction(miner, 50, index)],
            1_700_000_000,
            GENESIS_PREVIOUS_HASH,
        )
    }

    #[test]
    fn test_compute_hash_deterministic() {
        let block = unsealed(0, "alice");
        assert_eq!(block.compute_hash(), block.compute_hash());
    }

    #[test]
    fn test_compute_hash_covers_nonce() {
        let mut block = unsealed(0, "alice");
        let before = block.compute_hash();
        block.nonce += 1;
        assert_ne!(before, block.compute_hash());
    }

    #[test]
    fn test_sealed_hash_ignores_difficulty() {
        let block = unsealed(0, "alice");
        let hash = block.compute_hash();
        let low = Block::seal(block.clone(), hash.clone(), 0);
        let high = Block::seal(block, hash, 5);
        assert_eq!(low.compute_hash(), high.compute_hash());
    }

    #[test]
    fn test_content_value_field_names() {
        let value = content_value(3, &[], 9, "abc", 7);
        assert_eq!(
            crate::hash::canonical_text(&value),
            r#"{"index":3,"nonce":7,"previous_hash":"abc","timestamp":9,"transactions":[]}"#
        );
    }

    #[test]
    fn test_block_serde_shape() {
        let block = unsealed(0, "alice");
        let hash = block.compute_hash();
        let sealed = Block::seal(block, hash, 2);
        let value = serde_json::to_value(&sealed).unwrap();
        for key in ["index", "transactions", "timestamp", "previous_hash", "nonce", "hash", "difficulty"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        let back: Block = serde_json::from_value(value).unwrap();
        assert_eq!(back, sealed);
    }

    #[test]
    fn test_connect_block_seeds_coinbase() {
        let block = unsealed(0, "alice");
        let hash = block.compute_hash();
        let sealed = Block::seal(block, hash, 0);
        let mut view = UtxoSet::new();
        connect_block(&sealed, &mut view, 50).unwrap();
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn test_connect_block_rejects_wrong_height_tag() {
        let mut block = unsealed(0, "alice");
        block.index = 4;
        let hash = block.compute_hash();
        let sealed = Block::seal(block, hash, 0);
        assert_eq!(
            connect_block(&sealed, &mut UtxoSet::new(), 50),
            Err(ChainViolation::CoinbaseHeight { index: 4, tagged: 0 })
        );
    }

    #[test]
    fn test_connect_block_rejects_excess_reward() {
        let block = unsealed(0, "alice");
        let hash = block.compute_hash();
        let sealed = Block::seal(block, hash, 0);
        assert_eq!(
            connect_block(&sealed, &mut UtxoSet::new(), 49),
            Err(ChainViolation::CoinbaseReward(0))
        );
    }

    #[test]
    fn test_connect_block_rejects_second_coinbase() {
        let block = UnsealedBlock::new(
            2,
            vec![
                create_coinbase_transaction("alice", 50, 2),
                create_coinbase_transaction("mallory", 50, 2),
            ],
            0,
            "ff",
        );
        let hash = block.compute_hash();
        let sealed = Block::seal(block, hash, 0);
        assert_eq!(
            connect_block(&sealed, &mut UtxoSet::new(), 50),
            Err(ChainViolation::InvalidTransaction {
                index: 2,
                position: 1,
                reason: RejectReason::CoinbaseMisplaced,
            })
        );
    }
}
