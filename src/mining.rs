//! Block assembly from the mempool

use log::debug;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::block::UnsealedBlock;
use crate::mempool::Mempool;
use crate::transaction::{create_coinbase_transaction, validate_and_apply, TxContext};
use crate::types::*;

/// Unsealed block plus the UTXO view it produces once committed
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub block: UnsealedBlock,
    pub utxo_view: UtxoSet,
    pub included: Vec<Hash>,
}

/// CreateNewBlock: 𝒰𝒮 × 𝒯𝒳* → ℬ × 𝒰𝒮
///
/// For committed set us and pending transactions txs at height h:
/// 1. Create the coinbase paying `reward` to the miner, tagged with h
/// 2. Clone us and apply the coinbase outputs
/// 3. Walk txs in pool order; keep each one that validates against the view,
///    folding it in, and silently leave the rest out of this block
/// 4. Block transactions = [coinbase, kept txs...] in original relative order
pub fn assemble_block(
    utxo_set: &UtxoSet,
    mempool: &Mempool,
    miner_address: &str,
    reward: Integer,
    height: Natural,
    previous_hash: &str,
    timestamp: Natural,
) -> BlockTemplate {
    let coinbase = create_coinbase_transaction(miner_address, reward, height);

    let mut utxo_view = utxo_set.clone();
    let coinbase_result =
        validate_and_apply(&coinbase, &mut utxo_view, TxContext::Block { position: 0 });
    if let ValidationResult::Invalid(reason) = coinbase_result {
        // Only a non-positive reward gets here; config validation forbids it
        debug!("coinbase for block {} not applied: {}", height, reason);
    }

    let mut transactions = vec![coinbase];
    let mut included = Vec::new();
    for tx in mempool.iter() {
        let position = transactions.len();
        match validate_and_apply(tx, &mut utxo_view, TxContext::Block { position }) {
            ValidationResult::Valid => {
                included.push(tx.txid().clone());
                transactions.push(tx.clone());
            }
            ValidationResult::Invalid(reason) => {
                debug!("leaving {} out of block {}: {}", tx.txid(), height, reason);
            }
        }
    }

    BlockTemplate {
        block: UnsealedBlock::new(height, transactions, timestamp, previous_hash),
        utxo_view,
        included,
    }
}

/// Current Unix time in seconds, never earlier than `floor`
pub fn next_timestamp(floor: Natural) -> Natural {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    now.max(floor)
}
