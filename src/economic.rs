//! Balances, supply and payment construction

use crate::error::{LedgerError, RejectReason, Result};
use crate::mempool::{pending_view, Mempool};
use crate::types::*;

/// Balance: 𝒰𝒮 × 𝒜 → ℤ ∪ {⊥}
///
/// Sum of confirmed unspent outputs owned by `address`; `None` when the sum
/// overflows an [`Integer`].
pub fn balance(utxo_set: &UtxoSet, address: &str) -> Option<Integer> {
    checked_sum(
        utxo_set
            .values()
            .filter(|utxo| utxo.address == address)
            .map(|utxo| utxo.amount),
    )
}

/// Balance once every pending transaction that still validates is applied,
/// so chains of pending spends are counted once.
pub fn pending_balance(utxo_set: &UtxoSet, mempool: &Mempool, address: &str) -> Option<Integer> {
    balance(&pending_view(utxo_set, mempool), address)
}

/// Total unspent value across the set; `None` on overflow
pub fn total_value(utxo_set: &UtxoSet) -> Option<Integer> {
    checked_sum(utxo_set.values().map(|utxo| utxo.amount))
}

fn checked_sum(mut amounts: impl Iterator<Item = Integer>) -> Option<Integer> {
    amounts.try_fold(0, |total: Integer, amount| total.checked_add(amount))
}

/// Outputs owned by `address`, ordered by outpoint
pub fn spendable_outputs(utxo_set: &UtxoSet, address: &str) -> Vec<(OutPoint, UTXO)> {
    let mut owned: Vec<(OutPoint, UTXO)> = utxo_set
        .iter()
        .filter(|(_, utxo)| utxo.address == address && utxo.amount > 0)
        .map(|(outpoint, utxo)| (outpoint.clone(), utxo.clone()))
        .collect();
    owned.sort_by(|a, b| a.0.cmp(&b.0));
    owned
}

/// Build a payment of `amount` from `from` to `to`.
///
/// Outputs owned by `from` are taken in outpoint order until they cover
/// `amount`; any surplus comes back to `from` as change. Pass a view with the
/// mempool folded in so pending spends are not selected twice.
pub fn create_payment(utxo_view: &UtxoSet, from: &str, to: &str, amount: Integer) -> Result<Transaction> {
    if amount <= 0 {
        return Err(LedgerError::TransactionRejected(RejectReason::NonPositiveAmount));
    }

    let mut inputs = Vec::new();
    let mut gathered = 0i64;
    for (outpoint, utxo) in spendable_outputs(utxo_view, from) {
        if gathered >= amount {
            break;
        }
        gathered = gathered.saturating_add(utxo.amount);
        inputs.push(TransactionInput {
            prevout: outpoint,
            address: from.to_string(),
        });
    }

    if gathered < amount {
        return Err(LedgerError::InsufficientFunds {
            address: from.to_string(),
            available: gathered,
            requested: amount,
        });
    }

    let mut outputs = vec![TransactionOutput::new(amount, to)];
    let change = gathered - amount;
    if change > 0 {
        outputs.push(TransactionOutput::new(change, from));
    }

    Ok(Transaction::new(inputs, outputs))
}
