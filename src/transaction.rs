//! Transaction validation and UTXO application

use std::collections::HashSet;

use crate::constants::*;
use crate::error::RejectReason;
use crate::types::*;

/// Where a transaction is being validated. A coinbase is legal only as the
/// first transaction of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxContext {
    Mempool,
    Block { position: usize },
}

impl TxContext {
    fn allows_coinbase(&self) -> bool {
        matches!(self, TxContext::Block { position: 0 })
    }
}

/// CheckTransaction: structural rules independent of any UTXO view
///
/// 1. A non-coinbase transaction spends at least one input
/// 2. |inputs| ≤ MAX_INPUTS
/// 3. |outputs| ≤ MAX_OUTPUTS
pub fn check_transaction(tx: &Transaction) -> ValidationResult {
    if tx.inputs().is_empty() {
        return ValidationResult::Invalid(RejectReason::EmptyInputs);
    }

    if tx.inputs().len() > MAX_INPUTS {
        return ValidationResult::Invalid(RejectReason::TooManyInputs);
    }

    if tx.outputs().len() > MAX_OUTPUTS {
        return ValidationResult::Invalid(RejectReason::TooManyOutputs);
    }

    ValidationResult::Valid
}

/// Check if transaction is coinbase: exactly one input carrying the sentinel txid
pub fn is_coinbase(tx: &Transaction) -> bool {
    tx.inputs().len() == 1 && tx.inputs()[0].prevout.txid == COINBASE_SENTINEL
}

/// Create the reward-issuing transaction for `height`. The height tag in the
/// sentinel input keeps every coinbase txid distinct.
pub fn create_coinbase_transaction(
    miner_address: &str,
    reward: Integer,
    height: Natural,
) -> Transaction {
    Transaction::new(
        vec![coinbase_input(height)],
        vec![TransactionOutput::new(reward, miner_address)],
    )
}

/// ValidateAndApply: 𝒯𝒳 × 𝒰𝒮 → {valid, invalid}
///
/// For transaction tx against the view us:
/// 0. tx.txid equals the identity re-derived from its inputs and outputs
/// 1. Coinbase is legal only at block position 0 and only creates outputs
/// 2. Inputs are unique, present in us, claimed by their recorded owner, positive
/// 3. Outputs are positive
/// 4. Σ outputs ≤ Σ inputs (the difference is an unrecovered fee)
/// 5. us' = (us \ inputs) ∪ {(tx.txid, i) ↦ outputs[i]}
///
/// The view is only touched once every check has passed.
pub fn validate_and_apply(
    tx: &Transaction,
    utxo_view: &mut UtxoSet,
    context: TxContext,
) -> ValidationResult {
    if !tx.is_intact() {
        return ValidationResult::Invalid(RejectReason::TxidMismatch);
    }

    if is_coinbase(tx) {
        if !context.allows_coinbase() {
            let reason = match context {
                TxContext::Mempool => RejectReason::CoinbaseInMempool,
                TxContext::Block { .. } => RejectReason::CoinbaseMisplaced,
            };
            return ValidationResult::Invalid(reason);
        }
        return apply_coinbase(tx, utxo_view);
    }

    if let ValidationResult::Invalid(reason) = check_transaction(tx) {
        return ValidationResult::Invalid(reason);
    }

    let mut seen_inputs = HashSet::with_capacity(tx.inputs().len());
    let mut total_in = 0i64;
    for input in tx.inputs() {
        if !seen_inputs.insert(&input.prevout) {
            return ValidationResult::Invalid(RejectReason::DuplicateInput);
        }

        let utxo = match utxo_view.get(&input.prevout) {
            Some(utxo) => utxo,
            None => return ValidationResult::Invalid(RejectReason::MissingOrSpentUtxo),
        };

        if utxo.address != input.address {
            return ValidationResult::Invalid(RejectReason::OwnershipMismatch);
        }

        if utxo.amount <= 0 {
            return ValidationResult::Invalid(RejectReason::NonPositiveAmount);
        }

        total_in = match total_in.checked_add(utxo.amount) {
            Some(total) => total,
            None => return ValidationResult::Invalid(RejectReason::ValueOverflow),
        };
    }

    let total_out = match sum_outputs(tx) {
        Ok(total) => total,
        Err(reason) => return ValidationResult::Invalid(reason),
    };

    if total_in < total_out {
        return ValidationResult::Invalid(RejectReason::OutputsExceedInputs);
    }

    for input in tx.inputs() {
        utxo_view.remove(&input.prevout);
    }
    insert_outputs(tx, utxo_view);

    ValidationResult::Valid
}

fn apply_coinbase(tx: &Transaction, utxo_view: &mut UtxoSet) -> ValidationResult {
    if let Err(reason) = sum_outputs(tx) {
        return ValidationResult::Invalid(reason);
    }
    insert_outputs(tx, utxo_view);
    ValidationResult::Valid
}

/// Σ outputs, rejecting any non-positive amount
fn sum_outputs(tx: &Transaction) -> std::result::Result<Integer, RejectReason> {
    let mut total = 0i64;
    for output in tx.outputs() {
        if output.amount <= 0 {
            return Err(RejectReason::NonPositiveAmount);
        }
        total = total
            .checked_add(output.amount)
            .ok_or(RejectReason::ValueOverflow)?;
    }
    Ok(total)
}

fn insert_outputs(tx: &Transaction, utxo_view: &mut UtxoSet) {
    for (i, output) in tx.outputs().iter().enumerate() {
        utxo_view.insert(OutPoint::new(tx.txid().clone(), i as Natural), UTXO::from(output));
    }
}
