//! End-to-end walk through the ledger: mining, a payment, a rejected double
//! spend, persistence and tamper detection.
//!
//! State is written under `./data` unless `LEDGER_DATA_DIR` points elsewhere.
//! Settings come from the `LEDGER_*` environment variables.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use flexi_logger::Logger;
use log::info;

use utxo_ledger::{Block, Blockchain, LedgerConfig, MempoolResult, Transaction, TransactionInput, TransactionOutput};

fn main() -> Result<()> {
    let _logger = Logger::try_with_env_or_str("info")?
        .log_to_stderr()
        .start()
        .context("failed to start logger")?;

    let config = LedgerConfig::from_env();
    let data_dir = std::env::var("LEDGER_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));

    let mut ledger = Blockchain::open(&data_dir, config.clone())
        .with_context(|| format!("failed to open ledger in {}", data_dir.display()))?;
    info!("ledger at height {} in {}", ledger.height(), data_dir.display());

    let index = ledger.mine("miner1")?;
    println!("Mined block {} for miner1", index);
    println!("Chain valid? {}", ledger.is_chain_valid());
    print_balances(&ledger, &["miner1", "bob"]);

    // Spend the coinbase just mined, and then try to spend it again
    let coinbase = match ledger.tip().coinbase() {
        Some(tx) => tx.clone(),
        None => bail!("block {} has no coinbase", index),
    };
    let amount = coinbase.outputs()[0].amount;
    let spend_to = |to: &str| {
        Transaction::new(
            vec![TransactionInput::new(coinbase.txid().clone(), 0, "miner1")],
            vec![TransactionOutput::new(amount, to)],
        )
    };

    let first = ledger.submit_transaction(spend_to("bob"))?;
    println!("Add tx miner1->bob: {}", describe(&first));

    let double = ledger.submit_transaction(spend_to("someone_else"))?;
    println!("Add double-spend tx: {} (expected rejection)", describe(&double));

    let index = ledger.mine("miner1")?;
    println!("Mined block {} for miner1", index);
    println!("Chain valid? {}", ledger.is_chain_valid());
    print_balances(&ledger, &["miner1", "bob"]);
    println!("Saved to {}", data_dir.display());

    // Tampering with a stored amount must break the chain on replay
    let tampered: Vec<Block> = serde_json::from_value(tamper(&ledger, index)?)?;
    let rebuilt = Blockchain::from_parts(
        config,
        tampered,
        ledger.utxos().clone(),
        ledger.mempool().clone(),
    )?;
    match rebuilt.validate_chain() {
        Ok(()) => println!("After tamper, valid? true"),
        Err(violation) => println!("After tamper, valid? false ({})", violation),
    }

    Ok(())
}

/// Chain JSON with the payment in block `index` (position 1, after the
/// coinbase) raised to 9999. The stored txid is left as it was.
fn tamper(ledger: &Blockchain, index: u64) -> Result<serde_json::Value> {
    let mut chain = serde_json::to_value(ledger.blocks().collect::<Vec<_>>())?;
    let amount = chain
        .get_mut(index as usize)
        .and_then(|block| block.get_mut("transactions"))
        .and_then(|txs| txs.get_mut(1))
        .and_then(|tx| tx.get_mut("outputs"))
        .and_then(|outputs| outputs.get_mut(0))
        .and_then(|output| output.get_mut("amount"))
        .context("payment to tamper with is missing")?;
    *amount = serde_json::Value::from(9999);
    Ok(chain)
}

fn describe(result: &MempoolResult) -> String {
    match result {
        MempoolResult::Accepted => "accepted".to_string(),
        MempoolResult::Rejected(reason) => format!("rejected ({})", reason),
    }
}

fn print_balances(ledger: &Blockchain, addresses: &[&str]) {
    let balances: Vec<String> = addresses
        .iter()
        .map(|address| match ledger.balance(address) {
            Some(amount) => format!("{}={}", address, amount),
            None => format!("{}=overflow", address),
        })
        .collect();
    println!("Balances: {}", balances.join(", "));
}
