//! Full ledger lifecycle through the public API

use utxo_ledger::*;

fn ledger() -> Blockchain {
    Blockchain::new(LedgerConfig::default().with_difficulty(2)).unwrap()
}

fn coinbase_outpoint(block: &Block) -> OutPoint {
    OutPoint::new(block.coinbase().unwrap().txid().clone(), 0)
}

fn spend(from: &OutPoint, owner: &str, to: &str, amount: Integer) -> Transaction {
    Transaction::new(
        vec![TransactionInput::new(from.txid.clone(), from.index, owner)],
        vec![TransactionOutput::new(amount, to)],
    )
}

#[test]
fn test_payment_and_double_spend_scenario() {
    let mut chain = ledger();
    assert_eq!(chain.balance("alice"), Some(50));

    assert_eq!(chain.mine("alice").unwrap(), 1);
    assert_eq!(chain.balance("alice"), Some(100));

    let genesis_out = coinbase_outpoint(chain.block(0).unwrap());
    let to_bob = spend(&genesis_out, "alice", "bob", 50);
    let to_carol = spend(&genesis_out, "alice", "carol", 50);

    assert_eq!(chain.submit_transaction(to_bob.clone()).unwrap(), MempoolResult::Accepted);
    assert_eq!(
        chain.submit_transaction(to_carol).unwrap(),
        MempoolResult::Rejected(RejectReason::MissingOrSpentUtxo)
    );
    assert_eq!(chain.mempool().len(), 1);

    assert_eq!(chain.mine("miner").unwrap(), 2);
    let block = chain.tip();
    assert_eq!(block.transactions().len(), 2);
    assert_eq!(block.transactions()[1], to_bob);
    assert!(chain.mempool().is_empty());

    assert_eq!(chain.balance("alice"), Some(50));
    assert_eq!(chain.balance("bob"), Some(50));
    assert_eq!(chain.balance("carol"), Some(0));
    assert!(chain.is_chain_valid());
}

#[test]
fn test_every_mined_hash_meets_difficulty() {
    let mut chain = ledger();
    for _ in 0..3 {
        chain.mine("alice").unwrap();
    }
    for block in chain.blocks().skip(1) {
        assert!(block.hash().starts_with("00"));
        assert_eq!(block.difficulty(), 2);
        assert!(pow::is_valid_proof(block, block.hash()));
    }
}

#[test]
fn test_mining_with_empty_mempool_is_coinbase_only() {
    let mut chain = ledger();
    chain.mine("miner").unwrap();
    assert_eq!(chain.tip().transactions().len(), 1);
    assert_eq!(chain.balance("miner"), Some(50));
}

#[test]
fn test_mining_skips_stale_entry_and_keeps_it_queued() {
    let mut chain = ledger();
    let genesis_out = coinbase_outpoint(chain.tip());
    assert!(chain.submit_transaction(spend(&genesis_out, "alice", "bob", 50)).unwrap().is_accepted());
    chain.mine("carol").unwrap();

    // The genesis output is now spent on chain, so this entry no longer applies
    let stale = spend(&genesis_out, "alice", "dave", 50);
    let valid = spend(&coinbase_outpoint(chain.tip()), "carol", "dave", 20);
    let mut chain = Blockchain::from_parts(
        chain.config().clone(),
        chain.blocks().cloned().collect(),
        chain.utxos().clone(),
        Mempool::from_transactions(vec![stale.clone(), valid.clone()]),
    )
    .unwrap();

    assert_eq!(chain.mine("miner").unwrap(), 2);
    let transactions = chain.tip().transactions();
    assert_eq!(transactions.len(), 2);
    assert!(transaction::is_coinbase(&transactions[0]));
    assert_eq!(transactions[1], valid);
    assert_eq!(chain.mempool().transactions(), &[stale]);
    assert_eq!(chain.balance("dave"), Some(20));
    assert!(chain.is_chain_valid());
}

#[test]
fn test_oversized_reward_balance_reports_overflow() {
    let config = LedgerConfig::default().with_difficulty(1).with_block_reward(Integer::MAX);
    let mut chain = Blockchain::new(config).unwrap();
    assert_eq!(chain.balance("alice"), Some(Integer::MAX));

    chain.mine("alice").unwrap();
    assert_eq!(chain.balance("alice"), None);
    assert_eq!(chain.pending_balance("alice"), None);
    assert_eq!(economic::total_value(chain.utxos()), None);
    assert!(chain.is_chain_valid());
}

#[test]
fn test_chained_pending_spends_mine_together() {
    let mut chain = ledger();
    let genesis_out = coinbase_outpoint(chain.tip());

    let first = spend(&genesis_out, "alice", "bob", 50);
    let second = Transaction::new(
        vec![TransactionInput::new(first.txid().clone(), 0, "bob")],
        vec![TransactionOutput::new(30, "carol"), TransactionOutput::new(15, "bob")],
    );
    assert!(chain.submit_transaction(first).unwrap().is_accepted());
    assert!(chain.submit_transaction(second).unwrap().is_accepted());
    assert_eq!(chain.pending_balance("bob"), Some(15));
    assert_eq!(chain.balance("bob"), Some(0));

    chain.mine("miner").unwrap();
    assert_eq!(chain.tip().transactions().len(), 3);
    assert_eq!(chain.balance("carol"), Some(30));
    assert_eq!(chain.balance("bob"), Some(15));
    assert!(chain.is_chain_valid());
}

#[test]
fn test_rejections_leave_state_unchanged() {
    let mut chain = ledger();
    let genesis_out = coinbase_outpoint(chain.tip());
    let before = chain.utxos().clone();

    let cases = vec![
        (spend(&genesis_out, "mallory", "mallory", 50), RejectReason::OwnershipMismatch),
        (spend(&genesis_out, "alice", "bob", 51), RejectReason::OutputsExceedInputs),
        (spend(&genesis_out, "alice", "bob", 0), RejectReason::NonPositiveAmount),
        (
            spend(&OutPoint::new("ff".repeat(32), 0), "alice", "bob", 1),
            RejectReason::MissingOrSpentUtxo,
        ),
        (
            Transaction::new(
                vec![
                    TransactionInput::new(genesis_out.txid.clone(), 0, "alice"),
                    TransactionInput::new(genesis_out.txid.clone(), 0, "alice"),
                ],
                vec![TransactionOutput::new(10, "bob")],
            ),
            RejectReason::DuplicateInput,
        ),
        (
            transaction::create_coinbase_transaction("mallory", 50, 1),
            RejectReason::CoinbaseInMempool,
        ),
    ];

    for (tx, reason) in cases {
        assert_eq!(chain.submit_transaction(tx).unwrap(), MempoolResult::Rejected(reason));
    }
    assert!(chain.mempool().is_empty());
    assert_eq!(chain.utxos(), &before);
}

#[test]
fn test_submit_record_checks_asserted_txid() {
    let mut chain = ledger();
    let genesis_out = coinbase_outpoint(chain.tip());
    let mut record = spend(&genesis_out, "alice", "bob", 20).to_record();
    record.txid = Some("00".repeat(32));

    assert_eq!(
        chain.submit_record(record.clone()).unwrap(),
        MempoolResult::Rejected(RejectReason::TxidMismatch)
    );

    record.txid = None;
    assert!(chain.submit_record(record).unwrap().is_accepted());
}

#[test]
fn test_create_payment_skips_pending_spends() {
    let mut chain = ledger();
    chain.mine("alice").unwrap();

    let first = chain.create_payment("alice", "bob", 40).unwrap();
    assert!(chain.submit_transaction(first.clone()).unwrap().is_accepted());

    let second = chain.create_payment("alice", "carol", 40).unwrap();
    assert!(second
        .inputs()
        .iter()
        .all(|input| !first.inputs().contains(input)));
    assert!(chain.submit_transaction(second).unwrap().is_accepted());

    assert_eq!(chain.pending_balance("alice"), Some(20));
    assert!(matches!(
        chain.create_payment("alice", "dave", 21),
        Err(LedgerError::InsufficientFunds { .. })
    ));
}

#[test]
fn test_utxo_records_are_sorted() {
    let mut chain = ledger();
    chain.mine("bob").unwrap();
    chain.mine("carol").unwrap();
    let records = chain.utxo_records();
    assert_eq!(records.len(), 3);
    assert!(records.windows(2).all(|w| (&w[0].txid, w[0].index) <= (&w[1].txid, w[1].index)));
}
