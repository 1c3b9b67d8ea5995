//! Live ledger state and full-chain replay
//!
//! [`Blockchain`] owns the committed chain, the committed UTXO set and the
//! mempool. Every mutation works on a copy first; the copy is persisted (when
//! the ledger has a store) and only then swapped in, so a failed step leaves
//! both memory and disk as they were.

use std::iter;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use log::{info, warn};

use crate::block::{connect_block, Block, UnsealedBlock};
use crate::config::LedgerConfig;
use crate::constants::*;
use crate::economic;
use crate::error::{ChainViolation, LedgerError, Result};
use crate::mempool::{pending_view, Mempool, MempoolResult};
use crate::mining::{assemble_block, next_timestamp, BlockTemplate};
use crate::pow::{self, is_valid_proof, MiningResult};
use crate::storage::{FileStore, Snapshot};
use crate::transaction::create_coinbase_transaction;
use crate::types::*;

#[derive(Debug, Clone)]
pub struct Blockchain {
    config: LedgerConfig,
    genesis: Block,
    /// Blocks 1.. in order
    descendants: Vec<Block>,
    utxos: UtxoSet,
    mempool: Mempool,
    store: Option<FileStore>,
}

impl Blockchain {
    /// In-memory ledger with a freshly mined genesis block
    pub fn new(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let (genesis, utxos) = create_genesis(&config)?;
        Ok(Blockchain {
            config,
            genesis,
            descendants: Vec::new(),
            utxos,
            mempool: Mempool::new(),
            store: None,
        })
    }

    /// Ledger persisted under `dir`.
    ///
    /// A missing snapshot starts a new chain. A snapshot that cannot be read
    /// is moved aside as `*.corrupt` and a new chain is started, after a
    /// warning naming the error. A snapshot that reads fine is kept as stored
    /// even when it fails replay; [`Blockchain::is_chain_valid`] reports it.
    pub fn open(dir: impl Into<PathBuf>, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let store = FileStore::new(dir)?;

        let loaded = match store.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    "could not load ledger from {}: {}; starting a new chain from genesis",
                    store.dir().display(),
                    e
                );
                store.quarantine()?;
                None
            }
        };

        let mut ledger = match loaded {
            Some(Snapshot { chain, utxos, mempool }) => {
                match Blockchain::from_parts(config.clone(), chain, utxos, mempool) {
                    Ok(ledger) => {
                        if !ledger.is_chain_valid() {
                            warn!("stored chain in {} fails replay", store.dir().display());
                        }
                        ledger
                    }
                    Err(e) => {
                        warn!("stored chain in {} is unusable: {}; starting from genesis", store.dir().display(), e);
                        store.quarantine()?;
                        Blockchain::new(config)?
                    }
                }
            }
            None => Blockchain::new(config)?,
        };

        ledger.store = Some(store);
        ledger.save()?;
        Ok(ledger)
    }

    /// Assemble a ledger from previously persisted parts without replaying them
    pub fn from_parts(
        config: LedgerConfig,
        chain: Vec<Block>,
        utxos: UtxoSet,
        mempool: Mempool,
    ) -> Result<Self> {
        config.validate()?;
        let mut blocks = chain.into_iter();
        let genesis = blocks
            .next()
            .ok_or_else(|| LedgerError::BlockValidation("chain has no genesis block".to_string()))?;
        Ok(Blockchain {
            config,
            genesis,
            descendants: blocks.collect(),
            utxos,
            mempool,
            store: None,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Every block from genesis to tip
    pub fn blocks(&self) -> impl DoubleEndedIterator<Item = &Block> + '_ {
        iter::once(&self.genesis).chain(self.descendants.iter())
    }

    pub fn block(&self, index: Natural) -> Option<&Block> {
        match index {
            0 => Some(&self.genesis),
            _ => self.descendants.get(index as usize - 1),
        }
    }

    pub fn tip(&self) -> &Block {
        self.descendants.last().unwrap_or(&self.genesis)
    }

    /// Number of blocks, which is also the index of the next block
    pub fn height(&self) -> Natural {
        self.descendants.len() as Natural + 1
    }

    pub fn utxos(&self) -> &UtxoSet {
        &self.utxos
    }

    pub fn utxo_records(&self) -> Vec<UtxoRecord> {
        utxo_records(&self.utxos)
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    /// Persist the current state if this ledger has a store
    pub fn save(&self) -> Result<()> {
        self.persist(self.blocks(), &self.utxos, &self.mempool)
    }

    fn persist<'a>(
        &self,
        blocks: impl IntoIterator<Item = &'a Block>,
        utxos: &UtxoSet,
        mempool: &Mempool,
    ) -> Result<()> {
        match &self.store {
            Some(store) => store.save(blocks, utxos, mempool),
            None => Ok(()),
        }
    }

    /// Validate `tx` against the committed set plus pending effects and queue it
    pub fn submit_transaction(&mut self, tx: Transaction) -> Result<MempoolResult> {
        self.admit_with(|mempool, utxos| mempool.admit(tx, utxos))
    }

    /// Submit a caller-built record; an asserted txid must match
    pub fn submit_record(&mut self, record: TransactionRecord) -> Result<MempoolResult> {
        self.admit_with(|mempool, utxos| mempool.admit_record(record, utxos))
    }

    fn admit_with(
        &mut self,
        admit: impl FnOnce(&mut Mempool, &UtxoSet) -> MempoolResult,
    ) -> Result<MempoolResult> {
        let mut mempool = self.mempool.clone();
        let result = admit(&mut mempool, &self.utxos);
        if result.is_accepted() {
            self.persist(self.blocks(), &self.utxos, &mempool)?;
            self.mempool = mempool;
        }
        Ok(result)
    }

    /// Build a payment spending outputs not already claimed by the mempool
    pub fn create_payment(&self, from: &str, to: &str, amount: Integer) -> Result<Transaction> {
        let view = pending_view(&self.utxos, &self.mempool);
        economic::create_payment(&view, from, to, amount)
    }

    /// Confirmed balance; `None` if the total does not fit an [`Integer`]
    pub fn balance(&self, address: &str) -> Option<Integer> {
        economic::balance(&self.utxos, address)
    }

    pub fn pending_balance(&self, address: &str) -> Option<Integer> {
        economic::pending_balance(&self.utxos, &self.mempool, address)
    }

    /// Mine the next block paying the reward to `miner_address`; returns its index
    pub fn mine(&mut self, miner_address: &str) -> Result<Natural> {
        let template = self.block_template(miner_address);
        let block = pow::mine_block(template.block, self.config.difficulty)?;
        self.commit(block, template.utxo_view, &template.included)
    }

    /// Like [`Blockchain::mine`], but gives up when `cancel` is raised.
    /// `Ok(None)` means the search was abandoned and nothing changed.
    pub fn mine_cancellable(&mut self, miner_address: &str, cancel: &AtomicBool) -> Result<Option<Natural>> {
        let template = self.block_template(miner_address);
        match pow::search(template.block, self.config.difficulty, None, Some(cancel))? {
            MiningResult::Mined(block) => self
                .commit(block, template.utxo_view, &template.included)
                .map(Some),
            MiningResult::Cancelled(_) | MiningResult::Exhausted(_) => Ok(None),
        }
    }

    fn block_template(&self, miner_address: &str) -> BlockTemplate {
        let tip = self.tip();
        assemble_block(
            &self.utxos,
            &self.mempool,
            miner_address,
            self.config.block_reward,
            self.height(),
            tip.hash(),
            next_timestamp(tip.timestamp()),
        )
    }

    fn commit(&mut self, block: Block, utxo_view: UtxoSet, included: &[Hash]) -> Result<Natural> {
        let mut mempool = self.mempool.clone();
        mempool.remove_included(included);
        self.persist(self.blocks().chain(iter::once(&block)), &utxo_view, &mempool)?;

        let index = block.index();
        info!(
            "mined block {} with {} transactions, hash {}",
            index,
            block.transactions().len(),
            block.hash()
        );
        self.descendants.push(block);
        self.utxos = utxo_view;
        self.mempool = mempool;
        Ok(index)
    }

    /// Replay the whole chain from an empty view; true only for a clean walk
    pub fn is_chain_valid(&self) -> bool {
        match self.validate_chain() {
            Ok(()) => true,
            Err(violation) => {
                warn!("chain replay failed: {}", violation);
                false
            }
        }
    }

    /// Replay the whole chain and report the first broken rule
    pub fn validate_chain(&self) -> std::result::Result<(), ChainViolation> {
        validate_chain(self.blocks(), &self.config).map(|_| ())
    }
}

/// Mine the genesis block and the UTXO set its coinbase creates
fn create_genesis(config: &LedgerConfig) -> Result<(Block, UtxoSet)> {
    let coinbase = create_coinbase_transaction(&config.genesis_address, config.block_reward, 0);
    let candidate = UnsealedBlock::new(0, vec![coinbase], next_timestamp(0), GENESIS_PREVIOUS_HASH);
    let genesis = pow::mine_block(candidate, config.difficulty)?;

    let mut utxos = UtxoSet::new();
    connect_block(&genesis, &mut utxos, config.block_reward)
        .map_err(|v| LedgerError::BlockValidation(v.to_string()))?;

    info!("created genesis block {} paying {}", genesis.hash(), config.genesis_address);
    Ok((genesis, utxos))
}

/// ChainReplay: ℬ* → {valid, invalid} × 𝒰𝒮
///
/// Walk the blocks in order on a private view that starts empty:
/// 1. block.index equals its position
/// 2. genesis links to "0"; every later block links to its predecessor's hash
/// 3. stored hash equals a fresh content hash
/// 4. after genesis: recorded difficulty ≥ configured, hash meets it
/// 5. optionally, timestamps never decrease
/// 6. transactions replay through [`connect_block`]
///
/// The committed state is never read or written; the rebuilt view is returned.
pub fn validate_chain<'a>(
    chain: impl IntoIterator<Item = &'a Block>,
    config: &LedgerConfig,
) -> std::result::Result<UtxoSet, ChainViolation> {
    let mut view = UtxoSet::new();
    let mut previous: Option<&'a Block> = None;

    for (position, block) in chain.into_iter().enumerate() {
        let index = block.index();
        if index != position as Natural {
            return Err(ChainViolation::IndexGap { position, index });
        }

        match previous {
            None => {
                if block.previous_hash() != GENESIS_PREVIOUS_HASH {
                    return Err(ChainViolation::GenesisLink(block.previous_hash().clone()));
                }
            }
            Some(prev) => {
                if block.previous_hash() != prev.hash() {
                    return Err(ChainViolation::BrokenLink(index));
                }
            }
        }

        if block.compute_hash() != *block.hash() {
            return Err(ChainViolation::HashMismatch(index));
        }

        if let Some(prev) = previous {
            if block.difficulty() < config.difficulty {
                return Err(ChainViolation::DifficultyTooLow {
                    index,
                    recorded: block.difficulty(),
                    required: config.difficulty,
                });
            }
            if !is_valid_proof(block, block.hash()) {
                return Err(ChainViolation::InsufficientWork(index));
            }
            if config.enforce_timestamp_order && block.timestamp() < prev.timestamp() {
                return Err(ChainViolation::TimestampRegression(index));
            }
        }

        connect_block(block, &mut view, config.block_reward)?;
        previous = Some(block);
    }

    match previous {
        Some(_) => Ok(view),
        None => Err(ChainViolation::EmptyChain),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectReason;

    fn ledger() -> Blockchain {
        Blockchain::new(LedgerConfig::default().with_difficulty(1)).unwrap()
    }

    #[test]
    fn test_genesis_is_valid() {
        let chain = ledger();
        assert_eq!(chain.height(), 1);
        assert!(chain.is_chain_valid());
        assert_eq!(chain.balance("alice"), Some(50));
        assert_eq!(chain.tip().previous_hash(), GENESIS_PREVIOUS_HASH);
        assert_eq!(chain.block(0), Some(chain.tip()));
        assert_eq!(chain.block(1), None);
    }

    #[test]
    fn test_tip_and_height_follow_mined_blocks() {
        let mut chain = ledger();
        chain.mine("alice").unwrap();
        chain.mine("bob").unwrap();
        assert_eq!(chain.height(), 3);
        assert_eq!(chain.tip().index(), 2);
        assert_eq!(chain.block(2), Some(chain.tip()));
        assert_eq!(chain.blocks().count(), 3);
        assert_eq!(chain.blocks().next_back(), Some(chain.tip()));
    }

    #[test]
    fn test_replay_rebuilds_committed_utxos() {
        let mut chain = ledger();
        chain.mine("bob").unwrap();
        let tx = chain.create_payment("alice", "carol", 20).unwrap();
        assert!(chain.submit_transaction(tx).unwrap().is_accepted());
        chain.mine("bob").unwrap();

        let rebuilt = validate_chain(chain.blocks(), chain.config()).unwrap();
        assert_eq!(&rebuilt, chain.utxos());
    }

    #[test]
    fn test_mine_links_to_tip() {
        let mut chain = ledger();
        let genesis_hash = chain.tip().hash().clone();
        assert_eq!(chain.mine("alice").unwrap(), 1);
        assert_eq!(chain.tip().previous_hash(), &genesis_hash);
        assert!(chain.tip().hash().starts_with('0'));
        assert_eq!(chain.balance("alice"), Some(100));
    }

    #[test]
    fn test_mine_cancellable_leaves_state_untouched() {
        let mut chain = Blockchain::new(LedgerConfig::default().with_difficulty(1)).unwrap();
        chain.config.difficulty = 64;
        let cancel = AtomicBool::new(true);
        assert_eq!(chain.mine_cancellable("alice", &cancel).unwrap(), None);
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.balance("alice"), Some(50));
    }

    #[test]
    fn test_failed_save_leaves_mined_state_uncommitted() {
        let dir = tempfile::tempdir().unwrap();
        let store_dir = dir.path().join("ledger");
        let mut chain = Blockchain::open(&store_dir, LedgerConfig::default().with_difficulty(1)).unwrap();
        let tx = chain.create_payment("alice", "bob", 10).unwrap();
        assert!(chain.submit_transaction(tx.clone()).unwrap().is_accepted());
        std::fs::remove_dir_all(&store_dir).unwrap();

        assert!(chain.mine("alice").is_err());
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.balance("alice"), Some(50));
        assert_eq!(chain.mempool().transactions(), &[tx]);
    }

    #[test]
    fn test_from_parts_rejects_empty_chain() {
        let result = Blockchain::from_parts(LedgerConfig::default(), vec![], UtxoSet::new(), Mempool::new());
        assert!(matches!(result, Err(LedgerError::BlockValidation(_))));
    }

    #[test]
    fn test_validate_chain_rejects_empty() {
        assert_eq!(
            validate_chain(&Vec::<Block>::new(), &LedgerConfig::default()),
            Err(ChainViolation::EmptyChain)
        );
    }

    #[test]
    fn test_validate_chain_rejects_swapped_blocks() {
        let mut chain = ledger();
        chain.mine("alice").unwrap();
        chain.mine("alice").unwrap();
        let mut blocks: Vec<Block> = chain.blocks().cloned().collect();
        blocks.swap(1, 2);
        assert_eq!(
            validate_chain(&blocks, chain.config()),
            Err(ChainViolation::IndexGap { position: 1, index: 2 })
        );
    }

    #[test]
    fn test_validate_chain_rejects_raised_difficulty_requirement() {
        let mut chain = ledger();
        chain.mine("alice").unwrap();
        let stricter = LedgerConfig::default().with_difficulty(2);
        assert!(matches!(
            validate_chain(chain.blocks(), &stricter),
            Err(ChainViolation::DifficultyTooLow { index: 1, .. })
        ));
    }

    #[test]
    fn test_validate_chain_reports_double_spend_block() {
        let mut chain = ledger();
        let genesis_out = OutPoint::new(chain.tip().transactions()[0].txid().clone(), 0);
        let spend = |to: &str| {
            Transaction::new(
                vec![TransactionInput::new(genesis_out.txid.clone(), 0, "alice")],
                vec![TransactionOutput::new(50, to)],
            )
        };
        // Forge a block carrying both spends; the miner would never build it
        let forged = UnsealedBlock::new(
            1,
            vec![
                create_coinbase_transaction("alice", 50, 1),
                spend("bob"),
                spend("carol"),
            ],
            chain.tip().timestamp(),
            chain.tip().hash().clone(),
        );
        let forged = pow::mine_block(forged, 1).unwrap();
        chain.descendants.push(forged);
        assert_eq!(
            chain.validate_chain(),
            Err(ChainViolation::InvalidTransaction {
                index: 1,
                position: 2,
                reason: RejectReason::MissingOrSpentUtxo,
            })
        );
        assert!(!chain.is_chain_valid());
    }

    #[test]
    fn test_timestamp_rule_is_optional() {
        let mut chain = ledger();
        let earlier = UnsealedBlock::new(
            1,
            vec![create_coinbase_transaction("alice", 50, 1)],
            chain.tip().timestamp() - 1,
            chain.tip().hash().clone(),
        );
        chain.descendants.push(pow::mine_block(earlier, 1).unwrap());
        assert!(chain.validate_chain().is_ok());

        chain.config.enforce_timestamp_order = true;
        assert_eq!(chain.validate_chain(), Err(ChainViolation::TimestampRegression(1)));
    }
}
