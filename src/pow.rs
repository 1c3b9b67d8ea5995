//! Proof of Work
//!
//! A block's work is valid when the hex form of its content hash begins with
//! `difficulty` `'0'` characters. The search is a plain nonce walk from 0 with
//! about `16^difficulty` expected attempts and no guaranteed termination; the
//! bounded and cancellable variants exist for callers that cannot block forever.

use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use serde_json::Value;

use crate::block::{content_value, Block, UnsealedBlock};
use crate::constants::MAX_DIFFICULTY;
use crate::error::{LedgerError, Result};
use crate::hash::{canonical_text, has_leading_zeros};
use crate::types::*;

/// Attempts between two polls of the cancel flag
const CANCEL_POLL_INTERVAL: Natural = 1024;

/// Result of a proof-of-work search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiningResult {
    Mined(Block),
    Exhausted(UnsealedBlock),
    Cancelled(UnsealedBlock),
}

/// Reject difficulties no SHA-256 hex digest can meet
pub fn check_difficulty(difficulty: Natural) -> Result<()> {
    if difficulty > MAX_DIFFICULTY {
        return Err(LedgerError::InvalidProofOfWork(format!(
            "difficulty {} exceeds {} hex digits",
            difficulty, MAX_DIFFICULTY
        )));
    }
    Ok(())
}

/// CheckProofOfWork: the hash carries the leading-zero prefix for `difficulty`
pub fn meets_target(hash: &str, difficulty: Natural) -> bool {
    has_leading_zeros(hash, difficulty)
}

/// IsValidProof: ℬ × ℍ → {true, false}
///
/// Both must hold:
/// 1. `claimed_hash` has the block's required leading-zero prefix
/// 2. `claimed_hash` equals a fresh content hash of the block
pub fn is_valid_proof(block: &Block, claimed_hash: &str) -> bool {
    meets_target(claimed_hash, block.difficulty()) && block.compute_hash() == claimed_hash
}

/// MineBlock: run the search until it succeeds
pub fn mine_block(block: UnsealedBlock, difficulty: Natural) -> Result<Block> {
    match search(block, difficulty, None, None)? {
        MiningResult::Mined(block) => Ok(block),
        // Only reachable once the whole nonce space is spent
        MiningResult::Exhausted(_) | MiningResult::Cancelled(_) => Err(
            LedgerError::InvalidProofOfWork("nonce space exhausted".to_string()),
        ),
    }
}

/// Search nonces 0, 1, 2, ... for a hash meeting `difficulty`.
///
/// The block is sealed only on success; on exhaustion or cancellation it is
/// handed back untouched.
pub fn search(
    mut block: UnsealedBlock,
    difficulty: Natural,
    max_attempts: Option<Natural>,
    cancel: Option<&AtomicBool>,
) -> Result<MiningResult> {
    check_difficulty(difficulty)?;

    let template = NonceTemplate::new(&block);
    let mut nonce: Natural = 0;
    loop {
        if let Some(limit) = max_attempts {
            if nonce >= limit {
                debug!("block {} search exhausted after {} attempts", block.index, limit);
                return Ok(MiningResult::Exhausted(block));
            }
        }

        if nonce % CANCEL_POLL_INTERVAL == 0 {
            if let Some(flag) = cancel {
                if flag.load(Ordering::Relaxed) {
                    warn!("block {} search cancelled at nonce {}", block.index, nonce);
                    return Ok(MiningResult::Cancelled(block));
                }
            }
        }

        let hash = template.hash_with_nonce(nonce);
        if meets_target(&hash, difficulty) {
            block.nonce = nonce;
            return Ok(MiningResult::Mined(Block::seal(block, hash, difficulty)));
        }

        nonce = match nonce.checked_add(1) {
            Some(next) => next,
            None => return Ok(MiningResult::Exhausted(block)),
        };
    }
}

/// Canonical block text split around the nonce.
///
/// Sorted keys put `index` and `nonce` first, so the text is
/// `{"index":I,"nonce":` + nonce + `,"previous_hash":...}`. The prefix is
/// absorbed into a SHA-256 state once and cloned for every attempt.
struct NonceTemplate {
    prefix_state: Sha256,
    suffix: String,
}

impl NonceTemplate {
    fn new(block: &UnsealedBlock) -> Self {
        let mut rest = content_value(
            block.index,
            &block.transactions,
            block.timestamp,
            &block.previous_hash,
            0,
        );
        if let Value::Object(map) = &mut rest {
            map.remove("index");
            map.remove("nonce");
        }
        let rest = canonical_text(&rest);

        let mut prefix_state = Sha256::new();
        prefix_state.update(format!("{{\"index\":{},\"nonce\":", block.index).as_bytes());

        NonceTemplate {
            prefix_state,
            // `rest` is `{...}`; drop its opening brace and continue the object
            suffix: format!(",{}", &rest[1..]),
        }
    }

    fn hash_with_nonce(&self, nonce: Natural) -> Hash {
        let mut state = self.prefix_state.clone();
        state.update(nonce.to_string().as_bytes());
        state.update(self.suffix.as_bytes());
        hex::encode(state.finalize())
    }
}

/// Proof-of-work search running on its own thread
pub struct MinerHandle {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<Result<MiningResult>>,
}

impl MinerHandle {
    /// Ask the worker to stop; it returns `Cancelled` at its next poll
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<MiningResult> {
        self.handle.join().map_err(|_| {
            LedgerError::InvalidProofOfWork("mining worker panicked".to_string())
        })?
    }
}

/// Offload an unbounded search to a worker thread
pub fn spawn_miner(block: UnsealedBlock, difficulty: Natural) -> MinerHandle {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let handle = thread::spawn(move || search(block, difficulty, None, Some(flag.as_ref())));
    MinerHandle { cancel, handle }
}
