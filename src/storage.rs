//! JSON snapshot persistence
//!
//! A snapshot is three files in one directory: the chain, the flattened UTXO
//! set and the mempool. Saving writes every file to a temporary sibling and
//! syncs it before any of them replaces its live counterpart, so a failed save
//! leaves the previous snapshot intact.

use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::block::Block;
use crate::constants::*;
use crate::error::Result;
use crate::mempool::Mempool;
use crate::types::*;

/// Everything persisted for one ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub chain: Vec<Block>,
    pub utxos: UtxoSet,
    pub mempool: Mempool,
}

/// File-backed snapshot store rooted at a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create the store, creating `dir` if it is missing
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(FileStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn chain_path(&self) -> PathBuf {
        self.dir.join(CHAIN_FILE)
    }

    pub fn utxo_path(&self) -> PathBuf {
        self.dir.join(UTXO_FILE)
    }

    pub fn mempool_path(&self) -> PathBuf {
        self.dir.join(MEMPOOL_FILE)
    }

    /// True when both the chain and UTXO files exist
    pub fn exists(&self) -> bool {
        self.chain_path().exists() && self.utxo_path().exists()
    }

    /// Write chain, UTXO set and mempool together
    pub fn save<'a>(
        &self,
        chain: impl IntoIterator<Item = &'a Block>,
        utxos: &UtxoSet,
        mempool: &Mempool,
    ) -> Result<()> {
        let chain: Vec<&Block> = chain.into_iter().collect();
        let staged = [
            (self.chain_path(), to_pretty_json(&chain)?),
            (self.utxo_path(), to_pretty_json(&utxo_records(utxos))?),
            (self.mempool_path(), to_pretty_json(mempool)?),
        ];

        let mut written = Vec::with_capacity(staged.len());
        for (path, bytes) in &staged {
            let tmp = tmp_path(path);
            if let Err(e) = write_synced(&tmp, bytes) {
                discard(&written);
                discard(&[tmp]);
                return Err(e.into());
            }
            written.push(tmp);
        }

        for (path, _) in &staged {
            fs::rename(tmp_path(path), path)?;
        }

        debug!(
            "saved snapshot to {}: {} blocks, {} utxos, {} pending",
            self.dir.display(),
            chain.len(),
            utxos.len(),
            mempool.len()
        );
        Ok(())
    }

    /// Move every snapshot file aside as `<name>.corrupt`, replacing older
    /// copies. Returns the paths that were moved.
    pub fn quarantine(&self) -> Result<Vec<PathBuf>> {
        let mut moved = Vec::new();
        for path in [self.chain_path(), self.utxo_path(), self.mempool_path()] {
            if path.exists() {
                let target = suffixed(&path, ".corrupt");
                fs::rename(&path, &target)?;
                moved.push(target);
            }
        }
        if !moved.is_empty() {
            warn!("moved unreadable snapshot files aside in {}", self.dir.display());
        }
        Ok(moved)
    }

    /// Read the snapshot. `Ok(None)` when no chain or UTXO file exists; a
    /// missing mempool file means an empty mempool.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        if !self.exists() {
            return Ok(None);
        }

        let chain: Vec<Block> = read_json(&self.chain_path())?;
        let records: Vec<UtxoRecord> = read_json(&self.utxo_path())?;
        let mempool = if self.mempool_path().exists() {
            read_json(&self.mempool_path())?
        } else {
            Mempool::new()
        };

        info!(
            "loaded snapshot from {}: {} blocks, {} utxos, {} pending",
            self.dir.display(),
            chain.len(),
            records.len(),
            mempool.len()
        );

        Ok(Some(Snapshot {
            chain,
            utxos: utxo_set_from_records(records),
            mempool,
        }))
    }
}

fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(value)?)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn tmp_path(path: &Path) -> PathBuf {
    suffixed(path, ".tmp")
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn discard(paths: &[PathBuf]) {
    for path in paths {
        let _ = fs::remove_file(path);
    }
}
