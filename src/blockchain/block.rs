use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::crypto::HashFunction;
use super::transaction::Transaction;

/// Previous hash recorded on the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// How many nonce attempts pass between two polls of the cancel flag
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Errors that can stop proof-of-work before a valid nonce is found
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MiningError {
    #[error("Mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("Mining gave up after reaching the limit of {limit} attempts")]
    IterationLimit { limit: u64 },

    #[error("Nonce space exhausted before a valid hash was found")]
    NonceExhausted,

    #[error("Difficulty {difficulty} exceeds the digest length of {digest_len}")]
    DifficultyUnreachable { difficulty: usize, digest_len: usize },
}

/// Content sealed into a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockPayload {
    /// An ordered batch of transfers
    Transactions(Vec<Transaction>),

    /// Opaque caller data, kept as JSON text
    Data(String),
}

impl BlockPayload {
    /// Transactions carried by the payload, empty for opaque data
    pub fn transactions(&self) -> &[Transaction] {
        match self {
            BlockPayload::Transactions(transactions) => transactions,
            BlockPayload::Data(_) => &[],
        }
    }
}

/// Shared flag a caller can raise to stop an in-progress mining loop
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal every miner holding a clone of this flag to stop.
    ///
    /// Once triggered the flag remains set.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Bounds applied to a mining loop
#[derive(Debug, Clone, Default)]
pub struct MiningControl {
    /// Flag polled while searching for a nonce
    pub cancel: Option<CancelFlag>,

    /// Maximum number of hashes to try before giving up
    pub max_iterations: Option<u64>,
}

impl MiningControl {
    /// Mining without any bound
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }
}

/// Represents a block in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Index of the block in the chain
    pub index: u64,

    /// Timestamp supplied when the block was created
    #[schema(value_type = String, example = "2023-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,

    /// Transactions or opaque data sealed by this block
    #[schema(value_type = Object)]
    pub payload: BlockPayload,

    /// Hash of the previous block
    pub previous_hash: String,

    /// Hash of the current block
    pub hash: String,

    /// Proof of work counter
    pub nonce: u64,
}

impl Block {
    /// Creates a new unmined block
    ///
    /// # Arguments
    ///
    /// * `index` - The index of the block in the chain
    /// * `timestamp` - Creation time of the block
    /// * `payload` - Transactions or data to seal
    /// * `previous_hash` - The hash of the previous block
    /// * `hasher` - Hash function used to compute the initial hash
    ///
    /// # Returns
    ///
    /// A new Block with nonce 0 and a hash matching its fields
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        payload: BlockPayload,
        previous_hash: String,
        hasher: &dyn HashFunction,
    ) -> Self {
        let block = Block {
            index,
            timestamp,
            payload,
            previous_hash,
            hash: String::new(),
            nonce: 0,
        };

        let hash = block.calculate_hash(hasher);

        Block { hash, ..block }
    }

    /// Creates the first block of a chain; it is never mined
    pub fn genesis(timestamp: DateTime<Utc>, hasher: &dyn HashFunction) -> Self {
        Block::new(
            0,
            timestamp,
            BlockPayload::Transactions(Vec::new()),
            GENESIS_PREVIOUS_HASH.to_string(),
            hasher,
        )
    }

    /// Everything the hash covers except the nonce
    fn hash_header(&self) -> String {
        serde_json::json!([
            self.index,
            self.previous_hash,
            self.timestamp,
            self.payload
        ])
        .to_string()
    }

    fn hash_with_header(header: &str, nonce: u64, hasher: &dyn HashFunction) -> String {
        hasher.digest(format!("{}{}", header, nonce).as_bytes())
    }

    /// Calculates the hash of the block
    ///
    /// The digest covers the index, previous hash, timestamp, payload and
    /// nonce. Mining and validation both go through here.
    pub fn calculate_hash(&self, hasher: &dyn HashFunction) -> String {
        Self::hash_with_header(&self.hash_header(), self.nonce, hasher)
    }

    /// Checks that the stored hash starts with `difficulty` zeros
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.hash.len() >= difficulty && self.hash.bytes().take(difficulty).all(|b| b == b'0')
    }

    /// Searches for a nonce whose hash starts with `difficulty` zeros
    ///
    /// On success the block holds the winning nonce and hash and the number of
    /// hashes tried is returned. On failure the block keeps the last nonce it
    /// tried and must be mined again before it can be appended.
    pub fn mine(
        &mut self,
        difficulty: usize,
        hasher: &dyn HashFunction,
        control: &MiningControl,
    ) -> Result<u64, MiningError> {
        let digest_len = hasher.digest_len();
        if difficulty > digest_len {
            return Err(MiningError::DifficultyUnreachable {
                difficulty,
                digest_len,
            });
        }

        let header = self.hash_header();
        self.hash = Self::hash_with_header(&header, self.nonce, hasher);
        let mut attempts: u64 = 1;

        while !self.meets_difficulty(difficulty) {
            if let Some(limit) = control.max_iterations {
                if attempts >= limit {
                    return Err(MiningError::IterationLimit { limit });
                }
            }

            if let Some(cancel) = &control.cancel {
                if attempts % CANCEL_CHECK_INTERVAL == 1 && cancel.is_triggered() {
                    return Err(MiningError::Cancelled { attempts });
                }
            }

            self.nonce = self.nonce.checked_add(1).ok_or(MiningError::NonceExhausted)?;
            self.hash = Self::hash_with_header(&header, self.nonce, hasher);
            attempts += 1;
        }

        debug!(
            "Found nonce {} for block {} after {} attempts",
            self.nonce, self.index, attempts
        );

        Ok(attempts)
    }
}
