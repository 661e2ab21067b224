use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use thiserror::Error;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::block::{Block, BlockPayload, MiningControl, MiningError};
use super::crypto::{Address, HashFunction, Sha256Hasher};
use super::transaction::{Transaction, TransactionError};
use crate::config::LedgerConfig;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("Mining error: {0}")]
    MiningError(#[from] MiningError),

    #[error("Invalid chain: {0}")]
    InvalidChain(#[from] ChainValidationError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// First integrity problem found while walking the chain
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainValidationError {
    #[error("Chain has no genesis block")]
    EmptyChain,

    #[error("Block {index} has a stored hash that does not match its contents")]
    HashMismatch { index: u64 },

    #[error("Block {index} does not point to the hash of the block before it")]
    LinkageMismatch { index: u64 },

    #[error("Block at position {index} carries a different index")]
    IndexMismatch { index: u64 },

    #[error("Block {index} does not meet the ledger difficulty")]
    InsufficientWork { index: u64 },
}

impl ChainValidationError {
    /// Position of the offending block, if there is one
    pub fn block_index(&self) -> Option<u64> {
        match self {
            ChainValidationError::EmptyChain => None,
            ChainValidationError::HashMismatch { index }
            | ChainValidationError::LinkageMismatch { index }
            | ChainValidationError::IndexMismatch { index }
            | ChainValidationError::InsufficientWork { index } => Some(*index),
        }
    }
}

/// Checks stored hashes, previous-hash links and indices of a sequence of
/// blocks
///
/// The genesis block's contents are trusted as-is; every later block must
/// hash to its stored hash, point at its predecessor's stored hash and carry
/// its position as index. Reported indices are positions in `blocks`.
pub fn validate_blocks(
    blocks: &[Block],
    hasher: &dyn HashFunction,
) -> Result<(), ChainValidationError> {
    if blocks.is_empty() {
        return Err(ChainValidationError::EmptyChain);
    }

    if blocks[0].index != 0 {
        return Err(ChainValidationError::IndexMismatch { index: 0 });
    }

    for (offset, pair) in blocks.windows(2).enumerate() {
        let position = offset as u64 + 1;
        let previous_block = &pair[0];
        let current_block = &pair[1];

        // Check if the hash is correct
        if current_block.hash != current_block.calculate_hash(hasher) {
            return Err(ChainValidationError::HashMismatch { index: position });
        }

        // Check if the previous hash is correct
        if current_block.previous_hash != previous_block.hash {
            return Err(ChainValidationError::LinkageMismatch { index: position });
        }

        if current_block.index != position {
            return Err(ChainValidationError::IndexMismatch { index: position });
        }
    }

    Ok(())
}

/// Checks that every block after genesis was mined at `difficulty`
pub fn validate_work(blocks: &[Block], difficulty: usize) -> Result<(), ChainValidationError> {
    match blocks
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, block)| !block.meets_difficulty(difficulty))
    {
        Some((position, _)) => Err(ChainValidationError::InsufficientWork {
            index: position as u64,
        }),
        None => Ok(()),
    }
}

/// Pending buffer plus the index of the block currently being sealed
#[derive(Debug, Default)]
struct PendingPool {
    transactions: Vec<Transaction>,

    /// Set while a block is mined outside the chain lock
    sealing: Option<u64>,
}

/// Represents the ledger
///
/// Cloning yields another handle onto the same chain and pending buffer.
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// The chain of blocks, never empty
    chain: Arc<RwLock<Vec<Block>>>,

    /// Pending transactions to be included in the next block
    pending: Arc<Mutex<PendingPool>>,

    /// Serializes "read latest block, mine, append"
    mining_lock: Arc<Mutex<()>>,

    /// Hash function sealing every block
    hasher: Arc<dyn HashFunction>,

    /// Mining difficulty (number of leading zeros required in hash)
    difficulty: usize,

    /// Mining reward
    mining_reward: f64,

    /// Cancellation and iteration bounds for mining
    mining_control: MiningControl,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Creates a new ledger with the default configuration
    pub fn new() -> Self {
        Self::build(&LedgerConfig::default(), Arc::new(Sha256Hasher))
    }

    /// Creates a new ledger from configuration, sealed with SHA-256
    pub fn from_config(config: &LedgerConfig) -> Result<Self, BlockchainError> {
        Self::with_hasher(config, Arc::new(Sha256Hasher))
    }

    /// Creates a new ledger using a caller-supplied hash function
    pub fn with_hasher(
        config: &LedgerConfig,
        hasher: Arc<dyn HashFunction>,
    ) -> Result<Self, BlockchainError> {
        config
            .validate()
            .map_err(|e| BlockchainError::InvalidConfig(e.to_string()))?;

        if config.difficulty > hasher.digest_len() {
            return Err(BlockchainError::InvalidConfig(format!(
                "difficulty {} exceeds the digest length {}",
                config.difficulty,
                hasher.digest_len()
            )));
        }

        Ok(Self::build(config, hasher))
    }

    fn build(config: &LedgerConfig, hasher: Arc<dyn HashFunction>) -> Self {
        let mining_control = MiningControl {
            cancel: None,
            max_iterations: config.max_mining_iterations,
        };

        let blockchain = Blockchain {
            chain: Arc::new(RwLock::new(Vec::new())),
            pending: Arc::new(Mutex::new(PendingPool::default())),
            mining_lock: Arc::new(Mutex::new(())),
            hasher,
            difficulty: config.difficulty,
            mining_reward: config.mining_reward,
            mining_control,
        };

        let genesis_block = blockchain.create_genesis_block();
        blockchain.write_chain().push(genesis_block);

        blockchain
    }

    /// Rebuilds a ledger from blocks and pending transactions that were
    /// exported earlier
    ///
    /// The blocks must form a valid chain mined at the configured difficulty,
    /// and every sealed or pending transaction must pass
    /// [`Transaction::validate`].
    pub(crate) fn from_parts(
        config: &LedgerConfig,
        hasher: Arc<dyn HashFunction>,
        blocks: Vec<Block>,
        pending_transactions: Vec<Transaction>,
    ) -> Result<Self, BlockchainError> {
        let blockchain = Self::with_hasher(config, hasher)?;

        validate_blocks(&blocks, blockchain.hasher.as_ref())?;
        validate_work(&blocks, config.difficulty)?;

        for transaction in blocks
            .iter()
            .flat_map(|block| block.payload.transactions())
            .chain(&pending_transactions)
        {
            transaction.validate()?;
        }

        *blockchain.write_chain() = blocks;
        blockchain.lock_pending().transactions = pending_transactions;

        Ok(blockchain)
    }

    /// Replaces the cancellation and iteration bounds of later mining runs
    pub fn with_mining_control(mut self, control: MiningControl) -> Self {
        self.mining_control = control;
        self
    }

    fn read_chain(&self) -> RwLockReadGuard<'_, Vec<Block>> {
        self.chain.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_chain(&self) -> RwLockWriteGuard<'_, Vec<Block>> {
        self.chain.write().unwrap_or_else(PoisonError::into_inner)
    }

    // Lock order is pending before chain
    fn lock_pending(&self) -> MutexGuard<'_, PendingPool> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates the genesis block (first block in the chain)
    pub fn create_genesis_block(&self) -> Block {
        Block::genesis(Utc::now(), self.hasher.as_ref())
    }

    /// Gets the last block in the chain
    ///
    /// # Returns
    ///
    /// The last block, or an invariant violation if the chain is empty
    pub fn get_latest_block(&self) -> Result<Block, BlockchainError> {
        match self.read_chain().last() {
            Some(block) => Ok(block.clone()),
            None => {
                error!("Ledger chain is empty; the genesis block is missing");
                Err(BlockchainError::InvariantViolation(
                    "chain has no genesis block".to_string(),
                ))
            }
        }
    }

    /// Adds a new transaction to the pending transactions
    ///
    /// # Returns
    ///
    /// The index of the block expected to include this transaction. While
    /// another block is being mined that is the block after it.
    pub fn create_transaction(&self, transaction: Transaction) -> u64 {
        debug!(
            "Queued transaction {} ({} -> {}: {})",
            transaction.id,
            transaction
                .sender
                .as_ref()
                .map(Address::as_str)
                .unwrap_or("<reward>"),
            transaction.recipient,
            transaction.amount
        );

        let mut pending = self.lock_pending();
        pending.transactions.push(transaction);

        match pending.sealing {
            Some(index) => index + 1,
            None => self.len() as u64,
        }
    }

    /// Mines every pending transaction into a new block
    ///
    /// # Arguments
    ///
    /// * `reward_address` - The address that receives the mining reward
    ///
    /// # Returns
    ///
    /// Result with the newly mined block
    pub fn mine_pending_transactions(
        &self,
        reward_address: &Address,
    ) -> Result<Block, BlockchainError> {
        self.mine_pending_transactions_at(reward_address, Utc::now())
    }

    /// Same as [`Blockchain::mine_pending_transactions`] with a caller-supplied timestamp
    pub fn mine_pending_transactions_at(
        &self,
        reward_address: &Address,
        timestamp: DateTime<Utc>,
    ) -> Result<Block, BlockchainError> {
        if reward_address.is_empty() {
            return Err(TransactionError::InvalidRecipientAddress(
                "Reward address must not be empty".to_string(),
            )
            .into());
        }

        let _mining = self.mining_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let latest_block = self.get_latest_block()?;
        let transactions = {
            let mut pending = self.lock_pending();
            pending.sealing = Some(latest_block.index + 1);
            std::mem::take(&mut pending.transactions)
        };

        let mut block = Block::new(
            latest_block.index + 1,
            timestamp,
            BlockPayload::Transactions(transactions),
            latest_block.hash,
            self.hasher.as_ref(),
        );

        if let Err(err) = block.mine(self.difficulty, self.hasher.as_ref(), &self.mining_control) {
            warn!("Mining block {} failed: {}", block.index, err);

            // Put the batch back in front of anything queued meanwhile
            let mut pending = self.lock_pending();
            pending.sealing = None;
            if let BlockPayload::Transactions(transactions) = block.payload {
                let queued = std::mem::replace(&mut pending.transactions, transactions);
                pending.transactions.extend(queued);
            }

            return Err(err.into());
        }

        {
            let mut pending = self.lock_pending();
            self.write_chain().push(block.clone());
            pending.sealing = None;

            // Reset pending transactions with the reward for this block
            pending.transactions.insert(
                0,
                Transaction::reward(reward_address.clone(), self.mining_reward),
            );
        }
        info!("Block mined: {} (index {})", block.hash, block.index);

        Ok(block)
    }

    /// Links, mines and appends a caller-built block
    ///
    /// The block's index and previous hash are overwritten so it extends the
    /// current latest block.
    pub fn add_block(&self, mut block: Block) -> Result<Block, BlockchainError> {
        let _mining = self.mining_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let latest_block = self.get_latest_block()?;
        block.index = latest_block.index + 1;
        block.previous_hash = latest_block.hash;

        self.lock_pending().sealing = Some(block.index);
        let mined = block.mine(self.difficulty, self.hasher.as_ref(), &self.mining_control);

        let mut pending = self.lock_pending();
        pending.sealing = None;
        mined?;

        self.write_chain().push(block.clone());
        drop(pending);
        info!("Block mined: {} (index {})", block.hash, block.index);

        Ok(block)
    }

    /// Appends a block carrying opaque JSON data
    pub fn add_data(
        &self,
        timestamp: DateTime<Utc>,
        data: &serde_json::Value,
    ) -> Result<Block, BlockchainError> {
        let block = Block::new(
            0,
            timestamp,
            BlockPayload::Data(data.to_string()),
            String::new(),
            self.hasher.as_ref(),
        );

        self.add_block(block)
    }

    /// Computes the balance of an address from every sealed transaction
    pub fn get_balance_of_address(&self, address: &Address) -> f64 {
        self.read_chain()
            .iter()
            .flat_map(|block| block.payload.transactions())
            .map(|transaction| transaction.balance_delta(address))
            .sum()
    }

    /// Balance the address will have once the pending buffer is mined
    pub fn get_projected_balance_of_address(&self, address: &Address) -> f64 {
        let pending: f64 = self
            .lock_pending()
            .transactions
            .iter()
            .map(|transaction| transaction.balance_delta(address))
            .sum();

        self.get_balance_of_address(address) + pending
    }

    /// Validates the ledger, reporting the first broken block
    pub fn validate_chain(&self) -> Result<(), ChainValidationError> {
        let result = validate_blocks(&self.read_chain(), self.hasher.as_ref());

        if let Err(err) = &result {
            warn!("Chain validation failed: {}", err);
        }

        result
    }

    /// Validates the ledger
    ///
    /// # Returns
    ///
    /// true if the ledger is valid, false otherwise
    pub fn is_chain_valid(&self) -> bool {
        self.validate_chain().is_ok()
    }

    /// Gets the entire chain
    pub fn get_chain(&self) -> Vec<Block> {
        self.read_chain().clone()
    }

    /// Gets all pending transactions
    pub fn get_pending_transactions(&self) -> Vec<Transaction> {
        self.lock_pending().transactions.clone()
    }

    /// Number of blocks including the genesis block
    pub fn len(&self) -> usize {
        self.read_chain().len()
    }

    /// Always false; the genesis block is present from construction
    pub fn is_empty(&self) -> bool {
        self.read_chain().is_empty()
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn mining_reward(&self) -> f64 {
        self.mining_reward
    }

    pub fn hasher(&self) -> Arc<dyn HashFunction> {
        Arc::clone(&self.hasher)
    }
}
