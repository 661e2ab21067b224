use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use std::sync::Arc;

use super::block::Block;
use super::chain::{Blockchain, BlockchainError};
use super::crypto::{HashFunction, Sha256Hasher};
use super::transaction::Transaction;
use crate::config::LedgerConfig;

/// Errors that can occur while exporting or importing a ledger
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Rejected snapshot: {0}")]
    Rejected(#[from] BlockchainError),
}

/// Point-in-time copy of a ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChainSnapshot {
    /// Difficulty the blocks were mined at
    pub difficulty: usize,

    /// Reward paid per mined block
    pub mining_reward: f64,

    /// Every block, genesis first
    pub blocks: Vec<Block>,

    /// Transactions waiting for the next block
    pub pending_transactions: Vec<Transaction>,
}

impl ChainSnapshot {
    /// Encodes the snapshot as JSON text
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SnapshotError::SerializationError(e.to_string()))
    }

    /// Decodes a snapshot from JSON text
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(|e| SnapshotError::DeserializationError(e.to_string()))
    }

    /// Encodes the snapshot with bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::serialize(self).map_err(|e| SnapshotError::SerializationError(e.to_string()))
    }

    /// Decodes a bincode-encoded snapshot
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        bincode::deserialize(bytes)
            .map_err(|e| SnapshotError::DeserializationError(e.to_string()))
    }
}

impl Blockchain {
    /// Captures the chain and the pending buffer
    ///
    /// The chain is read before the pending buffer, so a block mined in
    /// between may leave its reward visible in both.
    pub fn to_snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            difficulty: self.difficulty(),
            mining_reward: self.mining_reward(),
            blocks: self.get_chain(),
            pending_transactions: self.get_pending_transactions(),
        }
    }

    /// Restores a ledger sealed with SHA-256
    pub fn from_snapshot(snapshot: ChainSnapshot) -> Result<Self, SnapshotError> {
        Self::from_snapshot_with_hasher(snapshot, Arc::new(Sha256Hasher))
    }

    /// Restores a ledger, rejecting snapshots whose chain or transactions
    /// fail validation
    pub fn from_snapshot_with_hasher(
        snapshot: ChainSnapshot,
        hasher: Arc<dyn HashFunction>,
    ) -> Result<Self, SnapshotError> {
        let config = LedgerConfig {
            difficulty: snapshot.difficulty,
            mining_reward: snapshot.mining_reward,
            ..LedgerConfig::default()
        };

        let blockchain = Blockchain::from_parts(
            &config,
            hasher,
            snapshot.blocks,
            snapshot.pending_transactions,
        )?;

        Ok(blockchain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::block::{BlockPayload, MiningControl};
    use crate::blockchain::chain::ChainValidationError;
    use crate::blockchain::crypto::Address;
    use crate::blockchain::transaction::TransactionError;
    use chrono::Utc;

    fn populated_ledger() -> Blockchain {
        let config = LedgerConfig {
            difficulty: 1,
            ..LedgerConfig::default()
        };
        let blockchain = Blockchain::from_config(&config).unwrap();
        let miner = Address::new("miner");

        blockchain.create_transaction(
            Transaction::new(Some(Address::new("alice")), Address::new("bob"), 7.5).unwrap(),
        );
        blockchain.mine_pending_transactions(&miner).unwrap();
        blockchain
            .add_data(Utc::now(), &serde_json::json!({ "name": "Tim", "flight": "11521" }))
            .unwrap();
        blockchain.mine_pending_transactions(&miner).unwrap();

        blockchain
    }

    #[test]
    fn test_json_export_and_import() {
        let blockchain = populated_ledger();
        let snapshot = blockchain.to_snapshot();

        let json = snapshot.to_json().unwrap();
        let restored = Blockchain::from_snapshot(ChainSnapshot::from_json(&json).unwrap()).unwrap();

        assert_eq!(restored.get_chain(), blockchain.get_chain());
        assert_eq!(
            restored.get_pending_transactions(),
            blockchain.get_pending_transactions()
        );
        assert!(restored.is_chain_valid());
        assert_eq!(
            restored.get_balance_of_address(&Address::new("bob")),
            blockchain.get_balance_of_address(&Address::new("bob"))
        );
    }

    #[test]
    fn test_binary_export_and_import() {
        let blockchain = populated_ledger();
        let bytes = blockchain.to_snapshot().to_bytes().unwrap();

        let restored = Blockchain::from_snapshot(ChainSnapshot::from_bytes(&bytes).unwrap()).unwrap();
        assert_eq!(restored.len(), 4);
        assert!(restored.is_chain_valid());
    }

    #[test]
    fn test_restored_ledger_keeps_mining() {
        let restored = Blockchain::from_snapshot(populated_ledger().to_snapshot()).unwrap();

        let block = restored.mine_pending_transactions(&Address::new("miner")).unwrap();
        assert_eq!(block.index, 4);
        assert!(restored.is_chain_valid());
    }

    #[test]
    fn test_rejects_tampered_snapshot() {
        let mut snapshot = populated_ledger().to_snapshot();
        snapshot.blocks[2].payload = BlockPayload::Data("{\"name\":\"Eve\"}".to_string());

        let result = Blockchain::from_snapshot(snapshot);
        assert!(matches!(
            result,
            Err(SnapshotError::Rejected(BlockchainError::InvalidChain(
                ChainValidationError::HashMismatch { index: 2 }
            )))
        ));
    }

    #[test]
    fn test_rejects_block_with_wrong_index() {
        let mut snapshot = populated_ledger().to_snapshot();
        let last = snapshot.blocks.last_mut().unwrap();
        last.index = 7;
        last.mine(1, &Sha256Hasher, &MiningControl::unbounded()).unwrap();

        let result = Blockchain::from_snapshot(snapshot);
        assert!(matches!(
            result,
            Err(SnapshotError::Rejected(BlockchainError::InvalidChain(
                ChainValidationError::IndexMismatch { index: 3 }
            )))
        ));
    }

    #[test]
    fn test_rejects_block_below_difficulty() {
        let config = LedgerConfig {
            difficulty: 2,
            ..LedgerConfig::default()
        };
        let blockchain = Blockchain::from_config(&config).unwrap();
        blockchain.mine_pending_transactions(&Address::new("miner")).unwrap();
        let mut snapshot = blockchain.to_snapshot();

        let latest = blockchain.get_latest_block().unwrap();
        let mut forged = Block::new(
            latest.index + 1,
            Utc::now(),
            BlockPayload::Transactions(vec![Transaction::reward(
                Address::new("mallory"),
                1_000_000.0,
            )]),
            latest.hash,
            &Sha256Hasher,
        );
        while forged.meets_difficulty(2) {
            forged.nonce += 1;
            forged.hash = forged.calculate_hash(&Sha256Hasher);
        }
        snapshot.blocks.push(forged);

        let result = Blockchain::from_snapshot(snapshot);
        assert!(matches!(
            result,
            Err(SnapshotError::Rejected(BlockchainError::InvalidChain(
                ChainValidationError::InsufficientWork { index: 2 }
            )))
        ));
    }

    #[test]
    fn test_rejects_negative_pending_amount() {
        let mut snapshot = populated_ledger().to_snapshot();
        snapshot
            .pending_transactions
            .push(Transaction::reward(Address::new("x"), -5.0));

        let result = Blockchain::from_snapshot(snapshot);
        assert!(matches!(
            result,
            Err(SnapshotError::Rejected(BlockchainError::TransactionError(
                TransactionError::InvalidAmount(_)
            )))
        ));
    }

    #[test]
    fn test_rejects_empty_snapshot() {
        let snapshot = ChainSnapshot {
            difficulty: 1,
            mining_reward: 100.0,
            blocks: Vec::new(),
            pending_transactions: Vec::new(),
        };

        assert!(matches!(
            Blockchain::from_snapshot(snapshot),
            Err(SnapshotError::Rejected(BlockchainError::InvalidChain(
                ChainValidationError::EmptyChain
            )))
        ));
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(matches!(
            ChainSnapshot::from_json("{ not json"),
            Err(SnapshotError::DeserializationError(_))
        ));
        assert!(matches!(
            ChainSnapshot::from_bytes(&[1, 2, 3]),
            Err(SnapshotError::DeserializationError(_))
        ));
    }
}
