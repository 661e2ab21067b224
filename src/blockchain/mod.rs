// Ledger module
//
// This module contains the core ledger implementation including:
// - Block structure and proof of work
// - Blockchain structure (chain, pending buffer, validation)
// - Transaction structure
// - Hash function and addresses
// - Chain snapshots for export

pub mod block;
pub mod chain;
pub mod crypto;
pub mod snapshot;
pub mod transaction;

// Re-export main components for easier access
pub use block::{Block, BlockPayload, CancelFlag, MiningControl, MiningError};
pub use chain::{Blockchain, BlockchainError, ChainValidationError};
pub use crypto::{Address, HashFunction, Sha256Hasher};
pub use snapshot::{ChainSnapshot, SnapshotError};
pub use transaction::{CargoDetails, Transaction, TransactionError};
