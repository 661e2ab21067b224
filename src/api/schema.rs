use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::ChainValidationError;

/// Outcome of walking the whole chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ValidationReport {
    /// Whether every block hashes correctly and links to its predecessor
    pub is_valid: bool,

    /// Index of the first broken block
    pub invalid_block: Option<u64>,

    /// Why that block failed
    pub reason: Option<String>,
}

impl From<Result<(), ChainValidationError>> for ValidationReport {
    fn from(result: Result<(), ChainValidationError>) -> Self {
        match result {
            Ok(()) => ValidationReport {
                is_valid: true,
                invalid_block: None,
                reason: None,
            },
            Err(err) => ValidationReport {
                is_valid: false,
                invalid_block: err.block_index(),
                reason: Some(err.to_string()),
            },
        }
    }
}

/// Balance of a single address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    /// The address queried
    pub address: String,

    /// Balance over sealed transactions
    pub balance: f64,

    /// Balance once the pending transactions are mined
    pub projected_balance: f64,
}
