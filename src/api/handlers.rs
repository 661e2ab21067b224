use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use log::error;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{Address, Block, Blockchain, CargoDetails, Transaction};

use super::schema::{BalanceResponse, ValidationReport};

/// Data structure for the ledger state
pub type BlockchainData = web::Data<Blockchain>;

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// Request for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's address, omitted for minted value
    pub sender: Option<String>,

    /// The recipient's address
    pub recipient: String,

    /// The amount to transfer
    pub amount: f64,

    /// Optional shipment record
    pub details: Option<CargoDetails>,
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    /// The message
    pub message: String,

    /// The id of the queued transaction
    pub transaction_id: String,

    /// The index of the block that will include this transaction
    pub block_index: u64,
}

/// Request for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineRequest {
    /// The miner's address
    pub miner_address: String,
}

/// Response for the mine and add-block endpoints
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    /// The message
    pub message: String,

    /// The newly mined block
    pub block: Block,
}

/// Request for the add-block endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct DataBlockRequest {
    /// Arbitrary JSON sealed into the block
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

fn bad_request(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({ "error": message }))
}

fn internal_error(message: String) -> HttpResponse {
    error!("{}", message);
    HttpResponse::InternalServerError().json(serde_json::json!({ "error": message }))
}

/// Get the full ledger
///
/// Returns the entire chain and its validity status
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Chain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(blockchain: BlockchainData) -> impl Responder {
    let chain = blockchain.get_chain();
    let is_valid = blockchain.is_chain_valid();

    let response = ChainResponse {
        length: chain.len(),
        chain,
        is_valid,
    };

    HttpResponse::Ok().json(response)
}

/// Get all pending transactions
///
/// Returns all transactions waiting to be included in a block
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(blockchain: BlockchainData) -> impl Responder {
    let transactions = blockchain.get_pending_transactions();
    HttpResponse::Ok().json(transactions)
}

/// Create a new transaction
///
/// Adds a new transaction to the pending transactions
#[utoipa::path(
    post,
    path = "/api/v1/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction queued successfully", body = TransactionResponse),
        (status = 400, description = "Invalid transaction data")
    )
)]
pub async fn new_transaction(
    blockchain: BlockchainData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    let request = transaction_req.into_inner();

    let transaction = match Transaction::new(
        request.sender.map(Address::from),
        Address::from(request.recipient),
        request.amount,
    ) {
        Ok(transaction) => transaction,
        Err(err) => return bad_request(format!("Failed to create transaction: {}", err)),
    };

    let transaction = match request.details {
        Some(details) => transaction.with_details(details),
        None => transaction,
    };

    let transaction_id = transaction.id.clone();
    let block_index = blockchain.create_transaction(transaction);

    HttpResponse::Created().json(TransactionResponse {
        message: "Transaction will be added to Block".to_string(),
        transaction_id,
        block_index,
    })
}

/// Mine a new block
///
/// Seals all pending transactions into a new block
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    request_body = MineRequest,
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 400, description = "Invalid mining request"),
        (status = 500, description = "Mining failed")
    )
)]
pub async fn mine_block(
    blockchain: BlockchainData,
    mine_req: web::Json<MineRequest>,
) -> impl Responder {
    let miner_address = Address::from(mine_req.into_inner().miner_address);
    if miner_address.is_empty() {
        return bad_request("Miner address must not be empty".to_string());
    }

    // Proof of work is CPU bound, keep it off the async workers
    let ledger = blockchain.get_ref().clone();
    let result = web::block(move || ledger.mine_pending_transactions(&miner_address)).await;

    match result {
        Ok(Ok(block)) => HttpResponse::Ok().json(MineResponse {
            message: "New Block Mined".to_string(),
            block,
        }),
        Ok(Err(err)) => internal_error(format!("Failed to mine block: {}", err)),
        Err(err) => internal_error(format!("Mining task failed: {}", err)),
    }
}

/// Add a data block
///
/// Mines a block carrying arbitrary JSON directly onto the chain
#[utoipa::path(
    post,
    path = "/api/v1/blocks",
    request_body = DataBlockRequest,
    responses(
        (status = 201, description = "Block added successfully", body = MineResponse),
        (status = 500, description = "Mining failed")
    )
)]
pub async fn add_data_block(
    blockchain: BlockchainData,
    block_req: web::Json<DataBlockRequest>,
) -> impl Responder {
    let data = block_req.into_inner().data;
    let ledger = blockchain.get_ref().clone();
    let result = web::block(move || ledger.add_data(Utc::now(), &data)).await;

    match result {
        Ok(Ok(block)) => HttpResponse::Created().json(MineResponse {
            message: "New Block Added".to_string(),
            block,
        }),
        Ok(Err(err)) => internal_error(format!("Failed to add block: {}", err)),
        Err(err) => internal_error(format!("Mining task failed: {}", err)),
    }
}

/// Check if the ledger is valid
///
/// Validates the entire chain and reports the first broken block
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Chain validation status", body = ValidationReport)
    )
)]
pub async fn validate_chain(blockchain: BlockchainData) -> impl Responder {
    let report = ValidationReport::from(blockchain.validate_chain());
    HttpResponse::Ok().json(report)
}

/// Get address balance
///
/// Returns the balance of an address computed from every sealed transaction
#[utoipa::path(
    get,
    path = "/api/v1/balance/{address}",
    params(
        ("address" = String, Path, description = "Address to look up")
    ),
    responses(
        (status = 200, description = "Balance retrieved successfully", body = BalanceResponse)
    )
)]
pub async fn get_balance(
    blockchain: BlockchainData,
    address: web::Path<String>,
) -> impl Responder {
    let address = Address::from(address.into_inner());

    HttpResponse::Ok().json(BalanceResponse {
        balance: blockchain.get_balance_of_address(&address),
        projected_balance: blockchain.get_projected_balance_of_address(&address),
        address: address.0,
    })
}

/// Export the ledger
///
/// Returns a snapshot of every block and the pending transactions
#[utoipa::path(
    get,
    path = "/api/v1/export",
    responses(
        (status = 200, description = "Snapshot exported successfully", body = crate::blockchain::ChainSnapshot)
    )
)]
pub async fn export_chain(blockchain: BlockchainData) -> impl Responder {
    HttpResponse::Ok().json(blockchain.to_snapshot())
}
