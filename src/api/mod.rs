// API module
//
// This module contains the REST API over a shared ledger handle

pub mod handlers;
pub mod routes;
pub mod schema;

use utoipa::OpenApi;

// Re-export main components for easier access
pub use routes::configure_routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_chain,
        handlers::get_pending_transactions,
        handlers::new_transaction,
        handlers::mine_block,
        handlers::add_data_block,
        handlers::validate_chain,
        handlers::get_balance,
        handlers::export_chain
    ),
    components(
        schemas(
            crate::blockchain::Block,
            crate::blockchain::Transaction,
            crate::blockchain::CargoDetails,
            crate::blockchain::Address,
            crate::blockchain::ChainSnapshot,
            handlers::ChainResponse,
            handlers::TransactionRequest,
            handlers::TransactionResponse,
            handlers::MineRequest,
            handlers::MineResponse,
            handlers::DataBlockRequest,
            schema::ValidationReport,
            schema::BalanceResponse
        )
    ),
    tags(
        (name = "ledger", description = "Proof-of-work ledger API endpoints")
    ),
    info(
        title = "Ledger API",
        version = "0.1.0",
        description = "A tamper-evident proof-of-work ledger API",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
