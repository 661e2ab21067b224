use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use log::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use proof_ledger::api::{self, ApiDoc};
use proof_ledger::blockchain::{Address, Blockchain, CargoDetails, Transaction};
use proof_ledger::config::{self, Config};

/// Sample lost-luggage records queued when `seed_demo` is enabled
const DEMO_SHIPMENTS: [(&str, &str, &str, &str, &str); 4] = [
    ("John", "TPA", "MCO", "115", "JBLUE"),
    ("Jim", "BDL", "MCO", "115", "JBLUE"),
    ("Jason", "BDL", "MCO", "115", "JBLUE"),
    ("Patrick", "BDL", "MCO", "115", "JBLUE"),
];

// Queue the demo shipments and mine them twice so the first reward is sealed
fn seed_demo(blockchain: &Blockchain, miner: &Address) -> anyhow::Result<()> {
    for (name, origin, destination, flight, carrier) in DEMO_SHIPMENTS {
        let details = CargoDetails {
            name: name.to_string(),
            origin: origin.to_string(),
            destination: destination.to_string(),
            flight: flight.to_string(),
            carrier: carrier.to_string(),
        };

        let transaction = Transaction::new(Some(Address::new(name)), Address::new(destination), 0.0)?
            .with_details(details);
        blockchain.create_transaction(transaction);
    }

    info!("Starting to mine demo shipments");
    blockchain.mine_pending_transactions(miner)?;
    info!("Balance of {} is {}", miner, blockchain.get_balance_of_address(miner));

    info!("Mining again to seal the reward transaction");
    blockchain.mine_pending_transactions(miner)?;
    info!("Balance of {} is {}", miner, blockchain.get_balance_of_address(miner));

    if !blockchain.is_chain_valid() {
        warn!("Demo chain failed validation");
    }

    Ok(())
}

// Build the ledger from configuration, seeding demo data if asked to
fn initialize_blockchain(config: &Config) -> anyhow::Result<Blockchain> {
    let blockchain =
        Blockchain::from_config(&config.ledger).context("Failed to create the ledger")?;

    info!(
        "Created ledger with difficulty {} and mining reward {}",
        blockchain.difficulty(),
        blockchain.mining_reward()
    );

    if config.server.seed_demo {
        let miner = Address::new(config.server.miner_address.clone());
        seed_demo(&blockchain, &miner).context("Failed to seed demo data")?;
    }

    Ok(blockchain)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = config::load_from_env().context("Failed to load configuration")?;

    let blockchain = web::Data::new(initialize_blockchain(&config)?);

    let bind_address = (config.server.host.clone(), config.server.port);
    info!(
        "Starting HTTP server at http://{}:{}",
        bind_address.0, bind_address.1
    );

    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(blockchain.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind(bind_address)?
    .run()
    .await?;

    Ok(())
}
