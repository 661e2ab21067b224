//! Integration tests for the ledger REST API

use actix_web::{test, web, App};
use serde_json::{json, Value};

use proof_ledger::api::configure_routes;
use proof_ledger::blockchain::Blockchain;
use proof_ledger::config::LedgerConfig;

fn ledger_data() -> web::Data<Blockchain> {
    let config = LedgerConfig {
        difficulty: 1,
        mining_reward: 50.0,
        ..LedgerConfig::default()
    };
    web::Data::new(Blockchain::from_config(&config).expect("Failed to create ledger"))
}

#[actix_web::test]
async fn test_transaction_mine_and_balance_flow() {
    let data = ledger_data();
    let app = test::init_service(App::new().app_data(data.clone()).configure(configure_routes)).await;

    // Genesis only
    let req = test::TestRequest::get().uri("/api/v1/chain").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["length"], 1);
    assert_eq!(body["is_valid"], true);

    // Queue a transfer with a shipment record
    let req = test::TestRequest::post()
        .uri("/api/v1/transactions/new")
        .set_json(json!({
            "sender": "alice",
            "recipient": "bob",
            "amount": 12.5,
            "details": {
                "name": "Francisco",
                "origin": "TPA",
                "destination": "MCO",
                "flight": "11521",
                "carrier": "JBLUE"
            }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["block_index"], 1);

    let req = test::TestRequest::get().uri("/api/v1/transactions/pending").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    // Mine it
    let req = test::TestRequest::post()
        .uri("/api/v1/mine")
        .set_json(json!({ "miner_address": "minerX" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["block"]["index"], 1);

    let req = test::TestRequest::get().uri("/api/v1/balance/bob").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["address"], "bob");
    assert_eq!(body["balance"], 12.5);

    let req = test::TestRequest::get().uri("/api/v1/balance/minerX").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["balance"], 0.0);
    assert_eq!(body["projected_balance"], 50.0);

    let req = test::TestRequest::get().uri("/api/v1/validate").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["is_valid"], true);
    assert_eq!(body["invalid_block"], Value::Null);
}

#[actix_web::test]
async fn test_rejects_invalid_transaction() {
    let data = ledger_data();
    let app = test::init_service(App::new().app_data(data.clone()).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/transactions/new")
        .set_json(json!({ "sender": "alice", "recipient": "bob", "amount": -3.0 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::post()
        .uri("/api/v1/mine")
        .set_json(json!({ "miner_address": "" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    assert!(data.get_pending_transactions().is_empty());
    assert_eq!(data.len(), 1);
}

#[actix_web::test]
async fn test_data_block_and_export() {
    let data = ledger_data();
    let app = test::init_service(App::new().app_data(data.clone()).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/blocks")
        .set_json(json!({ "data": { "name": "Tim", "dest": "MCO", "org": "TPA" } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let req = test::TestRequest::get().uri("/api/v1/export").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["difficulty"], 1);
    assert_eq!(body["blocks"].as_array().map(Vec::len), Some(2));
    assert!(body["blocks"][1]["payload"]["Data"].is_string());
}
