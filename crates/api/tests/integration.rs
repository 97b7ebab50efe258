//! Integration tests for API routes.
//!
//! Uses `tower::ServiceExt` to test Axum routes without a real HTTP server,
//! against an in-memory storage backend and a canned quote provider.
//!
//! ```bash
//! cargo test -p lendcalc-api --test integration
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::{Value, json};
use tower::ServiceExt;

use lendcalc_api::routes::create_router;
use lendcalc_api::state::AppState;
use lendcalc_common::config::AppConfig;
use lendcalc_engine::persistence::{CONFIG_KEY, KeyValueStore, MemoryStore, parse_config};
use lendcalc_engine::service::PositionService;
use lendcalc_engine::store::QuoteMap;
use lendcalc_pricesync::{QuoteBatch, QuoteError, QuoteProvider};

// ============================================================
// Helpers
// ============================================================

/// Quotes every symbol at a fixed price, except `NOPE` (no quote) and
/// `DOWN` (provider failure).
struct FlatProvider(f64);

#[async_trait]
impl QuoteProvider for FlatProvider {
    fn id(&self) -> &'static str {
        "FLAT"
    }

    async fn fetch_prices(&self, symbols: &[String]) -> Result<QuoteBatch, QuoteError> {
        if symbols.iter().any(|s| s == "DOWN") {
            return Err(QuoteError::Decode("provider unavailable".to_string()));
        }
        let (missing, quoted): (Vec<String>, Vec<String>) =
            symbols.iter().cloned().partition(|s| s == "NOPE");
        let prices: QuoteMap = quoted.into_iter().map(|s| (s, self.0)).collect();
        Ok(QuoteBatch {
            prices,
            missing,
            fetched_at: Utc::now(),
        })
    }
}

fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "PRICE_POLL_INTERVAL_MS" => Some("3600000".to_string()),
        _ => None,
    })
    .unwrap()
}

fn build_app() -> (Router, Arc<MemoryStore>) {
    let storage = Arc::new(MemoryStore::new());
    let service = PositionService::load(storage.clone());
    let state = AppState::new(service, Arc::new(FlatProvider(1.0)), test_config());
    (create_router(state), storage)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// 10 ETH @ 2000, multiplier 0.8 → 16,000 USD of capacity.
async fn add_eth(app: &Router) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/collaterals",
        Some(json!({"name": "eth", "price": 2000.0, "amount": 10.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["id"].as_str().unwrap().to_string()
}

fn approx(value: &Value, expected: f64) -> bool {
    (value.as_f64().unwrap() - expected).abs() < 1e-9
}

// ============================================================
// Health and snapshot
// ============================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = build_app();
    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "lendcalc-api");
    assert_eq!(json["price_sync_active"], false);
    assert_eq!(json["price_poll_interval_ms"], 3_600_000);
}

#[tokio::test]
async fn test_empty_position() {
    let (app, _) = build_app();
    let (status, json) = send(&app, "GET", "/api/position", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["config"]["multiplier"], 0.8);
    assert_eq!(json["config"]["collaterals"], json!([]));
    assert_eq!(json["config"]["borrowedAssets"], json!([]));
    assert_eq!(json["summary"]["utilization"]["state"], "ratio");
    assert_eq!(json["display"]["total_collateral_value"], "$0.00");
    assert_eq!(json["display"]["utilization"], "0.00%");
}

// ============================================================
// Collaterals
// ============================================================

#[tokio::test]
async fn test_add_collateral_normalizes_name_and_persists() {
    let (app, storage) = build_app();
    let id = add_eth(&app).await;

    let (_, json) = send(&app, "GET", "/api/position", None).await;
    assert_eq!(json["config"]["collaterals"][0]["name"], "ETH");
    assert_eq!(json["config"]["collaterals"][0]["id"], id.as_str());
    assert_eq!(json["display"]["total_collateral_value"], "$20,000.00");

    let saved = parse_config(&storage.get(CONFIG_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(saved.collaterals.len(), 1);
}

#[tokio::test]
async fn test_add_collateral_with_empty_name_is_rejected() {
    let (app, _) = build_app();
    let (status, json) = send(
        &app,
        "POST",
        "/api/collaterals",
        Some(json!({"name": "  ", "price": 1.0, "amount": 1.0})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn test_patch_collateral_renames_and_excludes() {
    let (app, _) = build_app();
    let id = add_eth(&app).await;

    let (status, json) = send(
        &app,
        "PATCH",
        &format!("/api/collaterals/{}", id),
        Some(json!({"name": "steth", "included": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(approx(&json["summary"]["total_collateral_value"], 0.0));

    let (_, json) = send(&app, "GET", "/api/position", None).await;
    assert_eq!(json["config"]["collaterals"][0]["name"], "STETH");
    assert_eq!(json["config"]["collaterals"][0]["included"], false);
}

#[tokio::test]
async fn test_edit_collateral_field() {
    let (app, _) = build_app();
    let id = add_eth(&app).await;

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/api/collaterals/{}/price", id),
        Some(json!({"value": 2500.0})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"]["outcome"], "applied");
    assert!(approx(&json["summary"]["total_collateral_value"], 25000.0));
}

#[tokio::test]
async fn test_negative_edit_is_rejected_without_change() {
    let (app, _) = build_app();
    let id = add_eth(&app).await;

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/collaterals/{}/amount", id),
        Some(json!({"value": -1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, json) = send(&app, "GET", "/api/position", None).await;
    assert_eq!(json["config"]["collaterals"][0]["amount"], 10.0);
}

#[tokio::test]
async fn test_unknown_field_is_bad_request() {
    let (app, _) = build_app();
    let id = add_eth(&app).await;

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/collaterals/{}/name", id),
        Some(json!({"value": 1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let (app, _) = build_app();

    let (status, _) = send(
        &app,
        "PUT",
        "/api/collaterals/missing/price",
        Some(json!({"value": 1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/api/collaterals/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/api/borrowed/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_collateral() {
    let (app, _) = build_app();
    let id = add_eth(&app).await;

    let (status, json) = send(&app, "DELETE", &format!("/api/collaterals/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(approx(&json["summary"]["total_collateral_value"], 0.0));
}

// ============================================================
// Borrowed assets
// ============================================================

#[tokio::test]
async fn test_borrow_requires_collateral() {
    let (app, _) = build_app();
    let (status, _) = send(
        &app,
        "POST",
        "/api/borrowed",
        Some(json!({"name": "usdc", "price": 1.0, "amount": 100.0})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_add_borrowed_is_clamped_to_capacity() {
    let (app, _) = build_app();
    add_eth(&app).await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/borrowed",
        Some(json!({"name": "usdc", "price": 1.0, "amount": 20000.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(approx(&json["summary"]["total_borrow_value"], 16000.0));
    assert!(approx(&json["summary"]["remaining_borrow_power"], 0.0));
    assert_eq!(json["summary"]["risk"], "at_limit");
}

#[tokio::test]
async fn test_edit_borrowed_amount_reports_clamp() {
    let (app, _) = build_app();
    add_eth(&app).await;
    let (_, json) = send(
        &app,
        "POST",
        "/api/borrowed",
        Some(json!({"name": "usdc", "price": 1.0, "amount": 5000.0})),
    )
    .await;
    let id = json["id"].as_str().unwrap().to_string();

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/api/borrowed/{}/amount", id),
        Some(json!({"value": 50000.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"]["outcome"], "amount_clamped");
    assert!(approx(&json["outcome"]["requested"], 50000.0));
    assert!(approx(&json["outcome"]["stored"], 16000.0));

    let (status, _) = send(&app, "DELETE", &format!("/api/borrowed/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_remove_unknown_id_leaves_storage_untouched() {
    let (app, storage) = build_app();
    add_eth(&app).await;
    let before = storage.get(CONFIG_KEY).unwrap();

    let (status, json) = send(&app, "DELETE", "/api/collaterals/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("missing"));
    assert_eq!(storage.get(CONFIG_KEY).unwrap(), before);
}

// ============================================================
// Multiplier
// ============================================================

#[tokio::test]
async fn test_set_multiplier() {
    let (app, _) = build_app();
    add_eth(&app).await;

    let (status, json) = send(&app, "PUT", "/api/multiplier", Some(json!({"value": 0.5}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(approx(&json["summary"]["borrow_capacity"], 10000.0));

    let (status, _) = send(&app, "PUT", "/api/multiplier", Some(json!({"value": 1.5}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ============================================================
// Price sync
// ============================================================

#[tokio::test]
async fn test_price_sync_toggle() {
    let (app, _) = build_app();
    add_eth(&app).await;

    let (status, json) = send(&app, "GET", "/api/price-sync", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["active"], false);
    assert_eq!(json["provider"], "FLAT");

    let (status, json) = send(&app, "PUT", "/api/price-sync", Some(json!({"enabled": true}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["active"], true);

    let (_, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(json["price_sync_active"], true);

    let (status, json) = send(&app, "PUT", "/api/price-sync", Some(json!({"enabled": false}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["active"], false);

    let (_, json) = send(&app, "GET", "/api/position", None).await;
    assert_eq!(json["price_sync_active"], false);
}

// ============================================================
// Quotes
// ============================================================

#[tokio::test]
async fn test_quote_lookup() {
    let (app, _) = build_app();
    let (status, json) = send(&app, "GET", "/api/quotes/eth", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["symbol"], "ETH");
    assert_eq!(json["price"], 1.0);
    assert_eq!(json["provider"], "FLAT");
}

#[tokio::test]
async fn test_quote_lookup_errors() {
    let (app, _) = build_app();

    let (status, json) = send(&app, "GET", "/api/quotes/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("NOPE"));

    let (status, _) = send(&app, "GET", "/api/quotes/down", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}
