// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{sync::Arc, time::Duration};

use async_lock::Mutex;
use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use dissolve_client::{
    config::SessionConfig,
    session::Session,
    test_utils::{raw_nft, FakeChain, FakeIndexer},
    tracker::PendingTransactions,
};
use http_body_util::BodyExt as _;
use serde_json::Value;
use tower::ServiceExt as _;

use super::*;

const OWNER: &str = "0x00000000000000000000000000000000000000aa";
const COLLECTION: &str = "0x228d11Ae974De7f92c16A1F621341759c56D039D";

struct TestService {
    chain: Arc<FakeChain>,
    indexer: Arc<FakeIndexer>,
    tracker: PendingTransactions,
    app: Router,
}

fn test_service() -> TestService {
    let chain = Arc::new(FakeChain::default());
    let indexer = Arc::new(FakeIndexer::default());
    let tracker = PendingTransactions::new();
    let config = SessionConfig {
        collection: COLLECTION.to_string(),
        receipt_timeout: Duration::from_secs(60),
    };
    let session = Session::new(
        chain.clone(),
        indexer.clone(),
        tracker.clone(),
        config,
    );
    let state = ServiceState {
        chain: chain.clone(),
        indexer: indexer.clone(),
        tracker: tracker.clone(),
        session: Arc::new(Mutex::new(session)),
        collection: COLLECTION.to_string(),
    };
    TestService {
        chain,
        indexer,
        tracker,
        app: router(state),
    }
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn status_fails_closed_when_the_contract_is_unreachable() {
    let service = test_service();
    service.chain.set_fail_reads(true).await;

    let (status, body) = get_json(&service.app, "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "not_started");
    assert_eq!(body["info"]["registrations_open"], false);
    assert_eq!(body["time_left"], 0);
    assert_eq!(body["eth_per_nft"], 0);
}

#[tokio::test]
async fn status_reports_the_open_window_and_user_info() {
    let service = test_service();
    service
        .chain
        .set_info(RedemptionInfo {
            eth_per_nft: 1_000,
            ..RedemptionInfo::default()
        })
        .await;
    service.chain.set_registrations_open(true).await;
    service.chain.set_time_left(3 * 86_400).await;
    service.chain.set_registered(OWNER, vec![1, 2]).await;

    let uri = format!("/api/status?user={}", OWNER);
    let (status, body) = get_json(&service.app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "open");
    assert_eq!(body["time_left_display"], "3 days");
    assert_eq!(body["eth_per_nft"], 1_000);
    assert_eq!(body["user"]["nfts_registered"], 2);
}

#[tokio::test]
async fn empty_wallet_yields_an_empty_token_list() {
    let service = test_service();
    let uri = format!("/api/nfts?owner={}", OWNER);
    let (status, body) = get_json(&service.app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokens"], serde_json::json!([]));
    assert_eq!(body["total_count"], 0);
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn indexer_failure_degrades_to_an_empty_list_with_an_error_notice() {
    let service = test_service();
    service.indexer.fail_owner_query();

    let uri = format!("/api/nfts?owner={}", OWNER);
    let (status, body) = get_json(&service.app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokens"], serde_json::json!([]));
    assert!(body["error"].as_str().unwrap().contains("owner query"));
}

#[tokio::test]
async fn ownership_and_redeemed_checks_fail_closed() {
    let service = test_service();
    service.chain.set_owner(5, OWNER).await;
    service.chain.set_redeemed(5).await;

    let uri = format!("/api/owner?token_id=5&owner={}", OWNER);
    let (_, body) = get_json(&service.app, &uri).await;
    assert_eq!(body["is_owner"], true);

    // Nonexistent token: the read fails, the answer is false.
    let uri = format!("/api/owner?token_id=9&owner={}", OWNER);
    let (status, body) = get_json(&service.app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_owner"], false);

    let (_, body) = get_json(&service.app, "/api/redeemed?token_id=5").await;
    assert_eq!(body["redeemed"], true);

    service.chain.set_fail_reads(true).await;
    let (status, body) = get_json(&service.app, "/api/redeemed?token_id=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["redeemed"], false);
}

#[tokio::test]
async fn selecting_while_the_window_is_closed_changes_nothing() {
    let service = test_service();
    let (_, _) = post_json(
        &service.app,
        "/api/session/address",
        serde_json::json!({ "address": OWNER }),
    )
    .await;

    let (status, notice) =
        post_json(&service.app, "/api/select", serde_json::json!({ "token_id": 1 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(notice["kind"], "window_closed");

    let (_, session) = get_json(&service.app, "/api/session").await;
    assert_eq!(session["selection"], serde_json::json!([]));
}

#[tokio::test]
async fn selection_and_registration_round_trip() {
    let service = test_service();
    service.chain.set_registrations_open(true).await;
    for id in [1, 2] {
        service
            .indexer
            .add_owned(raw_nft(id, Some("n"), Some("d"), Some("i")));
        service
            .indexer
            .set_metadata(raw_nft(id, Some("n"), Some("d"), Some("i")));
    }
    post_json(
        &service.app,
        "/api/session/address",
        serde_json::json!({ "address": OWNER }),
    )
    .await;

    let (_, notice) =
        post_json(&service.app, "/api/select", serde_json::json!({ "token_id": 1 })).await;
    assert_eq!(notice["kind"], "added");

    let (status, outcome) = post_json(&service.app, "/api/register", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "confirmed");
    assert_eq!(outcome["token_ids"], serde_json::json!([1]));
    assert_eq!(service.chain.submissions().await, vec![vec![1]]);

    let (_, session) = get_json(&service.app, "/api/session").await;
    assert_eq!(session["selection"], serde_json::json!([]));
}

#[tokio::test(start_paused = true)]
async fn session_endpoints_stay_responsive_during_a_slow_receipt() {
    let service = test_service();
    service.chain.set_registrations_open(true).await;
    service
        .indexer
        .add_owned(raw_nft(1, Some("n"), Some("d"), Some("i")));
    service
        .indexer
        .set_metadata(raw_nft(1, Some("n"), Some("d"), Some("i")));
    // Longer than the 60s receipt ceiling: the watch resolves as timed out.
    service.chain.set_receipt_delay(Duration::from_secs(300)).await;
    post_json(
        &service.app,
        "/api/session/address",
        serde_json::json!({ "address": OWNER }),
    )
    .await;
    post_json(&service.app, "/api/select", serde_json::json!({ "token_id": 1 })).await;

    let app = service.app.clone();
    let register =
        tokio::spawn(async move { post_json(&app, "/api/register", Value::Null).await });
    while !service.tracker.is_pending_token(1).await {
        tokio::task::yield_now().await;
    }

    // The session answers while the receipt is outstanding.
    let (status, session) = get_json(&service.app, "/api/session").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["selection"], serde_json::json!([1]));

    // A second submission in that window is refused.
    let (status, body) = post_json(&service.app, "/api/register", Value::Null).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("in flight"));

    let (status, outcome) = register.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "still_pending");
    // The selection survives a still-pending submission.
    let (_, session) = get_json(&service.app, "/api/session").await;
    assert_eq!(session["selection"], serde_json::json!([1]));
}

#[tokio::test]
async fn registering_an_empty_selection_is_a_conflict() {
    let service = test_service();
    service.chain.set_registrations_open(true).await;
    post_json(
        &service.app,
        "/api/session/address",
        serde_json::json!({ "address": OWNER }),
    )
    .await;

    let (status, body) = post_json(&service.app, "/api/register", Value::Null).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("selected"));
}

#[tokio::test]
async fn malformed_addresses_are_rejected() {
    let service = test_service();
    let (status, body) = post_json(
        &service.app,
        "/api/session/address",
        serde_json::json!({ "address": "not-an-address" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid address"));
}

#[tokio::test]
async fn image_sources_list_every_gateway_for_ipfs_references() {
    let service = test_service();
    let (status, body) =
        get_json(&service.app, "/api/image-sources?reference=ipfs://bafy123/1.png").await;
    assert_eq!(status, StatusCode::OK);
    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), dissolve_base::ipfs::DEFAULT_GATEWAYS.len());
    assert_eq!(sources[0], "https://cloudflare-ipfs.com/ipfs/bafy123/1.png");
    assert_eq!(sources[1], "https://ipfs.io/ipfs/bafy123/1.png");

    // Plain HTTP references resolve to themselves only.
    let (_, body) =
        get_json(&service.app, "/api/image-sources?reference=https://host/a.png").await;
    assert_eq!(
        body["sources"],
        serde_json::json!(["https://host/a.png"])
    );
}

#[tokio::test]
async fn pending_reflects_the_tracker() {
    let service = test_service();
    service
        .tracker
        .add("0xabc".to_string(), vec![4])
        .await;

    let (_, body) = get_json(&service.app, "/api/pending?token_id=4").await;
    assert_eq!(body["pending"], true);
    let (_, body) = get_json(&service.app, "/api/pending?token_id=5").await;
    assert_eq!(body["pending"], false);

    let (_, transactions) = get_json(&service.app, "/api/transactions").await;
    assert_eq!(transactions[0]["hash"], "0xabc");
    assert_eq!(transactions[0]["status"], "pending");
}
