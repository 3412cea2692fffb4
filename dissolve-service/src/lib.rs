// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The JSON API of the dissolution registration service: window status, the
//! holder's token grid, selection, and the register action.

use std::{sync::Arc, time::Duration};

use async_lock::Mutex;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use dissolve_base::{
    data_types::{
        format_time_left, PendingTransaction, RedemptionInfo, RegistrationPhase, Token, UserInfo,
    },
    ipfs::GatewayCursor,
};
use dissolve_client::{
    indexer::{collect_tokens, NftIndexer},
    session::{Notice, RegisterOutcome, Session, SessionView, SubmittedRegistration},
    tracker::PendingTransactions,
    Error,
};
use dissolve_ethereum::{
    client::DissolutionQueries,
    common::{normalize_address, ReceiptOutcome},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

#[cfg(test)]
mod tests;

/// The shared state behind every handler.
#[derive(Clone)]
pub struct ServiceState {
    pub chain: Arc<dyn DissolutionQueries>,
    pub indexer: Arc<dyn NftIndexer>,
    pub tracker: PendingTransactions,
    pub session: Arc<Mutex<Session>>,
    /// The collection contract address, for indexer queries.
    pub collection: String,
}

pub fn router(state: ServiceState) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/nfts", get(nfts_for_owner))
        .route("/api/owner", get(check_owner))
        .route("/api/redeemed", get(check_redeemed))
        .route("/api/pending", get(check_pending))
        .route("/api/image-sources", get(image_sources))
        .route("/api/transactions", get(transactions))
        .route("/api/session", get(session_view))
        .route("/api/session/address", post(set_address))
        .route("/api/session/refresh", post(refresh_session))
        .route("/api/select", post(select))
        .route("/api/register", post(register))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// A client error, rendered as a JSON body with an appropriate status code.
struct ServiceError(Error);

impl From<Error> for ServiceError {
    fn from(error: Error) -> Self {
        ServiceError(error)
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        use dissolve_ethereum::common::ChainError;
        let status = match &self.0 {
            Error::EmptySelection | Error::RegistrationClosed | Error::SubmissionInFlight => {
                StatusCode::CONFLICT
            }
            Error::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            Error::Chain(ChainError::MissingSigner) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    user: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub info: RedemptionInfo,
    pub phase: RegistrationPhase,
    pub time_left: u64,
    pub time_left_display: String,
    /// The live per-token payout rate, in wei.
    pub eth_per_nft: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
}

/// The registration window, fail-closed: a read failure degrades to the
/// zeroed window (phase `not_started`) instead of an error response.
async fn status(
    State(state): State<ServiceState>,
    Query(query): Query<StatusQuery>,
) -> Json<StatusResponse> {
    let info = match state.chain.get_redemption_info().await {
        Ok(info) => info,
        Err(error) => {
            warn!(%error, "redemption info unavailable");
            RedemptionInfo::default()
        }
    };
    let time_left = if info.registrations_open {
        state.chain.time_until_close().await.unwrap_or_else(|error| {
            warn!(%error, "countdown unavailable");
            0
        })
    } else {
        0
    };
    let eth_per_nft = match state.chain.eth_per_nft().await {
        Ok(rate) => rate,
        Err(error) => {
            warn!(%error, "payout rate unavailable");
            info.eth_per_nft
        }
    };
    let user = match &query.user {
        None => None,
        Some(address) => match state.chain.get_user_info(address).await {
            Ok(user) => Some(user),
            Err(error) => {
                warn!(%error, "user info unavailable");
                None
            }
        },
    };
    Json(StatusResponse {
        info,
        phase: info.phase(),
        time_left,
        time_left_display: format_time_left(time_left),
        eth_per_nft,
        user,
    })
}

#[derive(Debug, Deserialize)]
struct OwnerQuery {
    owner: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NftsResponse {
    pub tokens: Vec<Token>,
    pub total_count: usize,
    /// Set when the fetch failed; the token list is then empty and the
    /// caller should offer a retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn nfts_for_owner(
    State(state): State<ServiceState>,
    Query(query): Query<OwnerQuery>,
) -> Json<NftsResponse> {
    match collect_tokens(&*state.indexer, &query.owner, &state.collection).await {
        Ok(tokens) => Json(NftsResponse {
            total_count: tokens.len(),
            tokens,
            error: None,
        }),
        Err(error) => {
            warn!(owner = query.owner, %error, "token fetch failed");
            Json(NftsResponse {
                error: Some(error.to_string()),
                ..NftsResponse::default()
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenOwnerQuery {
    token_id: u64,
    owner: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OwnershipResponse {
    pub token_id: u64,
    pub is_owner: bool,
}

/// Ownership check against the collection contract; a failed read (burned or
/// nonexistent token) reports `false`.
async fn check_owner(
    State(state): State<ServiceState>,
    Query(query): Query<TokenOwnerQuery>,
) -> Json<OwnershipResponse> {
    let is_owner = match state.chain.owner_of(query.token_id).await {
        Ok(owner) => owner.eq_ignore_ascii_case(&query.owner),
        Err(error) => {
            debug!(token_id = query.token_id, %error, "ownerOf failed");
            false
        }
    };
    Json(OwnershipResponse {
        token_id: query.token_id,
        is_owner,
    })
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token_id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RedeemedResponse {
    pub token_id: u64,
    pub redeemed: bool,
}

async fn check_redeemed(
    State(state): State<ServiceState>,
    Query(query): Query<TokenQuery>,
) -> Json<RedeemedResponse> {
    let redeemed = match state.chain.is_token_redeemed(query.token_id).await {
        Ok(redeemed) => redeemed,
        Err(error) => {
            debug!(token_id = query.token_id, %error, "isTokenRedeemed failed");
            false
        }
    };
    Json(RedeemedResponse {
        token_id: query.token_id,
        redeemed,
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PendingResponse {
    pub token_id: u64,
    pub pending: bool,
}

async fn check_pending(
    State(state): State<ServiceState>,
    Query(query): Query<TokenQuery>,
) -> Json<PendingResponse> {
    Json(PendingResponse {
        token_id: query.token_id,
        pending: state.tracker.is_pending_token(query.token_id).await,
    })
}

#[derive(Debug, Deserialize)]
struct ImageQuery {
    reference: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageSourcesResponse {
    /// Candidate URLs in the order a client should try them.
    pub sources: Vec<String>,
}

async fn image_sources(Query(query): Query<ImageQuery>) -> Json<ImageSourcesResponse> {
    let sources = if query.reference.starts_with("http") && !query.reference.contains("/ipfs/") {
        vec![query.reference]
    } else {
        let mut cursor = GatewayCursor::new(query.reference);
        let mut urls = Vec::new();
        while let Some(url) = cursor.current_url() {
            urls.push(url);
            cursor.advance();
        }
        urls
    };
    Json(ImageSourcesResponse { sources })
}

async fn transactions(State(state): State<ServiceState>) -> Json<Vec<PendingTransaction>> {
    Json(state.tracker.snapshot().await)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub view: SessionView,
    pub pending_transactions: Vec<PendingTransaction>,
}

async fn session_view(State(state): State<ServiceState>) -> Json<SessionResponse> {
    let session = state.session.lock().await;
    Json(SessionResponse {
        view: session.view(),
        pending_transactions: state.tracker.snapshot().await,
    })
}

#[derive(Debug, Deserialize)]
struct SetAddressRequest {
    address: Option<String>,
}

fn validate_address(address: &str) -> Result<String, Error> {
    normalize_address(address).map_err(|_| Error::InvalidAddress(address.to_string()))
}

async fn set_address(
    State(state): State<ServiceState>,
    Json(request): Json<SetAddressRequest>,
) -> Result<Json<SessionResponse>, ServiceError> {
    let address = match &request.address {
        Some(address) => Some(validate_address(address)?),
        None => None,
    };
    let mut session = state.session.lock().await;
    session.set_address(address);
    session.refresh_status().await;
    if let Err(error) = session.refresh_holdings().await {
        warn!(%error, "holdings fetch failed for new address");
    }
    Ok(Json(SessionResponse {
        view: session.view(),
        pending_transactions: state.tracker.snapshot().await,
    }))
}

async fn refresh_session(State(state): State<ServiceState>) -> Json<SessionResponse> {
    let mut session = state.session.lock().await;
    session.refresh_status().await;
    if let Err(error) = session.refresh_holdings().await {
        warn!(%error, "holdings refresh failed");
    }
    Json(SessionResponse {
        view: session.view(),
        pending_transactions: state.tracker.snapshot().await,
    })
}

#[derive(Debug, Deserialize)]
struct SelectRequest {
    token_id: u64,
}

async fn select(
    State(state): State<ServiceState>,
    Json(request): Json<SelectRequest>,
) -> Json<Notice> {
    let mut session = state.session.lock().await;
    Json(session.toggle(request.token_id))
}

/// Submits the selection and reports the receipt outcome. The session lock
/// is released while the receipt is awaited, so the other session endpoints
/// stay servable during a slow confirmation; a second submission in that
/// window is refused.
async fn register(
    State(state): State<ServiceState>,
) -> Result<Json<RegisterOutcome>, ServiceError> {
    let SubmittedRegistration {
        hash,
        token_ids,
        watch,
    } = {
        let mut session = state.session.lock().await;
        session.begin_registration().await?
    };
    let outcome = watch.await.unwrap_or(ReceiptOutcome::TimedOut);
    let mut session = state.session.lock().await;
    Ok(Json(
        session.complete_registration(outcome, hash, token_ids).await,
    ))
}

/// Watches the dissolution contract for `NFTsRegistered` events affecting
/// the session address and refreshes the session when one is seen.
pub async fn watch_registration_events(state: ServiceState, poll_interval: Duration) {
    let mut last_block = match state.chain.block_number().await {
        Ok(block) => block,
        Err(error) => {
            warn!(%error, "initial block number unavailable, starting from 0");
            0
        }
    };
    loop {
        tokio::time::sleep(poll_interval).await;
        let events = match state.chain.registration_events_since(last_block + 1).await {
            Ok(events) => events,
            Err(error) => {
                debug!(%error, "event query failed");
                continue;
            }
        };
        for event in &events {
            last_block = last_block.max(event.block_number);
        }
        let address = {
            let session = state.session.lock().await;
            session.address().map(str::to_string)
        };
        let Some(address) = address else { continue };
        if events.iter().any(|event| event.is_for(&address)) {
            info!(address, "registration event observed, refreshing session");
            let mut session = state.session.lock().await;
            session.refresh_status().await;
            if let Err(error) = session.refresh_holdings().await {
                warn!(%error, "holdings refresh after event failed");
            }
        }
    }
}
