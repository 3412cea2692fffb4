// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{sync::Arc, time::Duration};

use anyhow::Context as _;
use async_lock::Mutex;
use clap::Parser;
use dissolve_base::contracts::{ContractAddresses, Network};
use dissolve_client::{
    config::ClientConfig,
    indexer::{AlchemyClient, NftIndexer},
    session::Session,
    tracker::PendingTransactions,
};
use dissolve_ethereum::{
    client::{DissolutionClient, DissolutionQueries},
    provider::connect_with_signer,
};
use dissolve_service::{router, watch_registration_events, ServiceState};
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "dissolve-service",
    about = "Run the JSON service that lets collection holders view their tokens \
             and register them for dissolution before the deadline"
)]
struct ServiceOptions {
    /// The port on which to run the server.
    #[arg(long, default_value = "8080")]
    port: u16,

    /// The Ethereum network to target.
    #[arg(long, default_value = "mainnet")]
    network: Network,

    /// The Ethereum node endpoint.
    #[arg(long, env = "DISSOLVE_RPC_URL", default_value = "http://localhost:8545")]
    rpc_url: String,

    /// The base URL of the indexing API.
    #[arg(long, default_value = "https://eth-mainnet.g.alchemy.com")]
    indexer_url: String,

    /// The indexing API key. Kept server-side; never exposed to clients.
    #[arg(long, env = "ALCHEMY_API_KEY", default_value = "")]
    indexer_api_key: String,

    /// A hex-encoded signing key enabling the register action. Without it
    /// the service is a read-only viewer.
    #[arg(long, env = "DISSOLVE_SIGNING_KEY")]
    signing_key: Option<String>,

    /// The wallet address the session starts on. Defaults to the signing
    /// key's address when one is configured.
    #[arg(long)]
    session_address: Option<String>,

    /// Overrides the collection contract address for the chosen network.
    #[arg(long)]
    collection: Option<String>,

    /// Overrides the dissolution contract address for the chosen network.
    #[arg(long)]
    dissolution: Option<String>,

    /// Ceiling, in seconds, on waiting for a transaction receipt before
    /// reporting the submission as still pending.
    #[arg(long, default_value = "180")]
    receipt_timeout: u64,

    /// How often, in seconds, to poll for registration events.
    #[arg(long, default_value = "15")]
    event_poll: u64,
}

impl ServiceOptions {
    fn addresses(&self) -> ContractAddresses {
        let mut addresses = ContractAddresses::for_network(self.network);
        if let Some(collection) = &self.collection {
            addresses.collection = collection.clone();
        }
        if let Some(dissolution) = &self.dissolution {
            addresses.dissolution = dissolution.clone();
        }
        addresses
    }

    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            network: self.network,
            rpc_url: self.rpc_url.clone(),
            indexer_url: self.indexer_url.clone(),
            indexer_api_key: self.indexer_api_key.clone(),
            addresses: self.addresses(),
            receipt_timeout: Duration::from_secs(self.receipt_timeout),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dissolve_base::tracing::init("dissolve-service");
    let options = ServiceOptions::parse();
    let config = options.client_config();

    if config.indexer_api_key.is_empty() {
        warn!("no indexing API key configured; token fetches will degrade to empty lists");
    }

    let chain: Arc<dyn DissolutionQueries> = match &options.signing_key {
        Some(key) => Arc::new(
            connect_with_signer(&config.rpc_url, key, &config.addresses)
                .context("failed to connect with signing key")?,
        ),
        None => Arc::new(
            DissolutionClient::new(&config.rpc_url, &config.addresses)
                .context("failed to connect to the Ethereum node")?,
        ),
    };

    let session_address = match (&options.session_address, &options.signing_key) {
        (Some(address), _) => Some(address.clone()),
        (None, Some(key)) => {
            let signer = key
                .parse::<alloy_signer_local::PrivateKeySigner>()
                .context("invalid signing key")?;
            Some(format!("{:?}", signer.address()))
        }
        (None, None) => None,
    };

    let indexer: Arc<dyn NftIndexer> =
        Arc::new(AlchemyClient::new(&config.indexer_url, &config.indexer_api_key)?);
    let tracker = PendingTransactions::new();
    let mut session = Session::new(
        chain.clone(),
        indexer.clone(),
        tracker.clone(),
        config.session_config(),
    );
    session.set_address(session_address.clone());
    session.refresh_status().await;
    if let Err(error) = session.refresh_holdings().await {
        warn!(%error, "initial holdings fetch failed");
    }

    let state = ServiceState {
        chain,
        indexer,
        tracker,
        session: Arc::new(Mutex::new(session)),
        collection: config.addresses.collection.clone(),
    };

    tokio::spawn(watch_registration_events(
        state.clone(),
        Duration::from_secs(options.event_poll),
    ));

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", options.port))
        .await
        .context("failed to bind service port")?;
    info!(
        port = options.port,
        network = %config.network,
        address = session_address.as_deref().unwrap_or("<none>"),
        "dissolution registration service listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for the shutdown signal");
    }
}
