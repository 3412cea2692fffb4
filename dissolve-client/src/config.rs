// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use dissolve_base::contracts::{ContractAddresses, Network};

/// Everything the client layer needs to reach its collaborators.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub network: Network,
    pub rpc_url: String,
    pub indexer_url: String,
    pub indexer_api_key: String,
    pub addresses: ContractAddresses,
    pub receipt_timeout: Duration,
}

impl ClientConfig {
    pub fn for_network(network: Network) -> Self {
        ClientConfig {
            network,
            rpc_url: "http://localhost:8545".to_string(),
            indexer_url: "https://eth-mainnet.g.alchemy.com".to_string(),
            indexer_api_key: String::new(),
            addresses: ContractAddresses::for_network(network),
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            collection: self.addresses.collection.clone(),
            receipt_timeout: self.receipt_timeout,
        }
    }
}

/// The ceiling on receipt polling before a submission is reported as still
/// pending.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(180);

/// The subset of the configuration a [`crate::session::Session`] keeps.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub collection: String,
    pub receipt_timeout: Duration,
}
