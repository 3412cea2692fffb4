// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy::{
    network::EthereumWallet,
    providers::{Provider, ProviderBuilder, RootProvider},
    transports::http::{reqwest::Client, Http},
};
use alloy_signer_local::PrivateKeySigner;
use dissolve_base::contracts::ContractAddresses;
use url::Url;

use crate::{client::DissolutionClient, common::ChainError};

pub type HttpProvider = RootProvider<Http<Client>>;

impl DissolutionClient<HttpProvider> {
    /// Connects to an existing Ethereum node for read-only queries.
    pub fn new(url: &str, addresses: &ContractAddresses) -> Result<Self, ChainError> {
        let rpc_url = Url::parse(url)?;
        let provider = ProviderBuilder::new().on_http(rpc_url);
        DissolutionClient::from_parts(provider, addresses, false)
    }
}

/// Connects to an existing Ethereum node with a local signing key, enabling
/// the `registerNFTs` write call.
pub fn connect_with_signer(
    url: &str,
    signing_key: &str,
    addresses: &ContractAddresses,
) -> Result<DissolutionClient<impl Provider<Http<Client>> + Clone + Send + Sync + 'static>, ChainError>
{
    let signer = signing_key.parse::<PrivateKeySigner>()?;
    let wallet = EthereumWallet::from(signer);
    let rpc_url = Url::parse(url)?;
    let provider = ProviderBuilder::new()
        .with_recommended_fillers()
        .wallet(wallet)
        .on_http(rpc_url);
    DissolutionClient::from_parts(provider, addresses, true)
}
