// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Retrieval and normalization of token metadata from the indexing API.

use std::time::Duration;

use async_trait::async_trait;
use dissolve_base::{data_types::Token, ipfs};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Error;

/// A token as returned by the indexing API, before normalization.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNft {
    pub token_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<NftImage>,
    #[serde(default)]
    pub raw: Option<RawData>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftImage {
    #[serde(default)]
    pub cached_url: Option<String>,
    #[serde(default)]
    pub original_url: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawData {
    #[serde(default)]
    pub metadata: Option<RawMetadata>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetadata {
    #[serde(default)]
    pub image: Option<String>,
}

/// The response to an owner query.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedNfts {
    #[serde(default)]
    pub owned_nfts: Vec<RawNft>,
    #[serde(default)]
    pub total_count: u64,
}

/// The indexing API, treated as best-effort.
#[async_trait]
pub trait NftIndexer: Send + Sync {
    /// The owner's token list for one collection, with metadata.
    async fn nfts_for_owner(&self, owner: &str, contract: &str) -> Result<OwnedNfts, Error>;

    /// Per-token metadata; `force_refresh` busts the indexer's cache.
    async fn nft_metadata(
        &self,
        contract: &str,
        token_id: u64,
        force_refresh: bool,
    ) -> Result<RawNft, Error>;
}

/// A client for the Alchemy NFT API (v3).
pub struct AlchemyClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AlchemyClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, Error> {
        let client = reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(AlchemyClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, &str)],
    ) -> Result<T, Error> {
        let url = format!("{}/nft/v3/{}/{}", self.base_url, self.api_key, method);
        let response = self.client.get(url).query(query).send().await?;
        if !response.status().is_success() {
            return Err(Error::Indexer(format!(
                "{} returned {}",
                method,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl NftIndexer for AlchemyClient {
    async fn nfts_for_owner(&self, owner: &str, contract: &str) -> Result<OwnedNfts, Error> {
        self.get_json(
            "getNFTsForOwner",
            &[
                ("owner", owner),
                ("contractAddresses[]", contract),
                ("withMetadata", "true"),
            ],
        )
        .await
    }

    async fn nft_metadata(
        &self,
        contract: &str,
        token_id: u64,
        force_refresh: bool,
    ) -> Result<RawNft, Error> {
        let token_id = token_id.to_string();
        self.get_json(
            "getNFTMetadata",
            &[
                ("contractAddress", contract),
                ("tokenId", token_id.as_str()),
                ("refreshCache", if force_refresh { "true" } else { "false" }),
            ],
        )
        .await
    }
}

/// Parses a token id as reported by the indexer, which may be decimal or
/// `0x`-prefixed hexadecimal.
fn parse_token_id(raw: &str) -> Option<u64> {
    if let Some(hex) = raw.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else {
        raw.parse().ok()
    }
}

/// Normalizes one raw metadata record into a [`Token`].
fn token_from_raw(token_id: u64, nft: &RawNft) -> Token {
    let name = nft
        .name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("Token #{}", token_id));
    let description = nft.description.clone().unwrap_or_default();
    let image = nft
        .image
        .as_ref()
        .and_then(|image| image.original_url.clone().or_else(|| image.cached_url.clone()))
        .or_else(|| {
            nft.raw
                .as_ref()
                .and_then(|raw| raw.metadata.as_ref())
                .and_then(|metadata| metadata.image.clone())
        })
        .unwrap_or_default();
    let image = ipfs::to_gateway_url(&image);
    let revealed = !name.is_empty() && !description.is_empty() && !image.is_empty();
    Token {
        token_id,
        name,
        description,
        image,
        revealed,
    }
}

/// Fetches the owner's tokens and returns them sorted by ascending token id.
///
/// Each token gets one cache-busting metadata refresh; a per-token failure
/// degrades that token to the data of the initial owner query rather than
/// failing the whole fetch.
pub async fn collect_tokens(
    indexer: &dyn NftIndexer,
    owner: &str,
    contract: &str,
) -> Result<Vec<Token>, Error> {
    let response = indexer.nfts_for_owner(owner, contract).await?;
    debug!(owner, count = response.owned_nfts.len(), "fetched owned tokens");
    let lookups = response.owned_nfts.iter().map(|nft| async move {
        let token_id = parse_token_id(&nft.token_id)?;
        match indexer.nft_metadata(contract, token_id, true).await {
            Ok(fresh) => Some(token_from_raw(token_id, &fresh)),
            Err(error) => {
                warn!(token_id, %error, "metadata refresh failed, using initial data");
                Some(token_from_raw(token_id, nft))
            }
        }
    });
    let mut tokens: Vec<Token> = join_all(lookups).await.into_iter().flatten().collect();
    tokens.sort_unstable_by_key(|token| token.token_id);
    Ok(tokens)
}
