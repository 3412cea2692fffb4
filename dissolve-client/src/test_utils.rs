// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
    time::Duration,
};

use async_lock::Mutex;
use async_trait::async_trait;
use dissolve_base::data_types::{RedemptionInfo, UserInfo};
use dissolve_ethereum::{
    client::DissolutionQueries,
    common::{ChainError, ReceiptOutcome, RegistrationEvent},
};

use crate::{
    indexer::{NftImage, NftIndexer, OwnedNfts, RawNft},
    Error,
};

/// Builds a raw indexer record the way the indexing API reports it.
pub fn raw_nft(
    token_id: u64,
    name: Option<&str>,
    description: Option<&str>,
    image: Option<&str>,
) -> RawNft {
    RawNft {
        token_id: token_id.to_string(),
        name: name.map(str::to_string),
        description: description.map(str::to_string),
        image: image.map(|url| NftImage {
            cached_url: None,
            original_url: Some(url.to_string()),
        }),
        raw: None,
    }
}

/// A configurable in-memory stand-in for the deployed contracts.
#[derive(Default)]
pub struct FakeChain {
    info: Mutex<RedemptionInfo>,
    time_left: Mutex<u64>,
    registered: Mutex<BTreeMap<String, Vec<u64>>>,
    redeemed: Mutex<BTreeSet<u64>>,
    owners: Mutex<BTreeMap<u64, String>>,
    events: Mutex<Vec<RegistrationEvent>>,
    submissions: Mutex<Vec<Vec<u64>>>,
    receipt_outcome: Mutex<Option<ReceiptOutcome>>,
    receipt_delay: Mutex<Option<Duration>>,
    fail_reads: Mutex<bool>,
    fail_submit: Mutex<bool>,
    info_reads: AtomicUsize,
    registered_reads: AtomicUsize,
    block: AtomicU64,
}

impl FakeChain {
    pub async fn set_registrations_open(&self, open: bool) {
        let mut info = self.info.lock().await;
        info.registrations_open = open;
    }

    pub async fn set_info(&self, new_info: RedemptionInfo) {
        *self.info.lock().await = new_info;
    }

    pub async fn set_time_left(&self, seconds: u64) {
        *self.time_left.lock().await = seconds;
    }

    pub async fn set_registered(&self, user: &str, token_ids: Vec<u64>) {
        self.registered
            .lock()
            .await
            .insert(user.to_ascii_lowercase(), token_ids);
    }

    pub async fn set_redeemed(&self, token_id: u64) {
        self.redeemed.lock().await.insert(token_id);
    }

    pub async fn set_owner(&self, token_id: u64, owner: &str) {
        self.owners
            .lock()
            .await
            .insert(token_id, owner.to_string());
    }

    pub async fn push_event(&self, event: RegistrationEvent) {
        self.events.lock().await.push(event);
    }

    pub async fn set_receipt_outcome(&self, outcome: ReceiptOutcome) {
        *self.receipt_outcome.lock().await = Some(outcome);
    }

    /// Makes `wait_for_receipt` take this long before resolving.
    pub async fn set_receipt_delay(&self, delay: Duration) {
        *self.receipt_delay.lock().await = Some(delay);
    }

    pub async fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().await = fail;
    }

    pub async fn set_fail_submit(&self, fail: bool) {
        *self.fail_submit.lock().await = fail;
    }

    pub fn set_block(&self, block: u64) {
        self.block.store(block, Ordering::SeqCst);
    }

    pub async fn submissions(&self) -> Vec<Vec<u64>> {
        self.submissions.lock().await.clone()
    }

    pub fn info_reads(&self) -> usize {
        self.info_reads.load(Ordering::SeqCst)
    }

    pub fn registered_reads(&self) -> usize {
        self.registered_reads.load(Ordering::SeqCst)
    }

    pub fn reset_read_counts(&self) {
        self.info_reads.store(0, Ordering::SeqCst);
        self.registered_reads.store(0, Ordering::SeqCst);
    }

    async fn check_reads(&self) -> Result<(), ChainError> {
        if *self.fail_reads.lock().await {
            Err(ChainError::Unavailable("reads disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DissolutionQueries for FakeChain {
    async fn get_redemption_info(&self) -> Result<RedemptionInfo, ChainError> {
        self.info_reads.fetch_add(1, Ordering::SeqCst);
        self.check_reads().await?;
        Ok(*self.info.lock().await)
    }

    async fn get_user_info(&self, user: &str) -> Result<UserInfo, ChainError> {
        self.check_reads().await?;
        let registered = self.registered.lock().await;
        let count = registered
            .get(&user.to_ascii_lowercase())
            .map_or(0, |ids| ids.len() as u64);
        Ok(UserInfo {
            nfts_registered: count,
            ..UserInfo::default()
        })
    }

    async fn get_user_token_ids(&self, user: &str) -> Result<Vec<u64>, ChainError> {
        self.registered_reads.fetch_add(1, Ordering::SeqCst);
        self.check_reads().await?;
        let registered = self.registered.lock().await;
        Ok(registered
            .get(&user.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn is_token_redeemed(&self, token_id: u64) -> Result<bool, ChainError> {
        self.check_reads().await?;
        Ok(self.redeemed.lock().await.contains(&token_id))
    }

    async fn time_until_close(&self) -> Result<u64, ChainError> {
        self.check_reads().await?;
        Ok(*self.time_left.lock().await)
    }

    async fn eth_per_nft(&self) -> Result<u128, ChainError> {
        self.check_reads().await?;
        Ok(self.info.lock().await.eth_per_nft)
    }

    async fn owner_of(&self, token_id: u64) -> Result<String, ChainError> {
        self.check_reads().await?;
        self.owners
            .lock()
            .await
            .get(&token_id)
            .cloned()
            .ok_or_else(|| ChainError::Unavailable(format!("token {} does not exist", token_id)))
    }

    async fn register_nfts(&self, token_ids: &[u64]) -> Result<String, ChainError> {
        if *self.fail_submit.lock().await {
            return Err(ChainError::Unavailable("submission rejected".to_string()));
        }
        let mut submissions = self.submissions.lock().await;
        submissions.push(token_ids.to_vec());
        Ok(format!("0x{:064x}", submissions.len()))
    }

    async fn wait_for_receipt(
        &self,
        _tx_hash: &str,
        timeout: Duration,
    ) -> Result<ReceiptOutcome, ChainError> {
        if let Some(delay) = *self.receipt_delay.lock().await {
            if delay >= timeout {
                tokio::time::sleep(timeout).await;
                return Ok(ReceiptOutcome::TimedOut);
            }
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .receipt_outcome
            .lock()
            .await
            .unwrap_or(ReceiptOutcome::Confirmed))
    }

    async fn registration_events_since(
        &self,
        starting_block: u64,
    ) -> Result<Vec<RegistrationEvent>, ChainError> {
        self.check_reads().await?;
        let events = self.events.lock().await;
        Ok(events
            .iter()
            .filter(|event| event.block_number >= starting_block)
            .cloned()
            .collect())
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.check_reads().await?;
        Ok(self.block.load(Ordering::SeqCst))
    }
}

/// A configurable in-memory stand-in for the indexing API.
#[derive(Default)]
pub struct FakeIndexer {
    owned: std::sync::Mutex<Vec<RawNft>>,
    metadata: std::sync::Mutex<BTreeMap<u64, RawNft>>,
    fail_metadata_for: std::sync::Mutex<BTreeSet<u64>>,
    fail_owner_query: std::sync::Mutex<bool>,
}

impl FakeIndexer {
    pub fn add_owned(&self, nft: RawNft) {
        self.owned.lock().unwrap().push(nft);
    }

    pub fn set_metadata(&self, nft: RawNft) {
        let token_id = nft.token_id.parse().unwrap();
        self.metadata.lock().unwrap().insert(token_id, nft);
    }

    pub fn fail_metadata_for(&self, token_id: u64) {
        self.fail_metadata_for.lock().unwrap().insert(token_id);
    }

    pub fn fail_owner_query(&self) {
        *self.fail_owner_query.lock().unwrap() = true;
    }
}

#[async_trait]
impl NftIndexer for FakeIndexer {
    async fn nfts_for_owner(&self, _owner: &str, _contract: &str) -> Result<OwnedNfts, Error> {
        if *self.fail_owner_query.lock().unwrap() {
            return Err(Error::Indexer("owner query failed".to_string()));
        }
        let owned = self.owned.lock().unwrap().clone();
        Ok(OwnedNfts {
            total_count: owned.len() as u64,
            owned_nfts: owned,
        })
    }

    async fn nft_metadata(
        &self,
        _contract: &str,
        token_id: u64,
        _force_refresh: bool,
    ) -> Result<RawNft, Error> {
        if self.fail_metadata_for.lock().unwrap().contains(&token_id) {
            return Err(Error::Indexer(format!(
                "metadata for token {} unavailable",
                token_id
            )));
        }
        self.metadata
            .lock()
            .unwrap()
            .get(&token_id)
            .cloned()
            .ok_or_else(|| Error::Indexer(format!("unknown token {}", token_id)))
    }
}
