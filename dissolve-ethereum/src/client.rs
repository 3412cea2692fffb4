// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use alloy::{
    primitives::{Address, B256, U256},
    providers::Provider,
    sol,
    transports::http::{reqwest::Client, Http},
};
use async_trait::async_trait;
use dissolve_base::{
    contracts::ContractAddresses,
    data_types::{RedemptionInfo, UserInfo},
};

use crate::common::{ChainError, ReceiptOutcome, RegistrationEvent};

sol! {
    #[sol(rpc)]
    contract Collection {
        function ownerOf(uint256 tokenId) external view returns (address owner);
        function tokensOfOwner(address owner) external view returns (uint256[] tokenIds);
        function totalSupply() external view returns (uint256 supply);
    }

    #[sol(rpc)]
    contract Dissolution {
        function getRedemptionInfo() external view returns (
            uint256 startTime,
            uint256 endTime,
            uint256 totalEthAvailable,
            uint256 totalNftsRegistered,
            uint256 ethPerNftRate,
            bool rateCalculated,
            bool registrationsOpen,
            bool airdropStarted
        );
        function getUserInfo(address user) external view returns (
            uint256 nftsRegistered,
            bool withdrawn,
            uint256 ethClaimable
        );
        function getUserTokenIds(address user) external view returns (uint256[] tokenIds);
        function isTokenRedeemed(uint256 tokenId) external view returns (bool redeemed);
        function timeUntilRegistrationsClose() external view returns (uint256 timeLeft);
        function ethPerNFT() external view returns (uint256 rate);
        function totalNFTsRegistered() external view returns (uint256 total);
        function registerNFTs(uint256[] tokenIds) external;
        function withdrawETH() external;
        event NFTsRegistered(address indexed user, uint256[] tokenIds, uint256 count);
        event ETHWithdrawn(address indexed user, uint256 nftCount, uint256 ethAmount);
    }
}

/// How often an unconfirmed transaction receipt is re-queried.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// The read and write operations the service issues against the deployed
/// contracts. The dissolution contract itself is a fixed, audited
/// collaborator; this is only its public interface.
#[async_trait]
pub trait DissolutionQueries: Send + Sync {
    /// Reads the global registration window.
    async fn get_redemption_info(&self) -> Result<RedemptionInfo, ChainError>;

    /// Reads the caller's registration bookkeeping.
    async fn get_user_info(&self, user: &str) -> Result<UserInfo, ChainError>;

    /// The token ids the given address has already registered.
    async fn get_user_token_ids(&self, user: &str) -> Result<Vec<u64>, ChainError>;

    async fn is_token_redeemed(&self, token_id: u64) -> Result<bool, ChainError>;

    /// Seconds until the registration window closes.
    async fn time_until_close(&self) -> Result<u64, ChainError>;

    /// The payout rate, in wei per token.
    async fn eth_per_nft(&self) -> Result<u128, ChainError>;

    /// The current owner of a collection token, `0x`-prefixed lowercase.
    async fn owner_of(&self, token_id: u64) -> Result<String, ChainError>;

    /// Submits one `registerNFTs` call carrying the full batch and returns
    /// the transaction hash as soon as the node accepts it.
    async fn register_nfts(&self, token_ids: &[u64]) -> Result<String, ChainError>;

    /// Polls for the receipt of the given transaction until it resolves or
    /// the ceiling elapses.
    async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<ReceiptOutcome, ChainError>;

    /// All `NFTsRegistered` events from the given block onwards.
    async fn registration_events_since(
        &self,
        starting_block: u64,
    ) -> Result<Vec<RegistrationEvent>, ChainError>;

    async fn block_number(&self) -> Result<u64, ChainError>;
}

/// An Ethereum provider together with the two deployed contract addresses.
pub struct DissolutionClient<M> {
    pub provider: M,
    collection: Address,
    dissolution: Address,
    has_signer: bool,
}

impl<M> DissolutionClient<M> {
    pub fn from_parts(
        provider: M,
        addresses: &ContractAddresses,
        has_signer: bool,
    ) -> Result<Self, ChainError> {
        Ok(DissolutionClient {
            provider,
            collection: addresses.collection.parse::<Address>()?,
            dissolution: addresses.dissolution.parse::<Address>()?,
            has_signer,
        })
    }
}

#[async_trait]
impl<M> DissolutionQueries for DissolutionClient<M>
where
    M: Provider<Http<Client>> + Clone + Send + Sync + 'static,
{
    async fn get_redemption_info(&self) -> Result<RedemptionInfo, ChainError> {
        let contract = Dissolution::new(self.dissolution, self.provider.clone());
        let info = contract.getRedemptionInfo().call().await?;
        Ok(RedemptionInfo {
            start_time: info.startTime.saturating_to(),
            end_time: info.endTime.saturating_to(),
            total_eth_available: info.totalEthAvailable.saturating_to(),
            total_registered: info.totalNftsRegistered.saturating_to(),
            eth_per_nft: info.ethPerNftRate.saturating_to(),
            rate_calculated: info.rateCalculated,
            registrations_open: info.registrationsOpen,
            airdrop_started: info.airdropStarted,
        })
    }

    async fn get_user_info(&self, user: &str) -> Result<UserInfo, ChainError> {
        let user = user.parse::<Address>()?;
        let contract = Dissolution::new(self.dissolution, self.provider.clone());
        let info = contract.getUserInfo(user).call().await?;
        Ok(UserInfo {
            nfts_registered: info.nftsRegistered.saturating_to(),
            withdrawn: info.withdrawn,
            eth_claimable: info.ethClaimable.saturating_to(),
        })
    }

    async fn get_user_token_ids(&self, user: &str) -> Result<Vec<u64>, ChainError> {
        let user = user.parse::<Address>()?;
        let contract = Dissolution::new(self.dissolution, self.provider.clone());
        let ids = contract.getUserTokenIds(user).call().await?.tokenIds;
        Ok(ids.into_iter().map(|id| id.saturating_to()).collect())
    }

    async fn is_token_redeemed(&self, token_id: u64) -> Result<bool, ChainError> {
        let contract = Dissolution::new(self.dissolution, self.provider.clone());
        Ok(contract
            .isTokenRedeemed(U256::from(token_id))
            .call()
            .await?
            .redeemed)
    }

    async fn time_until_close(&self) -> Result<u64, ChainError> {
        let contract = Dissolution::new(self.dissolution, self.provider.clone());
        let time_left = contract.timeUntilRegistrationsClose().call().await?.timeLeft;
        Ok(time_left.saturating_to())
    }

    async fn eth_per_nft(&self) -> Result<u128, ChainError> {
        let contract = Dissolution::new(self.dissolution, self.provider.clone());
        Ok(contract.ethPerNFT().call().await?.rate.saturating_to())
    }

    async fn owner_of(&self, token_id: u64) -> Result<String, ChainError> {
        let contract = Collection::new(self.collection, self.provider.clone());
        let owner = contract.ownerOf(U256::from(token_id)).call().await?.owner;
        Ok(format!("{:?}", owner))
    }

    async fn register_nfts(&self, token_ids: &[u64]) -> Result<String, ChainError> {
        if !self.has_signer {
            return Err(ChainError::MissingSigner);
        }
        let contract = Dissolution::new(self.dissolution, self.provider.clone());
        let ids = token_ids.iter().map(|id| U256::from(*id)).collect();
        let call = contract.registerNFTs(ids);
        let pending = call.send().await?;
        Ok(format!("{:#x}", pending.tx_hash()))
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<ReceiptOutcome, ChainError> {
        let hash = tx_hash.parse::<B256>()?;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(receipt) = self.provider.get_transaction_receipt(hash).await? {
                if receipt.status() {
                    return Ok(ReceiptOutcome::Confirmed);
                } else {
                    return Ok(ReceiptOutcome::Failed);
                }
            }
            if tokio::time::Instant::now() + RECEIPT_POLL_INTERVAL > deadline {
                return Ok(ReceiptOutcome::TimedOut);
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    async fn registration_events_since(
        &self,
        starting_block: u64,
    ) -> Result<Vec<RegistrationEvent>, ChainError> {
        let contract = Dissolution::new(self.dissolution, self.provider.clone());
        let logs = contract
            .NFTsRegistered_filter()
            .from_block(starting_block)
            .query()
            .await?;
        Ok(logs
            .into_iter()
            .map(|(event, log)| RegistrationEvent {
                user: format!("{:?}", event.user),
                token_ids: event.tokenIds.iter().map(|id| id.saturating_to()).collect(),
                count: event.count.saturating_to(),
                block_number: log.block_number.unwrap_or_default(),
            })
            .collect())
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.provider.get_block_number().await?)
    }
}
