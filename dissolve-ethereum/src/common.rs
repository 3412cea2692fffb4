// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy::{primitives::Address, rpc::json_rpc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    /// Hex parsing error
    #[error(transparent)]
    FromHexError(#[from] alloy::primitives::hex::FromHexError),

    /// RPC error
    #[error(transparent)]
    RpcError(#[from] json_rpc::RpcError<alloy::transports::TransportErrorKind>),

    /// Contract call error
    #[error(transparent)]
    ContractError(#[from] alloy::contract::Error),

    /// Signing key parsing error
    #[error(transparent)]
    SignerError(#[from] alloy_signer_local::LocalSignerError),

    /// URL parsing error
    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error("no signing key was configured, write calls are unavailable")]
    MissingSigner,

    /// The contract could not be reached (typically: not yet deployed).
    #[error("contract unavailable: {0}")]
    Unavailable(String),
}

/// Parses a wallet address and renders it back `0x`-prefixed lowercase, the
/// form used throughout for comparisons.
pub fn normalize_address(address: &str) -> Result<String, ChainError> {
    let address = address.parse::<Address>()?;
    Ok(format!("{:?}", address))
}

/// The tagged outcome of watching a transaction receipt for a bounded time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptOutcome {
    /// The receipt arrived and reports success.
    Confirmed,
    /// The receipt arrived and reports a revert.
    Failed,
    /// No receipt within the configured ceiling; the transaction may still
    /// confirm later.
    TimedOut,
}

/// An `NFTsRegistered` event emitted by the dissolution contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationEvent {
    /// The registering address, `0x`-prefixed lowercase.
    pub user: String,
    pub token_ids: Vec<u64>,
    pub count: u64,
    pub block_number: u64,
}

impl RegistrationEvent {
    /// Whether the event was emitted for the given address. Addresses are
    /// compared case-insensitively.
    pub fn is_for(&self, address: &str) -> bool {
        self.user.eq_ignore_ascii_case(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_normalize_to_lowercase() {
        assert_eq!(
            normalize_address("0xABCDEF0123456789abcdef0123456789ABCDEF01").unwrap(),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
        assert!(normalize_address("not-an-address").is_err());
        assert!(normalize_address("0x1234").is_err());
    }

    #[test]
    fn event_address_match_ignores_case() {
        let event = RegistrationEvent {
            user: "0xabcdef0123456789abcdef0123456789abcdef01".to_string(),
            token_ids: vec![1, 2],
            count: 2,
            block_number: 10,
        };
        assert!(event.is_for("0xABCDEF0123456789abcdef0123456789ABCDEF01"));
        assert!(!event.is_for("0x0000000000000000000000000000000000000001"));
    }
}
