// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The data model of the registration process.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A token of the collection as shown to the holder. Fetched fresh from the
/// indexing API whenever the session address changes; never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token_id: u64,
    pub name: String,
    pub description: String,
    pub image: String,
    /// Whether name, description and image are all known.
    pub revealed: bool,
}

impl Token {
    /// The pre-reveal placeholder for a token whose metadata could not be
    /// retrieved at all.
    pub fn placeholder(token_id: u64) -> Self {
        Token {
            token_id,
            name: format!("Token #{}", token_id),
            description: String::new(),
            image: String::new(),
            revealed: false,
        }
    }
}

/// The global registration window, as read from the dissolution contract's
/// `getRedemptionInfo`. Never written by this service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionInfo {
    pub start_time: u64,
    pub end_time: u64,
    /// In wei.
    pub total_eth_available: u128,
    pub total_registered: u64,
    /// In wei.
    pub eth_per_nft: u128,
    pub rate_calculated: bool,
    pub registrations_open: bool,
    pub airdrop_started: bool,
}

impl RedemptionInfo {
    pub fn phase(&self) -> RegistrationPhase {
        if self.registrations_open {
            RegistrationPhase::Open
        } else if self.airdrop_started {
            RegistrationPhase::AirdropAvailable
        } else if self.rate_calculated {
            RegistrationPhase::Closed
        } else {
            RegistrationPhase::NotStarted
        }
    }
}

/// The phase of the dissolution process, derived from the window flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPhase {
    NotStarted,
    Open,
    AirdropAvailable,
    Closed,
}

/// Per-user registration bookkeeping, from `getUserInfo`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub nfts_registered: u64,
    pub withdrawn: bool,
    /// In wei.
    pub eth_claimable: u128,
}

/// The status of a tracked registration transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

/// An in-flight (or recently resolved) registration transaction, tagged with
/// the token ids it covers so the UI can mark them pending before the receipt
/// confirms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub hash: String,
    pub token_ids: Vec<u64>,
    /// Milliseconds since the Unix epoch, at submission time.
    pub timestamp: u64,
    pub status: TxStatus,
}

impl PendingTransaction {
    pub fn new(hash: String, token_ids: Vec<u64>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        PendingTransaction {
            hash,
            token_ids,
            timestamp,
            status: TxStatus::Pending,
        }
    }
}

/// Renders a number of seconds as the coarsest sensible unit, the way the
/// countdown is shown to holders.
pub fn format_time_left(seconds: u64) -> String {
    const DAY: u64 = 86_400;
    const HOUR: u64 = 3_600;
    if seconds >= 2 * DAY {
        format!("{} days", seconds / DAY)
    } else if seconds >= 2 * HOUR {
        format!("{} hours", seconds / HOUR)
    } else {
        format!("{} minutes", seconds / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_follows_window_flags() {
        let mut info = RedemptionInfo::default();
        assert_eq!(info.phase(), RegistrationPhase::NotStarted);
        info.rate_calculated = true;
        assert_eq!(info.phase(), RegistrationPhase::Closed);
        info.airdrop_started = true;
        assert_eq!(info.phase(), RegistrationPhase::AirdropAvailable);
        info.registrations_open = true;
        assert_eq!(info.phase(), RegistrationPhase::Open);
    }

    #[test]
    fn time_left_uses_coarsest_unit() {
        assert_eq!(format_time_left(3 * 86_400), "3 days");
        assert_eq!(format_time_left(5 * 3_600), "5 hours");
        assert_eq!(format_time_left(90), "1 minutes");
        assert_eq!(format_time_left(0), "0 minutes");
    }

    #[test]
    fn placeholder_is_unrevealed() {
        let token = Token::placeholder(7);
        assert_eq!(token.name, "Token #7");
        assert!(token.image.is_empty());
        assert!(!token.revealed);
    }
}
