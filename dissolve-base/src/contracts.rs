// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The registry of deployed contract addresses, by network.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The Ethereum network the service targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    #[default]
    Mainnet,
    Sepolia,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Sepolia => write!(f, "sepolia"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "sepolia" => Ok(Network::Sepolia),
            other => Err(format!("unknown network {:?}", other)),
        }
    }
}

/// The pair of deployed contracts the service talks to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    /// The NFT collection contract.
    pub collection: String,
    /// The dissolution contract governing the registration window.
    pub dissolution: String,
}

const MAINNET_COLLECTION: &str = "0x228d11Ae974De7f92c16A1F621341759c56D039D";
const MAINNET_DISSOLUTION: &str = "0x7320febE7F5130aa37EBd185C65202b54d13e1D8";

const SEPOLIA_COLLECTION: &str = "0x725296D429ce22790A9d85c08fEd7ed0a980AC48";
const SEPOLIA_DISSOLUTION: &str = "0xb7Aa527922455534FA03f2e41970675E50DD8468";

impl ContractAddresses {
    /// The deployed addresses for the given network.
    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => ContractAddresses {
                collection: MAINNET_COLLECTION.to_string(),
                dissolution: MAINNET_DISSOLUTION.to_string(),
            },
            Network::Sepolia => ContractAddresses {
                collection: SEPOLIA_COLLECTION.to_string(),
                dissolution: SEPOLIA_DISSOLUTION.to_string(),
            },
        }
    }
}
