// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Resolution of IPFS image references through an ordered list of HTTP
//! gateways, with a deterministic fallback cursor.

use serde::{Deserialize, Serialize};

/// The default gateway mirrors, tried in order.
pub const DEFAULT_GATEWAYS: &[&str] = &[
    "https://cloudflare-ipfs.com/ipfs/",
    "https://ipfs.io/ipfs/",
    "https://gateway.pinata.cloud/ipfs/",
    "https://dweb.link/ipfs/",
];

/// Extracts the content identifier from an image reference: an `ipfs://` URI,
/// a gateway URL containing `/ipfs/`, or a bare identifier.
pub fn content_id(reference: &str) -> &str {
    if let Some(id) = reference.strip_prefix("ipfs://") {
        return id;
    }
    if let Some((_, id)) = reference.split_once("/ipfs/") {
        return id;
    }
    reference
}

/// Rewrites an `ipfs://` reference to an HTTP URL on the primary gateway.
/// Plain HTTP(S) references pass through unchanged.
pub fn to_gateway_url(reference: &str) -> String {
    if reference.starts_with("ipfs://") {
        format!("{}{}", DEFAULT_GATEWAYS[0], content_id(reference))
    } else {
        reference.to_string()
    }
}

/// A cursor over the gateway list for one image instance. Each load failure
/// advances to the next mirror; after the list is exhausted the cursor is in
/// a terminal failed state and only a placeholder should be shown.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayCursor {
    reference: String,
    gateways: Vec<String>,
    index: usize,
    failed: bool,
}

impl GatewayCursor {
    pub fn new(reference: impl Into<String>) -> Self {
        Self::with_gateways(
            reference,
            DEFAULT_GATEWAYS.iter().map(|s| s.to_string()).collect(),
        )
    }

    pub fn with_gateways(reference: impl Into<String>, gateways: Vec<String>) -> Self {
        let failed = gateways.is_empty();
        GatewayCursor {
            reference: reference.into(),
            gateways,
            index: 0,
            failed,
        }
    }

    /// The URL to attempt next, or `None` once all gateways have failed.
    pub fn current_url(&self) -> Option<String> {
        if self.failed {
            return None;
        }
        let gateway = self.gateways.get(self.index)?;
        Some(format!("{}{}", gateway, content_id(&self.reference)))
    }

    /// Records a load failure of the current URL and moves to the next
    /// gateway. Returns the next URL to try, or `None` when exhausted.
    pub fn advance(&mut self) -> Option<String> {
        if self.failed {
            return None;
        }
        self.index += 1;
        if self.index >= self.gateways.len() {
            self.failed = true;
            return None;
        }
        self.current_url()
    }

    /// Whether every gateway has been tried and failed. One-way.
    pub fn is_exhausted(&self) -> bool {
        self.failed
    }
}
