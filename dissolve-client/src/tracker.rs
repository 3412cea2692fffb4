// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The process-wide record of in-flight registration transactions.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_lock::Mutex;
use dissolve_base::data_types::{PendingTransaction, TxStatus};
use dissolve_ethereum::{
    client::DissolutionQueries,
    common::ReceiptOutcome,
};
use tokio::task::JoinHandle;
use tracing::warn;

/// How long a resolved entry lingers so the UI can show the outcome.
pub const SUCCESS_LINGER: Duration = Duration::from_secs(2);
pub const FAILURE_LINGER: Duration = Duration::from_secs(5);

/// A cloneable handle to the shared map of pending transactions, keyed by
/// transaction hash. Lives for the lifetime of the process; never persisted.
#[derive(Clone, Default)]
pub struct PendingTransactions {
    inner: Arc<Mutex<HashMap<String, PendingTransaction>>>,
}

impl PendingTransactions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly submitted transaction, before its receipt confirms.
    pub async fn add(&self, hash: String, token_ids: Vec<u64>) {
        let mut map = self.inner.lock().await;
        map.insert(hash.clone(), PendingTransaction::new(hash, token_ids));
    }

    pub async fn set_status(&self, hash: &str, status: TxStatus) {
        let mut map = self.inner.lock().await;
        if let Some(transaction) = map.get_mut(hash) {
            transaction.status = status;
        }
    }

    pub async fn remove(&self, hash: &str) {
        let mut map = self.inner.lock().await;
        map.remove(hash);
    }

    pub async fn get(&self, hash: &str) -> Option<PendingTransaction> {
        let map = self.inner.lock().await;
        map.get(hash).cloned()
    }

    /// Whether some tracked transaction with status `pending` covers the
    /// given token.
    pub async fn is_pending_token(&self, token_id: u64) -> bool {
        let map = self.inner.lock().await;
        map.values().any(|transaction| {
            transaction.status == TxStatus::Pending && transaction.token_ids.contains(&token_id)
        })
    }

    pub async fn snapshot(&self) -> Vec<PendingTransaction> {
        let map = self.inner.lock().await;
        let mut transactions: Vec<_> = map.values().cloned().collect();
        transactions.sort_by_key(|transaction| transaction.timestamp);
        transactions
    }

    /// Spawns a background watch for the given hash: polls for the receipt,
    /// updates the entry, and schedules its removal (2s after success, 5s
    /// after failure) so the pending overlay eventually disappears even if no
    /// other component reacts. A timed-out watch leaves the entry pending.
    pub fn watch(
        &self,
        chain: Arc<dyn DissolutionQueries>,
        hash: String,
        timeout: Duration,
    ) -> JoinHandle<ReceiptOutcome> {
        let tracker = self.clone();
        tokio::spawn(async move {
            let outcome = match chain.wait_for_receipt(&hash, timeout).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    // An RPC failure while polling is indistinguishable from
                    // a slow chain; keep the entry pending.
                    warn!(hash, %error, "receipt watch failed");
                    ReceiptOutcome::TimedOut
                }
            };
            match outcome {
                ReceiptOutcome::Confirmed => {
                    tracker.set_status(&hash, TxStatus::Success).await;
                    tracker.schedule_removal(hash, SUCCESS_LINGER);
                }
                ReceiptOutcome::Failed => {
                    tracker.set_status(&hash, TxStatus::Failed).await;
                    tracker.schedule_removal(hash, FAILURE_LINGER);
                }
                ReceiptOutcome::TimedOut => {
                    warn!(hash, "transaction still unconfirmed after the ceiling");
                }
            }
            outcome
        })
    }

    fn schedule_removal(&self, hash: String, linger: Duration) {
        let tracker = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(linger).await;
            tracker.remove(&hash).await;
        });
    }
}
