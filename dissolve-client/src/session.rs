// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! A holder's session: owned tokens, registration status, the selection set,
//! and the submission flow.

use std::{collections::BTreeSet, sync::Arc};

use dissolve_base::data_types::{RedemptionInfo, RegistrationPhase, Token};
use dissolve_ethereum::{
    client::DissolutionQueries,
    common::ReceiptOutcome,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    config::SessionConfig,
    indexer::{collect_tokens, NftIndexer},
    tracker::PendingTransactions,
    Error,
};

/// A transient, user-visible notice produced by a selection toggle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// The registration window is not open; nothing was changed.
    WindowClosed,
    /// The token is already registered; nothing was changed.
    AlreadyRegistered { token_id: u64 },
    /// The token is not owned by the session address; nothing was changed.
    NotOwned { token_id: u64 },
    Added { token_id: u64 },
    Removed { token_id: u64 },
}

/// A submission the node has accepted, together with its receipt watch.
#[derive(Debug)]
pub struct SubmittedRegistration {
    pub hash: String,
    pub token_ids: Vec<u64>,
    /// Resolves to the receipt outcome within the configured ceiling.
    pub watch: JoinHandle<ReceiptOutcome>,
}

/// The result of a registration submission that reached the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RegisterOutcome {
    Confirmed { hash: String, token_ids: Vec<u64> },
    Failed { hash: String },
    StillPending { hash: String },
}

/// A read-only snapshot of the session for presentation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub address: Option<String>,
    pub tokens: Vec<Token>,
    pub registered: Vec<u64>,
    pub selection: Vec<u64>,
    pub info: RedemptionInfo,
    pub phase: RegistrationPhase,
    pub time_left: u64,
    /// `eth_per_nft × |selection|`, in wei.
    pub estimated_payout: u128,
}

pub struct Session {
    chain: Arc<dyn DissolutionQueries>,
    indexer: Arc<dyn NftIndexer>,
    tracker: PendingTransactions,
    config: SessionConfig,
    address: Option<String>,
    tokens: Vec<Token>,
    registered: BTreeSet<u64>,
    selection: BTreeSet<u64>,
    info: RedemptionInfo,
    time_left: u64,
    in_flight: bool,
}

impl Session {
    pub fn new(
        chain: Arc<dyn DissolutionQueries>,
        indexer: Arc<dyn NftIndexer>,
        tracker: PendingTransactions,
        config: SessionConfig,
    ) -> Self {
        Session {
            chain,
            indexer,
            tracker,
            config,
            address: None,
            tokens: Vec::new(),
            registered: BTreeSet::new(),
            selection: BTreeSet::new(),
            info: RedemptionInfo::default(),
            time_left: 0,
            in_flight: false,
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn tracker(&self) -> &PendingTransactions {
        &self.tracker
    }

    /// Points the session at a different wallet address, dropping all state
    /// derived from the previous one.
    pub fn set_address(&mut self, address: Option<String>) {
        if self.address == address {
            return;
        }
        self.address = address;
        self.tokens.clear();
        self.registered.clear();
        self.selection.clear();
    }

    /// Re-reads the registration window, the countdown, and the caller's
    /// registered tokens. Each read fails closed: an error degrades to
    /// empty/false values, never to a hard failure of the view.
    pub async fn refresh_status(&mut self) {
        self.info = match self.chain.get_redemption_info().await {
            Ok(info) => info,
            Err(error) => {
                warn!(%error, "redemption info unavailable, treating window as closed");
                RedemptionInfo::default()
            }
        };
        self.time_left = match self.chain.time_until_close().await {
            Ok(time_left) => time_left,
            Err(error) => {
                warn!(%error, "countdown unavailable");
                0
            }
        };
        self.registered = match &self.address {
            None => BTreeSet::new(),
            Some(address) => match self.chain.get_user_token_ids(address).await {
                Ok(ids) => ids.into_iter().collect(),
                Err(error) => {
                    warn!(%error, "registered-token list unavailable, assuming none");
                    BTreeSet::new()
                }
            },
        };
        self.prune_selection();
    }

    /// Fetches the owned tokens for the current address and applies them.
    pub async fn refresh_holdings(&mut self) -> Result<(), Error> {
        let Some(address) = self.address.clone() else {
            self.tokens.clear();
            return Ok(());
        };
        let tokens = collect_tokens(&*self.indexer, &address, &self.config.collection).await?;
        self.apply_holdings(&address, tokens);
        Ok(())
    }

    /// Applies a fetched token list, discarding it if the session has been
    /// pointed at a different address since the fetch was issued.
    pub fn apply_holdings(&mut self, fetched_for: &str, tokens: Vec<Token>) {
        if self.address.as_deref() != Some(fetched_for) {
            info!(fetched_for, "discarding stale holdings response");
            return;
        }
        self.tokens = tokens;
        self.prune_selection();
    }

    // Selection stays a subset of owned minus registered.
    fn prune_selection(&mut self) {
        let owned: BTreeSet<u64> = self.tokens.iter().map(|token| token.token_id).collect();
        self.selection
            .retain(|id| owned.contains(id) && !self.registered.contains(id));
    }

    /// Flips a token's membership in the selection set, refusing with a
    /// notice when the window is closed or the token is already registered.
    pub fn toggle(&mut self, token_id: u64) -> Notice {
        if !self.info.registrations_open {
            return Notice::WindowClosed;
        }
        if self.registered.contains(&token_id) {
            return Notice::AlreadyRegistered { token_id };
        }
        if !self.tokens.iter().any(|token| token.token_id == token_id) {
            return Notice::NotOwned { token_id };
        }
        if self.selection.remove(&token_id) {
            Notice::Removed { token_id }
        } else {
            self.selection.insert(token_id);
            Notice::Added { token_id }
        }
    }

    pub fn selected(&self) -> Vec<u64> {
        self.selection.iter().copied().collect()
    }

    /// Validates and submits the current selection as one `registerNFTs`
    /// batch, returning as soon as the node accepts the transaction.
    ///
    /// The caller awaits the returned watch without holding the session, so
    /// the view stays servable while the receipt is outstanding, and then
    /// applies the outcome with [`Session::complete_registration`]. Until
    /// that happens further submissions are refused.
    pub async fn begin_registration(&mut self) -> Result<SubmittedRegistration, Error> {
        if !self.info.registrations_open {
            return Err(Error::RegistrationClosed);
        }
        if self.selection.is_empty() {
            return Err(Error::EmptySelection);
        }
        if self.in_flight {
            return Err(Error::SubmissionInFlight);
        }
        let token_ids = self.selected();
        let hash = self.chain.register_nfts(&token_ids).await?;
        info!(hash, count = token_ids.len(), "registration submitted");
        // Track before confirmation, so the tokens show as pending at once.
        self.tracker.add(hash.clone(), token_ids.clone()).await;
        let watch = self.tracker.watch(
            self.chain.clone(),
            hash.clone(),
            self.config.receipt_timeout,
        );
        self.in_flight = true;
        Ok(SubmittedRegistration {
            hash,
            token_ids,
            watch,
        })
    }

    /// Applies the outcome of a watched submission. On success the selection
    /// is cleared and status and holdings are refreshed; otherwise the
    /// selection is left intact for a retry.
    pub async fn complete_registration(
        &mut self,
        outcome: ReceiptOutcome,
        hash: String,
        token_ids: Vec<u64>,
    ) -> RegisterOutcome {
        self.in_flight = false;
        match outcome {
            ReceiptOutcome::Confirmed => {
                self.selection.clear();
                self.refresh_status().await;
                if let Err(error) = self.refresh_holdings().await {
                    warn!(%error, "holdings refresh after registration failed");
                }
                RegisterOutcome::Confirmed { hash, token_ids }
            }
            ReceiptOutcome::Failed => RegisterOutcome::Failed { hash },
            ReceiptOutcome::TimedOut => RegisterOutcome::StillPending { hash },
        }
    }

    /// Submits the current selection and waits for the outcome in place.
    pub async fn register_selected(&mut self) -> Result<RegisterOutcome, Error> {
        let SubmittedRegistration {
            hash,
            token_ids,
            watch,
        } = self.begin_registration().await?;
        let outcome = watch.await.unwrap_or(ReceiptOutcome::TimedOut);
        Ok(self.complete_registration(outcome, hash, token_ids).await)
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            address: self.address.clone(),
            tokens: self.tokens.clone(),
            registered: self.registered.iter().copied().collect(),
            selection: self.selected(),
            info: self.info,
            phase: self.info.phase(),
            time_left: self.time_left,
            estimated_payout: self
                .info
                .eth_per_nft
                .saturating_mul(self.selection.len() as u128),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::{
        config::SessionConfig,
        test_utils::{raw_nft, FakeChain, FakeIndexer},
    };

    const OWNER: &str = "0x00000000000000000000000000000000000000aa";

    fn session(chain: Arc<FakeChain>, indexer: Arc<FakeIndexer>) -> Session {
        let config = SessionConfig {
            collection: "0x228d11Ae974De7f92c16A1F621341759c56D039D".to_string(),
            receipt_timeout: std::time::Duration::from_secs(60),
        };
        Session::new(chain, indexer, PendingTransactions::new(), config)
    }

    async fn populated_session(open: bool) -> (Arc<FakeChain>, Arc<FakeIndexer>, Session) {
        let chain = Arc::new(FakeChain::default());
        chain.set_registrations_open(open).await;
        chain.set_registered(OWNER, vec![2]).await;
        let indexer = Arc::new(FakeIndexer::default());
        for id in [1, 2, 3] {
            indexer.add_owned(raw_nft(id, Some("n"), Some("d"), Some("i")));
            indexer.set_metadata(raw_nft(id, Some("n"), Some("d"), Some("i")));
        }
        let mut session = session(chain.clone(), indexer.clone());
        session.set_address(Some(OWNER.to_string()));
        session.refresh_status().await;
        session.refresh_holdings().await.unwrap();
        (chain, indexer, session)
    }

    #[tokio::test]
    async fn toggle_refuses_while_window_is_closed() {
        let (_chain, _indexer, mut session) = populated_session(false).await;
        assert_eq!(session.toggle(1), Notice::WindowClosed);
        assert!(session.selected().is_empty());
    }

    #[tokio::test]
    async fn toggle_refuses_registered_tokens() {
        let (_chain, _indexer, mut session) = populated_session(true).await;
        assert_eq!(
            session.toggle(2),
            Notice::AlreadyRegistered { token_id: 2 }
        );
        assert!(session.selected().is_empty());
    }

    #[tokio::test]
    async fn toggle_flips_membership_for_eligible_tokens() {
        let (_chain, _indexer, mut session) = populated_session(true).await;
        assert_eq!(session.toggle(1), Notice::Added { token_id: 1 });
        assert_eq!(session.toggle(3), Notice::Added { token_id: 3 });
        assert_eq!(session.selected(), vec![1, 3]);
        assert_eq!(session.toggle(1), Notice::Removed { token_id: 1 });
        assert_eq!(session.selected(), vec![3]);
        assert_eq!(session.toggle(99), Notice::NotOwned { token_id: 99 });
    }

    #[tokio::test]
    async fn register_refuses_empty_selection_and_closed_window() {
        let (_chain, _indexer, mut session) = populated_session(true).await;
        assert_matches!(
            session.register_selected().await,
            Err(Error::EmptySelection)
        );

        let (_chain, _indexer, mut closed) = populated_session(false).await;
        assert_matches!(
            closed.register_selected().await,
            Err(Error::RegistrationClosed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn successful_registration_clears_selection_and_refreshes_once() {
        let (chain, _indexer, mut session) = populated_session(true).await;
        session.toggle(1);
        session.toggle(3);
        chain.reset_read_counts();

        let outcome = session.register_selected().await.unwrap();
        assert_matches!(
            outcome,
            RegisterOutcome::Confirmed { ref token_ids, .. } if *token_ids == vec![1, 3]
        );
        assert!(session.selected().is_empty());
        // Exactly one status re-read was issued by the success path.
        assert_eq!(chain.info_reads(), 1);
        assert_eq!(chain.registered_reads(), 1);
        assert_eq!(chain.submissions().await, vec![vec![1, 3]]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_submission_is_refused_while_one_is_outstanding() {
        let (_chain, _indexer, mut session) = populated_session(true).await;
        session.toggle(1);

        let submission = session.begin_registration().await.unwrap();
        assert_matches!(
            session.begin_registration().await,
            Err(Error::SubmissionInFlight)
        );

        let outcome = submission.watch.await.unwrap();
        let outcome = session
            .complete_registration(outcome, submission.hash, submission.token_ids)
            .await;
        assert_matches!(outcome, RegisterOutcome::Confirmed { .. });
        assert!(session.selected().is_empty());
        // Resolved submissions no longer block the next one.
        session.toggle(3);
        assert!(session.begin_registration().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_registration_keeps_the_selection() {
        let (chain, _indexer, mut session) = populated_session(true).await;
        chain.set_receipt_outcome(ReceiptOutcome::Failed).await;
        session.toggle(1);

        let outcome = session.register_selected().await.unwrap();
        assert_matches!(outcome, RegisterOutcome::Failed { .. });
        assert_eq!(session.selected(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn submitted_tokens_are_pending_before_confirmation() {
        let (chain, _indexer, mut session) = populated_session(true).await;
        chain.set_receipt_outcome(ReceiptOutcome::TimedOut).await;
        session.toggle(1);

        let outcome = session.register_selected().await.unwrap();
        assert_matches!(outcome, RegisterOutcome::StillPending { .. });
        assert!(session.tracker().is_pending_token(1).await);
        // The selection survives a still-pending submission.
        assert_eq!(session.selected(), vec![1]);
    }

    #[tokio::test]
    async fn stale_holdings_are_discarded_after_an_address_change() {
        let chain = Arc::new(FakeChain::default());
        let indexer = Arc::new(FakeIndexer::default());
        let mut session = session(chain, indexer);
        session.set_address(Some(OWNER.to_string()));

        let stale = vec![Token::placeholder(9)];
        session.set_address(Some("0x00000000000000000000000000000000000000bb".to_string()));
        session.apply_holdings(OWNER, stale);
        assert!(session.view().tokens.is_empty());
    }

    #[tokio::test]
    async fn status_reads_fail_closed() {
        let chain = Arc::new(FakeChain::default());
        chain.set_fail_reads(true).await;
        let indexer = Arc::new(FakeIndexer::default());
        let mut session = session(chain, indexer);
        session.set_address(Some(OWNER.to_string()));
        session.refresh_status().await;

        let view = session.view();
        assert_eq!(view.info, RedemptionInfo::default());
        assert_eq!(view.phase, RegistrationPhase::NotStarted);
        assert!(view.registered.is_empty());
        assert_eq!(view.time_left, 0);
    }
}
