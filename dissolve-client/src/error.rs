// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use dissolve_ethereum::common::ChainError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),
    #[error("indexing API transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("indexing API error: {0}")]
    Indexer(String),
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),
    #[error("the registration window is not open")]
    RegistrationClosed,
    #[error("no tokens are selected")]
    EmptySelection,
    #[error("a registration submission is already in flight")]
    SubmissionInFlight,
}
