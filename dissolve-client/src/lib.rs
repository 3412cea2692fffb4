// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The client-side logic of the dissolution registration service: metadata
//! fetching, selection bookkeeping, transaction submission, and the shared
//! pending-transaction tracker.

pub mod config;
mod error;
pub mod indexer;
pub mod session;
pub mod tracker;

/// Helper types for tests.
#[cfg(any(test, feature = "test"))]
pub mod test_utils;

pub use error::Error;
