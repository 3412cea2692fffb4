// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! This module provides functionalities for accessing the collection and
//! dissolution contracts on an Ethereum node.

pub mod client;
pub mod common;
pub mod provider;
