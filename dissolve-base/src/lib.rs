// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Base types shared across the dissolution registration service: the data
//! model, the contract-address registry, and IPFS gateway resolution.

pub mod contracts;
pub mod data_types;
pub mod ipfs;
pub mod tracing;
