// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! This module provides unified handling for tracing subscribers within
//! dissolve binaries.

use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt};

/// Initializes tracing in a standard way.
///
/// The environment variable `RUST_LOG` can be used to control the verbosity;
/// it defaults to `info` for the given binary.
pub fn init(log_name: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,{}=info", log_name.replace('-', "_"))));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
