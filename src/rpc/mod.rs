// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Node RPC integration.
//!
//! This module provides:
//! - The JSON transport seam and its mutual-TLS implementation
//! - Wallet readiness checks and read-only wallet queries
//! - The retrying, readiness-gated RPC caller
//! - Fee estimation with fallback

pub mod caller;
pub mod fees;
pub mod transport;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use caller::{merge_params, RpcCaller, RpcFailure, DEFAULT_MAX_ATTEMPTS, NO_OP_CHANGELIST_ERROR};
pub use fees::FeeEstimator;
pub use transport::{HttpsTransport, RpcTransport, TransportError};
pub use wallet::{format_mojos, NetworkInfo, ReadinessCheck, ReadinessError, WalletClient, WalletError};

/// A value that may have come from a fallback path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback<T> {
    pub value: T,
    /// True when `value` is the fallback rather than the real answer.
    pub degraded: bool,
}

impl<T> Fallback<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            degraded: false,
        }
    }

    pub fn degraded(value: T) -> Self {
        Self {
            value,
            degraded: true,
        }
    }
}
