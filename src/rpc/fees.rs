// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Network fee estimation with a configured fallback.
//!
//! Estimation never fails: a missing endpoint, a transport error, a malformed
//! answer, or an implausible estimate all yield `default_fee`.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use super::transport::RpcTransport;
use super::Fallback;
use crate::config::ClientConfig;

/// Confirmation horizons requested from the oracle, in seconds.
pub const TARGET_TIMES_SECS: [u64; 3] = [60, 120, 300];

pub const SPEND_TYPE: &str = "send_xch_transaction";

/// Estimates above one XCH are treated as erroneous.
pub const MAX_PLAUSIBLE_FEE_MOJOS: u64 = 1_000_000_000_000;

pub struct FeeEstimator<T> {
    transport: Arc<T>,
}

impl<T> Clone for FeeEstimator<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: RpcTransport> FeeEstimator<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Fee in mojos for the next spend.
    pub async fn estimate(&self, config: &ClientConfig) -> u64 {
        self.estimate_with_fallback(config).await.value
    }

    /// Fee in mojos, flagged when the default was used.
    pub async fn estimate_with_fallback(&self, config: &ClientConfig) -> Fallback<u64> {
        let Some(url) = config.fee_estimate_url() else {
            return Fallback::fresh(config.default_fee);
        };

        let body = json!({
            "target_times": TARGET_TIMES_SECS,
            "spend_type": SPEND_TYPE,
        });

        let response = match self.transport.post_json(&url, &body).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, default_fee = config.default_fee, "Fee estimate failed, using default");
                return Fallback::degraded(config.default_fee);
            }
        };

        match first_estimate(&response) {
            Some(fee) if fee > MAX_PLAUSIBLE_FEE_MOJOS => {
                warn!(fee, default_fee = config.default_fee, "Implausible fee estimate, using default");
                Fallback::degraded(config.default_fee)
            }
            Some(fee) => {
                info!(fee, "Using estimated fee");
                Fallback::fresh(fee)
            }
            None => {
                warn!(response = %response, "Malformed fee estimate, using default");
                Fallback::degraded(config.default_fee)
            }
        }
    }
}

/// First (shortest horizon) estimate, rounded up to whole mojos.
fn first_estimate(response: &Value) -> Option<u64> {
    let first = response.get("estimates")?.as_array()?.first()?;
    if let Some(fee) = first.as_u64() {
        return Some(fee);
    }
    let fee = first.as_f64()?;
    if fee.is_finite() && fee >= 0.0 {
        Some(fee.ceil() as u64)
    } else {
        None
    }
}
