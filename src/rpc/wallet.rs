// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wallet RPC Client
//!
//! Readiness checks that gate every DataLayer call, plus a few read-only
//! wallet queries.
//!
//! ## Readiness
//!
//! A call may only be sent once the wallet reports synced and has no
//! unconfirmed transactions. Both conditions are polled at the configured
//! interval (15 s by default) until they hold, the optional poll bound is
//! reached, or the cancellation token fires.
//!
//! Malformed answers fail toward safety for the sync check (not synced, keep
//! waiting) and toward availability for the transaction check (nothing
//! pending).

use std::{fmt, future::Future, sync::Arc};

use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::transport::{RpcTransport, TransportError};
use crate::config::ClientConfig;

/// Mojos per XCH.
pub const MOJOS_PER_XCH: u64 = 1_000_000_000_000;

const XCH_DECIMALS: usize = 12;

/// Condition the readiness gate is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessCheck {
    Synced,
    TransactionsConfirmed,
}

impl fmt::Display for ReadinessCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synced => write!(f, "wallet sync"),
            Self::TransactionsConfirmed => write!(f, "transaction confirmations"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadinessError {
    #[error("cancelled while waiting for {0}")]
    Cancelled(ReadinessCheck),

    #[error("gave up waiting for {check} after {polls} poll(s)")]
    Exhausted { check: ReadinessCheck, polls: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("wallet rejected {endpoint}: {message}")]
    Rejected { endpoint: &'static str, message: String },

    #[error("invalid {endpoint} response: {message}")]
    InvalidResponse { endpoint: &'static str, message: String },
}

/// Network the wallet is connected to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkInfo {
    pub network_name: String,
    #[serde(default)]
    pub network_prefix: Option<String>,
}

/// Wallet RPC client.
pub struct WalletClient<T> {
    transport: Arc<T>,
}

impl<T> Clone for WalletClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: RpcTransport> WalletClient<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Whether the wallet reports synced. Any failure counts as not synced.
    pub async fn is_synced(&self, config: &ClientConfig) -> bool {
        let url = config.wallet_url("get_sync_status");
        match self.transport.post_json(&url, &json!({})).await {
            Ok(data) if is_success(&data) => {
                data.get("synced").and_then(Value::as_bool).unwrap_or(false)
            }
            Ok(_) => false,
            Err(e) => {
                warn!(error = %e, "Wallet sync status unavailable");
                false
            }
        }
    }

    /// The wallet is available when it answers synced.
    pub async fn is_available(&self, config: &ClientConfig) -> bool {
        self.is_synced(config).await
    }

    /// Whether any transaction of the wallet is still unconfirmed.
    ///
    /// A response without `success` or without a transaction list counts as
    /// nothing pending; transport errors are returned to the caller.
    pub async fn has_unconfirmed_transactions(
        &self,
        config: &ClientConfig,
        wallet_id: Option<u32>,
    ) -> Result<bool, TransportError> {
        let url = config.wallet_url("get_transactions");
        let body = json!({
            "wallet_id": wallet_id.unwrap_or(config.default_wallet_id),
            "sort_key": "RELEVANCE",
        });
        let data = self.transport.post_json(&url, &body).await?;

        if !is_success(&data) {
            return Ok(false);
        }

        let pending = data
            .get("transactions")
            .and_then(Value::as_array)
            .is_some_and(|txs| {
                txs.iter()
                    .any(|tx| !tx.get("confirmed").and_then(Value::as_bool).unwrap_or(true))
            });

        if pending {
            info!("Wallet has pending transactions");
        }
        Ok(pending)
    }

    /// Block until the wallet is synced and has no unconfirmed transactions.
    pub async fn wait_until_ready(
        &self,
        config: &ClientConfig,
        shutdown: &CancellationToken,
    ) -> Result<(), ReadinessError> {
        poll_until(ReadinessCheck::Synced, config, shutdown, || self.is_synced(config)).await?;

        poll_until(
            ReadinessCheck::TransactionsConfirmed,
            config,
            shutdown,
            || async move {
                match self.has_unconfirmed_transactions(config, None).await {
                    Ok(pending) => !pending,
                    Err(e) => {
                        warn!(error = %e, "Could not read wallet transactions");
                        false
                    }
                }
            },
        )
        .await
    }

    /// Next receive address of the wallet.
    pub async fn get_public_address(
        &self,
        config: &ClientConfig,
        wallet_id: Option<u32>,
        new_address: bool,
    ) -> Result<String, WalletError> {
        const ENDPOINT: &str = "get_next_address";
        let body = json!({
            "wallet_id": wallet_id.unwrap_or(config.default_wallet_id),
            "new_address": new_address,
        });
        let data = self.request(config, ENDPOINT, &body).await?;

        data.get("address")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| WalletError::InvalidResponse {
                endpoint: ENDPOINT,
                message: "missing address".to_string(),
            })
    }

    /// Spendable balance in mojos.
    pub async fn get_wallet_balance(
        &self,
        config: &ClientConfig,
        wallet_id: Option<u32>,
    ) -> Result<u64, WalletError> {
        const ENDPOINT: &str = "get_wallet_balance";
        let body = json!({ "wallet_id": wallet_id.unwrap_or(config.default_wallet_id) });
        let data = self.request(config, ENDPOINT, &body).await?;

        data.pointer("/wallet_balance/spendable_balance")
            .and_then(Value::as_u64)
            .ok_or_else(|| WalletError::InvalidResponse {
                endpoint: ENDPOINT,
                message: "missing wallet_balance.spendable_balance".to_string(),
            })
    }

    /// Network the wallet is connected to.
    pub async fn get_active_network(
        &self,
        config: &ClientConfig,
    ) -> Result<NetworkInfo, WalletError> {
        const ENDPOINT: &str = "get_network_info";
        let data = self.request(config, ENDPOINT, &json!({})).await?;

        serde_json::from_value(data).map_err(|e| WalletError::InvalidResponse {
            endpoint: ENDPOINT,
            message: e.to_string(),
        })
    }

    async fn request(
        &self,
        config: &ClientConfig,
        endpoint: &'static str,
        body: &Value,
    ) -> Result<Value, WalletError> {
        let data = self
            .transport
            .post_json(&config.wallet_url(endpoint), body)
            .await?;

        if is_success(&data) {
            Ok(data)
        } else {
            Err(WalletError::Rejected {
                endpoint,
                message: data
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            })
        }
    }
}

/// Poll `check` until it returns true.
async fn poll_until<F, Fut>(
    check_kind: ReadinessCheck,
    config: &ClientConfig,
    shutdown: &CancellationToken,
    mut check: F,
) -> Result<(), ReadinessError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let interval = config.readiness_poll_interval();
    let mut polls: u32 = 0;

    loop {
        if shutdown.is_cancelled() {
            return Err(ReadinessError::Cancelled(check_kind));
        }

        if check().await {
            return Ok(());
        }

        polls = polls.saturating_add(1);
        if config.max_readiness_polls.is_some_and(|max| polls >= max) {
            warn!(check = %check_kind, polls, "Wallet not ready, giving up");
            return Err(ReadinessError::Exhausted {
                check: check_kind,
                polls,
            });
        }

        info!(
            check = %check_kind,
            polls,
            retry_in_secs = interval.as_secs(),
            "Waiting for wallet"
        );

        tokio::select! {
            _ = tokio::time::sleep(interval) => {},
            _ = shutdown.cancelled() => {
                return Err(ReadinessError::Cancelled(check_kind));
            }
        }
    }
}

fn is_success(data: &Value) -> bool {
    data.get("success").and_then(Value::as_bool).unwrap_or(false)
}

/// Format mojos as XCH.
pub fn format_mojos(mojos: u64) -> String {
    if mojos == 0 {
        return "0".to_string();
    }

    let whole = mojos / MOJOS_PER_XCH;
    let remainder = mojos % MOJOS_PER_XCH;

    if remainder == 0 {
        whole.to_string()
    } else {
        let decimal_str = format!("{:0>width$}", remainder, width = XCH_DECIMALS);
        format!("{}.{}", whole, decimal_str.trim_end_matches('0'))
    }
}
