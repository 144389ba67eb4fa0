// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # RPC Caller
//!
//! Wraps one logical RPC call:
//!
//! 1. Before every attempt, wait for the wallet to be synced and for its
//!    unconfirmed transactions to drain.
//! 2. POST the JSON body over mutual TLS.
//! 3. Interpret the response: `success: true` returns the payload, the known
//!    no-op changelist error is normalized to success, anything else is a
//!    retryable failure.
//!
//! Failures are retried immediately up to the attempt budget; the only delay
//! comes from the readiness poll. Exhausting the budget returns an
//! [`RpcFailure`] instead of panicking.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::transport::{RpcTransport, TransportError};
use super::wallet::WalletClient;
use crate::config::ClientConfig;

/// Remote error the DataLayer returns for a changelist that changes nothing.
pub const NO_OP_CHANGELIST_ERROR: &str = "Changelist resulted in no change to tree data";

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Structured failure of a call, serializable as `{success: false, error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("RPC call to {url} failed after {attempts} attempt(s): {error}")]
pub struct RpcFailure {
    #[serde(skip)]
    pub url: String,
    pub error: String,
    #[serde(skip)]
    pub attempts: u32,
}

impl RpcFailure {
    /// Wire form: `{"success": false, "error": ...}`.
    pub fn to_response(&self) -> Value {
        json!({ "success": false, "error": self.error })
    }
}

/// Why a single attempt failed.
#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("FAILED: Calling RPC: {url} {body}")]
    Remote { url: String, body: Value },
}

/// Retrying, readiness-gated RPC caller.
pub struct RpcCaller<T> {
    transport: Arc<T>,
    wallet: WalletClient<T>,
    shutdown: CancellationToken,
}

impl<T> Clone for RpcCaller<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            wallet: self.wallet.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<T: RpcTransport> RpcCaller<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            wallet: WalletClient::new(Arc::clone(&transport)),
            transport,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancel pending readiness waits when `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn wallet(&self) -> &WalletClient<T> {
        &self.wallet
    }

    /// [`Self::call`] with [`DEFAULT_MAX_ATTEMPTS`].
    pub async fn call_default(
        &self,
        url: &str,
        params: &Value,
        config: &ClientConfig,
    ) -> Result<Value, RpcFailure> {
        self.call(url, params, config, DEFAULT_MAX_ATTEMPTS).await
    }

    /// Call `url` with `params`, retrying up to `max_attempts` times (at
    /// least once).
    pub async fn call(
        &self,
        url: &str,
        params: &Value,
        config: &ClientConfig,
        max_attempts: u32,
    ) -> Result<Value, RpcFailure> {
        let max_attempts = max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if let Err(e) = self.wallet.wait_until_ready(config, &self.shutdown).await {
                error!(url = %url, attempt, error = %e, "Wallet not ready, abandoning RPC call");
                return Err(RpcFailure {
                    url: url.to_string(),
                    error: e.to_string(),
                    attempts: attempt - 1,
                });
            }

            info!(url = %url, attempt, "Calling DataLayer RPC");

            match self.attempt(url, params).await {
                Ok(payload) => return Ok(payload),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < max_attempts {
                        warn!(url = %url, attempt, error = %last_error, "RPC attempt failed, retrying");
                    }
                }
            }
        }

        error!(url = %url, attempts = max_attempts, error = %last_error, "RPC call failed");
        Err(RpcFailure {
            url: url.to_string(),
            error: last_error,
            attempts: max_attempts,
        })
    }

    async fn attempt(&self, url: &str, params: &Value) -> Result<Value, AttemptError> {
        let body = self.transport.post_json(url, params).await?;
        interpret_response(url, body)
    }
}

fn interpret_response(url: &str, body: Value) -> Result<Value, AttemptError> {
    if body.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(body);
    }

    match body.get("error").and_then(Value::as_str) {
        Some(NO_OP_CHANGELIST_ERROR) => {
            info!(url = %url, "Changelist made no change, treating as success");
            Ok(json!({ "success": true, "message": NO_OP_CHANGELIST_ERROR }))
        }
        Some(message) if message.contains("non-hexadecimal number") => {
            warn!(url = %url, error = %message, "Request contained malformed hex");
            Err(AttemptError::Remote {
                url: url.to_string(),
                body,
            })
        }
        _ => Err(AttemptError::Remote {
            url: url.to_string(),
            body,
        }),
    }
}

/// Merge computed fields over caller params. Non-object params are replaced
/// by an object holding only the computed fields.
pub fn merge_params<I>(params: Value, computed: I) -> Value
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut map = match params {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            warn!(params = %other, "Ignoring non-object RPC params");
            Map::new()
        }
    };
    map.extend(computed);
    Value::Object(map)
}
