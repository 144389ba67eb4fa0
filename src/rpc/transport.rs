// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-over-HTTPS transport with client certificate authentication.

use std::{future::Future, sync::Arc};

use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::tls::{self, ClientIdentity, TlsError};

/// Errors raised below the RPC interpretation layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("POST {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("POST {url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("POST {url} returned invalid JSON: {message}")]
    InvalidJson { url: String, message: String },
}

/// Sends one JSON POST and returns the decoded JSON response.
pub trait RpcTransport: Send + Sync {
    fn post_json(
        &self,
        url: &str,
        body: &Value,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;
}

impl<T: RpcTransport + ?Sized> RpcTransport for Arc<T> {
    fn post_json(
        &self,
        url: &str,
        body: &Value,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send {
        (**self).post_json(url, body)
    }
}

/// `reqwest` transport presenting the node client certificate.
#[derive(Debug, Clone)]
pub struct HttpsTransport {
    http: Client,
}

impl HttpsTransport {
    /// Build a transport from the configured identity source.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TlsError> {
        let identity = tls::load_client_identity(config)?;
        Self::with_identity(config, &identity)
    }

    pub fn with_identity(
        config: &ClientConfig,
        identity: &ClientIdentity,
    ) -> Result<Self, TlsError> {
        tls::install_crypto_provider();

        let http = Client::builder()
            .use_rustls_tls()
            .identity(identity.to_reqwest()?)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TlsError::InvalidIdentity(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http })
    }
}

impl RpcTransport for HttpsTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| TransportError::Request {
            url: url.to_string(),
            message: format!("failed to read body: {e}"),
        })?;

        decode_body(url, status, &text)
    }
}

/// A JSON body is returned as-is, even on non-2xx statuses.
fn decode_body(url: &str, status: StatusCode, text: &str) -> Result<Value, TransportError> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Ok(value),
        Err(_) if !status.is_success() => Err(TransportError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: text.to_string(),
        }),
        Err(e) => Err(TransportError::InvalidJson {
            url: url.to_string(),
            message: e.to_string(),
        }),
    }
}
