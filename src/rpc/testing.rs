// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Scripted in-memory transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde_json::{json, Value};

use super::transport::{RpcTransport, TransportError};

#[derive(Default)]
struct Route {
    queued: VecDeque<Result<Value, TransportError>>,
    fallback: Option<Value>,
}

/// Routes by the last path segment of the URL. Queued responses are served
/// first, then the fallback response repeats.
#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wallet synced with no pending transactions.
    pub fn ready_wallet() -> Self {
        let mock = Self::new();
        mock.respond("get_sync_status", json!({"success": true, "synced": true}));
        mock.respond(
            "get_transactions",
            json!({"success": true, "transactions": [{"confirmed": true}]}),
        );
        mock
    }

    pub fn respond(&self, endpoint: &str, value: Value) {
        let mut routes = self.routes.lock().unwrap();
        routes.entry(endpoint.to_string()).or_default().fallback = Some(value);
    }

    pub fn enqueue(&self, endpoint: &str, response: Result<Value, TransportError>) {
        let mut routes = self.routes.lock().unwrap();
        routes
            .entry(endpoint.to_string())
            .or_default()
            .queued
            .push_back(response);
    }

    pub fn enqueue_error(&self, endpoint: &str) {
        self.enqueue(
            endpoint,
            Err(TransportError::Request {
                url: endpoint.to_string(),
                message: "connection refused".to_string(),
            }),
        );
    }

    /// Request bodies sent to `endpoint`, in order.
    pub fn calls_to(&self, endpoint: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(url, _)| endpoint_of(url) == endpoint)
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Endpoints called, in order.
    pub fn endpoints_called(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| endpoint_of(url).to_string())
            .collect()
    }
}

fn endpoint_of(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

impl RpcTransport for MockTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));

        let mut routes = self.routes.lock().unwrap();
        let Some(route) = routes.get_mut(endpoint_of(url)) else {
            return Err(TransportError::Request {
                url: url.to_string(),
                message: "no mock route".to_string(),
            });
        };
        if let Some(response) = route.queued.pop_front() {
            return response;
        }
        route.fallback.clone().ok_or_else(|| TransportError::Request {
            url: url.to_string(),
            message: "mock route exhausted".to_string(),
        })
    }
}
