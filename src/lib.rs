// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! DataLayer Sync - changelist submission client for a Chia DataLayer node
//!
//! Takes a logical changelist of key inserts and deletes for one store,
//! splits it into batches that fit the node's RPC payload ceiling, and submits
//! them in order once the wallet is synced and idle.
//!
//! ## Modules
//!
//! - `codec` - Hex encoding used on the wire
//! - `config` - Client configuration (JSON file and environment)
//! - `datalayer` - Chunking and store submission
//! - `logging` - Tracing subscriber setup
//! - `models` - Changelist wire types and size arithmetic
//! - `rpc` - Transport, wallet readiness, retrying caller, fee estimation
//! - `tls` - Node client certificate loading

pub mod codec;
pub mod config;
pub mod datalayer;
pub mod error;
pub mod logging;
pub mod models;
pub mod rpc;
pub mod tls;

pub use config::ClientConfig;
pub use datalayer::DataLayerClient;
pub use error::{Error, Result};
