// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::config::ConfigError;
use crate::datalayer::{ChunkError, SubmitError};
use crate::rpc::RpcFailure;
use crate::tls::TlsError;

/// Top-level error for the sync binary and library callers that do not
/// need to match on a specific stage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("client identity: {0}")]
    Tls(#[from] TlsError),

    #[error("changelist: {0}")]
    Changelist(String),

    #[error("chunking: {0}")]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Rpc(#[from] RpcFailure),
}

impl Error {
    /// Process exit code for the sync binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Tls(_) | Self::Changelist(_) => 2,
            Self::Chunk(_) => 3,
            Self::Submit(_) | Self::Rpc(_) => 1,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
