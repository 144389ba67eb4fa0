// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! DataLayer store operations.
//!
//! - [`chunker`] splits a changelist into batches that fit the RPC payload
//!   ceiling, splitting oversized values into multipart parts.
//! - [`client`] looks up existing keys and submits batches with fees.

pub mod chunker;
pub mod client;

pub use chunker::{
    chunk_changelist, part_key, reassemble_multipart, ChunkError, ChunkSettings,
};
pub use client::{DataLayerClient, SubmissionReport, SubmitError};
