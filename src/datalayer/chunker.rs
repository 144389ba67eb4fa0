// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Changelist Chunker
//!
//! Partitions a changelist into batches whose encoded size stays under the
//! RPC payload ceiling, preserving item order.
//!
//! ## Oversized items
//!
//! An item larger than the ceiling is split into parts stored under
//! `<key>.part<N>` (1-based), one batch per part, followed by a batch that
//! writes a [`MultipartManifest`] at the original key. A key that already
//! exists in the store is deleted first, since the store has no upsert.
//!
//! Part capacity is computed up front from the worst-case framing of a part
//! batch (delete plus insert of the longest part key), so every part batch
//! fits under the ceiling and no value bytes are dropped.
//!
//! ## Ordering
//!
//! With [`OversizeOrdering::CarryPending`] the batch being filled when an
//! oversized item arrives stays open and is emitted after the split batches.
//! [`OversizeOrdering::FlushPending`] emits it first.

use std::mem;

use tracing::info;

use crate::codec;
use crate::config::{ClientConfig, OversizeOrdering};
use crate::models::{
    framed_delete_len, framed_insert_len, Batch, ChangelistItem, ExistingKeys, MultipartManifest,
};

const PART_SEPARATOR: &str = ".part";

/// Chunking parameters taken from [`ClientConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSettings {
    /// Batch ceiling in encoded bytes
    pub ceiling: usize,
    /// Headroom subtracted from the ceiling when splitting
    pub safety_margin: usize,
    pub ordering: OversizeOrdering,
}

impl ChunkSettings {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            ceiling: config.maximum_rpc_payload_size,
            safety_margin: config.oversize_safety_margin,
            ordering: config.oversize_ordering,
        }
    }

    /// Ceiling minus the safety margin.
    pub fn effective_max(&self) -> usize {
        self.ceiling.saturating_sub(self.safety_margin)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("maximum RPC payload size must be positive")]
    ZeroCeiling,

    #[error("item {key} exceeds the payload ceiling and has no value to split")]
    Unsplittable { key: String },

    #[error("oversized item {key} cannot be split: key is not valid UTF-8")]
    NonUtf8Key { key: String },

    #[error("no room for parts of {key}: ceiling {ceiling}, safety margin {margin}, framing {overhead}")]
    NoPartCapacity {
        key: String,
        ceiling: usize,
        margin: usize,
        overhead: usize,
    },

    #[error("failed to encode multipart manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("multipart part {0} is missing")]
    MissingPart(String),
}

/// Split `changelist` into ordered batches.
pub fn chunk_changelist(
    changelist: &[ChangelistItem],
    existing: &ExistingKeys,
    settings: &ChunkSettings,
) -> Result<Vec<Batch>, ChunkError> {
    if settings.ceiling == 0 {
        return Err(ChunkError::ZeroCeiling);
    }

    let mut batches = Vec::new();
    let mut pending = Batch::new();
    let mut size_counter = 0usize;

    for item in changelist {
        let item_size = item.encoded_size();

        if item_size > settings.ceiling {
            if settings.ordering == OversizeOrdering::FlushPending && !pending.is_empty() {
                batches.push(mem::take(&mut pending));
            }
            batches.extend(split_oversized_item(item, item_size, existing, settings)?);
            size_counter = 0;
        } else if size_counter + item_size <= settings.ceiling {
            pending.push(item.clone());
            size_counter += item_size;
        } else {
            batches.push(mem::replace(&mut pending, Batch::from(vec![item.clone()])));
            size_counter = item_size;
        }
    }

    if !pending.is_empty() {
        batches.push(pending);
    }

    Ok(batches)
}

/// Split one oversized item into part batches followed by a manifest batch.
pub fn split_oversized_item(
    item: &ChangelistItem,
    item_size: usize,
    existing: &ExistingKeys,
    settings: &ChunkSettings,
) -> Result<Vec<Batch>, ChunkError> {
    let Some(value) = item.value.as_deref().filter(|v| !v.is_empty()) else {
        return Err(ChunkError::Unsplittable {
            key: String::from_utf8_lossy(&item.key).into_owned(),
        });
    };
    // Manifest part names are strings, so part keys must round-trip as UTF-8.
    let decoded_key = std::str::from_utf8(&item.key)
        .map_err(|_| ChunkError::NonUtf8Key {
            key: codec::encode_prefixed(&item.key),
        })?
        .to_owned();

    let capacity = part_capacity(&item.key, value.len(), settings)?;
    let part_count = value.len().div_ceil(capacity);

    info!(
        key = %decoded_key,
        item_size,
        parts = part_count,
        part_capacity = capacity,
        "Chunking oversized item"
    );

    let mut batches = Vec::with_capacity(part_count + 1);
    let mut part_names = Vec::with_capacity(part_count);

    for (index, slice) in value.chunks(capacity).enumerate() {
        let key = part_key(&item.key, index + 1);
        let mut batch = Batch::new();
        if existing.contains(&key) {
            info!(key = %String::from_utf8_lossy(&key), "Updating existing key");
            batch.push(ChangelistItem::delete(key.clone()));
        }
        part_names.push(format!("{decoded_key}{PART_SEPARATOR}{}", index + 1));
        batch.push(ChangelistItem::insert(key, slice.to_vec()));
        batches.push(batch);
    }

    let mut manifest_batch = Batch::new();
    if existing.contains(&item.key) {
        info!(key = %decoded_key, "Updating existing key");
        manifest_batch.push(ChangelistItem::delete(item.key.clone()));
    }
    let manifest = serde_json::to_vec(&MultipartManifest::new(part_names))?;
    manifest_batch.push(ChangelistItem::insert(item.key.clone(), manifest));
    batches.push(manifest_batch);

    Ok(batches)
}

/// Key of part `part` (1-based) of `key`.
pub fn part_key(key: &[u8], part: usize) -> Vec<u8> {
    let mut derived = key.to_vec();
    derived.extend_from_slice(format!("{PART_SEPARATOR}{part}").as_bytes());
    derived
}

/// Raw bytes per part for a value of `value_len` bytes under `key`.
///
/// The wire capacity is the effective max, further reduced when the framing
/// of a delete plus an insert of the longest part key does not fit in the
/// safety margin. Values are hex on the wire, so raw capacity is half,
/// rounded down: an odd wire capacity leaves one hex digit unused, which can
/// add one part over `ceil(2 * value_len / effective_max)`.
pub fn part_capacity(
    key: &[u8],
    value_len: usize,
    settings: &ChunkSettings,
) -> Result<usize, ChunkError> {
    let effective_max = settings.effective_max();

    // Part key length depends on the digit count of the last part index,
    // which depends on the capacity; iterate to a fixed point.
    let mut digits = decimal_digits(value_len.div_ceil((effective_max / 2).max(1)).max(1));
    loop {
        let part_key_len = key.len() + PART_SEPARATOR.len() + digits;
        let overhead = framed_delete_len(part_key_len) + framed_insert_len(part_key_len, 0);
        let wire_capacity = effective_max.min(settings.ceiling.saturating_sub(overhead));
        let capacity = wire_capacity / 2;

        if capacity == 0 {
            return Err(ChunkError::NoPartCapacity {
                key: String::from_utf8_lossy(key).into_owned(),
                ceiling: settings.ceiling,
                margin: settings.safety_margin,
                overhead,
            });
        }

        let needed = decimal_digits(value_len.div_ceil(capacity).max(1));
        if needed <= digits {
            return Ok(capacity);
        }
        digits = needed;
    }
}

fn decimal_digits(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// Rebuild a split value from its manifest; `lookup` resolves a part key to
/// its stored bytes.
pub fn reassemble_multipart<F>(
    manifest: &MultipartManifest,
    mut lookup: F,
) -> Result<Vec<u8>, ChunkError>
where
    F: FnMut(&[u8]) -> Option<Vec<u8>>,
{
    let mut value = Vec::new();
    for part in &manifest.parts {
        let bytes = lookup(part.as_bytes()).ok_or_else(|| ChunkError::MissingPart(part.clone()))?;
        value.extend_from_slice(&bytes);
    }
    Ok(value)
}
