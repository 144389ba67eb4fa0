// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Changelist Data Models
//!
//! Wire types for DataLayer changelists. Keys and values are raw bytes in
//! memory; on the wire keys are `0x`-hex and values plain hex.
//!
//! ## Wire sizes
//!
//! Serialized field order is `action`, `key`, `value`, so the framed JSON
//! size of an item is fixed arithmetic over its key and value lengths:
//!
//! ```text
//! {"action":"delete","key":"0x<2k>"}                 30 + 2k
//! {"action":"insert","key":"0x<2k>","value":"<2v>"}  41 + 2k + 2v
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::codec;

/// Framed size of a delete item with an empty key.
pub const DELETE_FRAME_LEN: usize = 30;

/// Framed size of an insert item with an empty key and value.
pub const INSERT_FRAME_LEN: usize = 41;

/// Changelist action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Insert,
    Delete,
}

/// A single key-level mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelistItem {
    pub action: Action,
    #[serde(with = "codec::prefixed_hex")]
    pub key: Vec<u8>,
    #[serde(
        default,
        with = "codec::optional_hex",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Vec<u8>>,
}

impl ChangelistItem {
    pub fn insert(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            action: Action::Insert,
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        Self {
            action: Action::Delete,
            key: key.into(),
            value: None,
        }
    }

    /// Size used for batching: the hex length of the value when present,
    /// otherwise the full framed JSON size.
    pub fn encoded_size(&self) -> usize {
        match &self.value {
            Some(value) => value.len() * 2,
            None => self.framed_size(),
        }
    }

    /// Serialized JSON size of this item.
    pub fn framed_size(&self) -> usize {
        match &self.value {
            Some(value) => framed_insert_len(self.key.len(), value.len()),
            None => framed_delete_len(self.key.len()),
        }
    }
}

pub fn framed_delete_len(key_len: usize) -> usize {
    DELETE_FRAME_LEN + key_len * 2
}

pub fn framed_insert_len(key_len: usize, value_len: usize) -> usize {
    INSERT_FRAME_LEN + key_len * 2 + value_len * 2
}

/// Ordered changelist.
pub type Changelist = Vec<ChangelistItem>;

/// One independently submitted unit of a changelist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch(pub Vec<ChangelistItem>);

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: ChangelistItem) {
        self.0.push(item);
    }

    pub fn items(&self) -> &[ChangelistItem] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of item framed sizes.
    pub fn framed_size(&self) -> usize {
        self.0.iter().map(ChangelistItem::framed_size).sum()
    }
}

impl From<Vec<ChangelistItem>> for Batch {
    fn from(items: Vec<ChangelistItem>) -> Self {
        Self(items)
    }
}

/// Record stored at the original key of a split value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartManifest {
    #[serde(rename = "type")]
    pub kind: String,
    /// Decoded chunk keys in reassembly order
    pub parts: Vec<String>,
}

pub const MULTIPART_KIND: &str = "multipart";

impl MultipartManifest {
    pub fn new(parts: Vec<String>) -> Self {
        Self {
            kind: MULTIPART_KIND.to_string(),
            parts,
        }
    }

    /// Parse a stored value; `None` when it is not a multipart manifest.
    pub fn parse(value: &[u8]) -> Option<Self> {
        serde_json::from_slice::<Self>(value)
            .ok()
            .filter(|manifest| manifest.kind == MULTIPART_KIND)
    }
}

/// Keys already present in a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingKeys(HashSet<Vec<u8>>);

impl ExistingKeys {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from wire keys, skipping entries that are not valid hex.
    pub fn from_hex_keys<'a, I>(keys: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut set = HashSet::new();
        for key in keys {
            match codec::decode(key) {
                Ok(bytes) => {
                    set.insert(bytes);
                }
                Err(e) => tracing::warn!(key = %key, error = %e, "Ignoring non-hex store key"),
            }
        }
        Self(set)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.0.contains(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Vec<u8>> for ExistingKeys {
    fn from_iter<I: IntoIterator<Item = Vec<u8>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
