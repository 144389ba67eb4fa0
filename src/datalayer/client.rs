// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! DataLayer store client: existing-key lookup, fee-bearing batch updates,
//! and whole-changelist submission.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::chunker::{chunk_changelist, ChunkError, ChunkSettings};
use crate::config::ClientConfig;
use crate::models::{Batch, ChangelistItem, ExistingKeys};
use crate::rpc::{
    merge_params, Fallback, FeeEstimator, RpcCaller, RpcFailure, RpcTransport, WalletClient,
};

/// Outcome of a fully applied changelist.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReport {
    /// One response per submitted batch, in order
    pub responses: Vec<Value>,
}

impl SubmissionReport {
    pub fn batches_submitted(&self) -> usize {
        self.responses.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Chunk(#[from] ChunkError),

    /// Batches before `index` were applied; the rest were not sent.
    #[error("batch {} of {total} failed after {applied} applied: {failure}", .index + 1)]
    Batch {
        index: usize,
        total: usize,
        applied: usize,
        #[source]
        failure: RpcFailure,
    },
}

/// Client for one DataLayer node.
pub struct DataLayerClient<T> {
    caller: RpcCaller<T>,
    fees: FeeEstimator<T>,
}

impl<T> Clone for DataLayerClient<T> {
    fn clone(&self) -> Self {
        Self {
            caller: self.caller.clone(),
            fees: self.fees.clone(),
        }
    }
}

impl<T: RpcTransport> DataLayerClient<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            fees: FeeEstimator::new(Arc::clone(&transport)),
            caller: RpcCaller::new(transport),
        }
    }

    /// Cancel readiness waits of every call when `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.caller = self.caller.with_shutdown(shutdown);
        self
    }

    pub fn wallet(&self) -> &WalletClient<T> {
        self.caller.wallet()
    }

    /// Keys currently stored in `store_id`. A successful response without a
    /// `keys` array yields an empty set.
    pub async fn get_keys(
        &self,
        store_id: &str,
        config: &ClientConfig,
    ) -> Result<ExistingKeys, RpcFailure> {
        Ok(self.fetch_keys(store_id, config).await?.unwrap_or_default())
    }

    /// `None` when the node answered without a `keys` array.
    async fn fetch_keys(
        &self,
        store_id: &str,
        config: &ClientConfig,
    ) -> Result<Option<ExistingKeys>, RpcFailure> {
        let response = self
            .caller
            .call_default(&config.datalayer_url("get_keys"), &json!({ "id": store_id }), config)
            .await?;

        let keys = response
            .get("keys")
            .and_then(Value::as_array)
            .map(|keys| ExistingKeys::from_hex_keys(keys.iter().filter_map(Value::as_str)));
        if keys.is_none() {
            warn!(store_id = %store_id, response = %response, "get_keys response has no keys array");
        }
        Ok(keys)
    }

    /// Existing keys, or an empty set flagged as degraded when the lookup
    /// fails or returns no key list.
    pub async fn existing_keys_or_empty(
        &self,
        store_id: &str,
        config: &ClientConfig,
    ) -> Fallback<ExistingKeys> {
        match self.fetch_keys(store_id, config).await {
            Ok(Some(keys)) => Fallback::fresh(keys),
            Ok(None) => Fallback::degraded(ExistingKeys::empty()),
            Err(failure) => {
                warn!(
                    store_id = %store_id,
                    error = %failure,
                    "Existing key lookup failed, chunking without delete-before-insert"
                );
                Fallback::degraded(ExistingKeys::empty())
            }
        }
    }

    /// Partition `changelist` into batches for `store_id`.
    pub async fn chunk(
        &self,
        store_id: &str,
        changelist: &[ChangelistItem],
        config: &ClientConfig,
    ) -> Result<Vec<Batch>, ChunkError> {
        let existing = self.existing_keys_or_empty(store_id, config).await;
        let batches =
            chunk_changelist(changelist, &existing.value, &ChunkSettings::from_config(config))?;

        info!(
            store_id = %store_id,
            items = changelist.len(),
            batches = batches.len(),
            existing_keys = existing.value.len(),
            degraded = existing.degraded,
            "Chunked changelist"
        );
        Ok(batches)
    }

    /// Apply one batch to `store_id`, paying the estimated fee.
    pub async fn batch_update(
        &self,
        store_id: &str,
        batch: &Batch,
        config: &ClientConfig,
    ) -> Result<Value, RpcFailure> {
        let fee = self.fees.estimate(config).await;
        let params = merge_params(
            json!({ "id": store_id, "changelist": batch }),
            [("fee".to_string(), json!(fee))],
        );
        self.caller
            .call_default(&config.datalayer_url("batch_update"), &params, config)
            .await
    }

    /// Chunk `changelist` and submit every batch in order, stopping at the
    /// first batch that fails permanently.
    pub async fn submit_changelist(
        &self,
        store_id: &str,
        changelist: &[ChangelistItem],
        config: &ClientConfig,
    ) -> Result<SubmissionReport, SubmitError> {
        let batches = self.chunk(store_id, changelist, config).await?;
        let total = batches.len();
        let mut responses = Vec::with_capacity(total);

        for (index, batch) in batches.iter().enumerate() {
            info!(
                store_id = %store_id,
                batch = index + 1,
                total,
                items = batch.len(),
                "Submitting batch"
            );

            match self.batch_update(store_id, batch, config).await {
                Ok(response) => responses.push(response),
                Err(failure) => {
                    return Err(SubmitError::Batch {
                        index,
                        total,
                        applied: index,
                        failure,
                    });
                }
            }
        }

        info!(store_id = %store_id, batches = total, "Changelist submitted");
        Ok(SubmissionReport { responses })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::models::{Action, MultipartManifest};
    use crate::rpc::testing::MockTransport;
    use crate::rpc::NO_OP_CHANGELIST_ERROR;

    const STORE: &str = "8f6ed792bbbf5216f8e55064793f74ce01286b9c1d542cc4a357cf7f8712df1d";

    fn client(mock: MockTransport) -> (DataLayerClient<MockTransport>, Arc<MockTransport>) {
        let mock = Arc::new(mock);
        (DataLayerClient::new(Arc::clone(&mock)), mock)
    }

    fn small_config() -> ClientConfig {
        let mut config = ClientConfig::default();
        config.maximum_rpc_payload_size = 1000;
        config.oversize_safety_margin = 100;
        config.default_fee = 50;
        config
    }

    #[tokio::test]
    async fn get_keys_decodes_wire_keys() {
        let (client, mock) = client(MockTransport::ready_wallet());
        mock.respond(
            "get_keys",
            json!({"success": true, "keys": ["0x6b", "0x6b2e7061727431"]}),
        );

        let keys = client.get_keys(STORE, &ClientConfig::default()).await.unwrap();
        assert!(keys.contains(b"k"));
        assert!(keys.contains(b"k.part1"));
        assert_eq!(mock.calls_to("get_keys"), vec![json!({"id": STORE})]);
    }

    #[tokio::test]
    async fn existing_keys_lookup_failure_degrades_to_empty() {
        let (client, mock) = client(MockTransport::ready_wallet());
        mock.respond("get_keys", json!({"success": false, "error": "store not found"}));

        let keys = client.existing_keys_or_empty(STORE, &small_config()).await;
        assert!(keys.degraded);
        assert!(keys.value.is_empty());
        assert_eq!(mock.calls_to("get_keys").len(), 10);
    }

    #[tokio::test]
    async fn missing_keys_array_is_empty_but_degraded() {
        let (client, mock) = client(MockTransport::ready_wallet());
        mock.respond("get_keys", json!({"success": true}));

        let keys = client.get_keys(STORE, &small_config()).await.unwrap();
        assert!(keys.is_empty());

        let keys = client.existing_keys_or_empty(STORE, &small_config()).await;
        assert!(keys.degraded);
        assert!(keys.value.is_empty());
        assert_eq!(mock.calls_to("get_keys").len(), 2);
    }

    #[tokio::test]
    async fn chunk_uses_existing_keys_for_delete_before_insert() {
        let (client, mock) = client(MockTransport::ready_wallet());
        mock.respond(
            "get_keys",
            json!({"success": true, "keys": [codec::encode_prefixed(b"img.part1")]}),
        );

        let item = ChangelistItem::insert(b"img".to_vec(), vec![9u8; 1250]);
        let batches = client.chunk(STORE, &[item], &small_config()).await.unwrap();

        assert_eq!(batches.len(), 4);
        assert_eq!(batches[0].items()[0], ChangelistItem::delete(b"img.part1".to_vec()));
        assert_eq!(batches[0].items()[1].action, Action::Insert);
        assert_eq!(batches[1].len(), 1);
    }

    #[tokio::test]
    async fn batch_update_sends_changelist_with_fee() {
        let (client, mock) = client(MockTransport::ready_wallet());
        mock.respond("batch_update", json!({"success": true, "tx_id": "0x01"}));

        let batch = Batch::from(vec![
            ChangelistItem::insert(b"a".to_vec(), b"1".to_vec()),
            ChangelistItem::delete(b"b".to_vec()),
        ]);
        let response = client.batch_update(STORE, &batch, &small_config()).await.unwrap();

        assert_eq!(response["tx_id"], "0x01");
        assert_eq!(
            mock.calls_to("batch_update"),
            vec![json!({
                "id": STORE,
                "changelist": [
                    {"action": "insert", "key": "0x61", "value": "31"},
                    {"action": "delete", "key": "0x62"}
                ],
                "fee": 50
            })]
        );
    }

    #[tokio::test]
    async fn submit_changelist_sends_parts_then_manifest() {
        let (client, mock) = client(MockTransport::ready_wallet());
        mock.respond("get_keys", json!({"success": true, "keys": []}));
        mock.respond("batch_update", json!({"success": true}));

        let value: Vec<u8> = (0..1250u32).map(|i| (i % 256) as u8).collect();
        let changelist = vec![ChangelistItem::insert(b"k".to_vec(), value.clone())];
        let report = client
            .submit_changelist(STORE, &changelist, &small_config())
            .await
            .unwrap();

        assert_eq!(report.batches_submitted(), 4);

        let sent = mock.calls_to("batch_update");
        let keys: Vec<&str> = sent
            .iter()
            .map(|body| body["changelist"][0]["key"].as_str().unwrap())
            .collect();
        assert_eq!(
            keys,
            vec![
                codec::encode_prefixed(b"k.part1"),
                codec::encode_prefixed(b"k.part2"),
                codec::encode_prefixed(b"k.part3"),
                codec::encode_prefixed(b"k"),
            ]
        );

        let manifest_hex = sent[3]["changelist"][0]["value"].as_str().unwrap();
        let manifest = MultipartManifest::parse(&codec::decode(manifest_hex).unwrap()).unwrap();
        assert_eq!(manifest.parts, vec!["k.part1", "k.part2", "k.part3"]);

        let rebuilt: Vec<u8> = sent[..3]
            .iter()
            .flat_map(|body| codec::decode(body["changelist"][0]["value"].as_str().unwrap()).unwrap())
            .collect();
        assert_eq!(rebuilt, value);
    }

    #[tokio::test]
    async fn submit_changelist_treats_no_op_as_applied() {
        let (client, mock) = client(MockTransport::ready_wallet());
        mock.respond("get_keys", json!({"success": true, "keys": ["0x61"]}));
        mock.respond(
            "batch_update",
            json!({"success": false, "error": NO_OP_CHANGELIST_ERROR}),
        );

        let report = client
            .submit_changelist(
                STORE,
                &[ChangelistItem::insert(b"a".to_vec(), b"same".to_vec())],
                &small_config(),
            )
            .await
            .unwrap();
        assert_eq!(report.responses[0]["message"], NO_OP_CHANGELIST_ERROR);
    }

    #[tokio::test]
    async fn submit_changelist_stops_at_first_failed_batch() {
        let (client, mock) = client(MockTransport::ready_wallet());
        mock.respond("get_keys", json!({"success": true, "keys": []}));
        mock.enqueue("batch_update", Ok(json!({"success": true})));
        mock.respond("batch_update", json!({"success": false, "error": "insufficient funds"}));

        let changelist = vec![ChangelistItem::insert(b"k".to_vec(), vec![1u8; 1250])];
        let err = client
            .submit_changelist(STORE, &changelist, &small_config())
            .await
            .unwrap_err();

        match err {
            SubmitError::Batch {
                index,
                total,
                applied,
                failure,
            } => {
                assert_eq!((index, total, applied), (1, 4, 1));
                assert!(failure.error.contains("insufficient funds"));
            }
            other => panic!("unexpected error: {other}"),
        }
        // One success plus ten attempts on the failing batch; the manifest is
        // never sent.
        assert_eq!(mock.calls_to("batch_update").len(), 11);
    }

    #[tokio::test]
    async fn submit_empty_changelist_sends_nothing() {
        let (client, mock) = client(MockTransport::ready_wallet());
        mock.respond("get_keys", json!({"success": true, "keys": []}));

        let report = client
            .submit_changelist(STORE, &[], &small_config())
            .await
            .unwrap();
        assert_eq!(report.batches_submitted(), 0);
        assert!(mock.calls_to("batch_update").is_empty());
    }
}
