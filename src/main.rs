// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, path::Path, process::ExitCode, sync::Arc};

use datalayer_sync::{
    logging,
    models::Changelist,
    rpc::{format_mojos, HttpsTransport},
    ClientConfig, DataLayerClient, Error, Result,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const USAGE: &str = "usage: datalayer-sync <store-id> <changelist.json>";

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let [store_id, changelist_path] = args.as_slice() else {
        eprintln!("{USAGE}");
        return ExitCode::from(64);
    };

    match run(store_id, Path::new(changelist_path)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Sync failed");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(store_id: &str, changelist_path: &Path) -> Result<()> {
    let config = ClientConfig::from_env()?;
    info!(
        datalayer_host = %config.datalayer_host,
        wallet_host = %config.wallet_host,
        maximum_rpc_payload_size = config.maximum_rpc_payload_size,
        default_fee = %format_mojos(config.default_fee),
        "Configuration loaded"
    );

    let changelist = read_changelist(changelist_path)?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, abandoning pending readiness waits");
            signal_token.cancel();
        }
    });

    let transport = Arc::new(HttpsTransport::from_config(&config)?);
    let client = DataLayerClient::new(transport).with_shutdown(shutdown);

    if let Ok(network) = client.wallet().get_active_network(&config).await {
        info!(network = %network.network_name, "Connected to wallet");
    }

    let report = client
        .submit_changelist(store_id, &changelist, &config)
        .await?;
    info!(
        store_id = %store_id,
        batches = report.batches_submitted(),
        "Done"
    );
    Ok(())
}

fn read_changelist(path: &Path) -> Result<Changelist> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Changelist(format!("failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::Changelist(format!("failed to parse {}: {e}", path.display())))
}
