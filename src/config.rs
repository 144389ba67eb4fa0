// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! [`ClientConfig`] is an explicit value passed into every operation. It can
//! be built from defaults, from a partial JSON document (missing keys keep
//! their defaults), and from environment variables layered on top.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATALAYER_CONFIG` | Path to a JSON config file (partial) | unset |
//! | `DATALAYER_HOST` | DataLayer RPC base URL | `https://localhost:8562` |
//! | `WALLET_HOST` | Wallet RPC base URL | `https://localhost:9256` |
//! | `FEE_ESTIMATE_HOST` | Fee oracle base URL | unset (use default fee) |
//! | `CERTIFICATE_FOLDER_PATH` | Node SSL folder | `~/.chia/mainnet/config/ssl` |
//! | `DEFAULT_WALLET_ID` | Wallet used for readiness checks | `1` |
//! | `DEFAULT_FEE` | Fee in mojos when no estimate is available | `300000000` |
//! | `DEFAULT_MIRROR_COIN_AMOUNT` | Mirror coin amount in mojos | `300000000` |
//! | `MAXIMUM_RPC_PAYLOAD_SIZE` | Batch ceiling in bytes | `26214400` |
//! | `OVERSIZE_SAFETY_MARGIN` | Headroom subtracted for split items | `1024` |
//! | `OVERSIZE_ORDERING` | `carry_pending` or `flush_pending` | `carry_pending` |
//! | `READINESS_POLL_INTERVAL_SECS` | Wallet readiness poll interval | `15` |
//! | `MAX_READINESS_POLLS` | Bound on readiness polls | unbounded |
//! | `REQUEST_TIMEOUT_SECS` | HTTP request timeout | `300` |
//! | `ACCEPT_INVALID_CERTS` | Skip server certificate verification | `true` |
//! | `CHIA_CERT_BASE64` / `CHIA_KEY_BASE64` | Client identity (see [`crate::tls`]) | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::{fmt, fs, path::Path, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

/// Environment variable holding the path of a JSON configuration file.
pub const CONFIG_PATH_ENV: &str = "DATALAYER_CONFIG";

pub const DEFAULT_DATALAYER_HOST: &str = "https://localhost:8562";
pub const DEFAULT_WALLET_HOST: &str = "https://localhost:9256";
pub const DEFAULT_CERTIFICATE_FOLDER: &str = "~/.chia/mainnet/config/ssl";

/// 25 MiB, the DataLayer RPC request ceiling.
pub const DEFAULT_MAXIMUM_RPC_PAYLOAD_SIZE: usize = 26_214_400;

/// Headroom reserved for key and framing overhead when splitting.
pub const DEFAULT_OVERSIZE_SAFETY_MARGIN: usize = 1024;

pub const DEFAULT_FEE_MOJOS: u64 = 300_000_000;
pub const DEFAULT_MIRROR_COIN_AMOUNT_MOJOS: u64 = 300_000_000;

const DEFAULT_READINESS_POLL_INTERVAL_SECS: u64 = 15;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Where pending items go when an oversized item is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizeOrdering {
    /// Keep the pending batch open and emit it after the split batches.
    #[default]
    CarryPending,
    /// Emit the pending batch before the split batches.
    FlushPending,
}

impl FromStr for OversizeOrdering {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "carry_pending" => Ok(Self::CarryPending),
            "flush_pending" => Ok(Self::FlushPending),
            other => Err(format!("unknown oversize ordering `{other}`")),
        }
    }
}

impl fmt::Display for OversizeOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CarryPending => write!(f, "carry_pending"),
            Self::FlushPending => write!(f, "flush_pending"),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// DataLayer RPC base URL
    pub datalayer_host: String,
    /// Wallet RPC base URL
    pub wallet_host: String,
    /// Fee oracle base URL; `None` always uses `default_fee`
    pub fee_estimate_host: Option<String>,
    /// Folder holding `data_layer/private_data_layer.{crt,key}`
    pub certificate_folder_path: String,
    pub default_wallet_id: u32,
    /// Fee in mojos
    pub default_fee: u64,
    /// Mirror coin amount in mojos
    pub default_mirror_coin_amount: u64,
    /// Batch ceiling in encoded bytes
    pub maximum_rpc_payload_size: usize,
    pub oversize_safety_margin: usize,
    pub oversize_ordering: OversizeOrdering,
    pub readiness_poll_interval_secs: u64,
    /// `None` polls until ready or cancelled
    pub max_readiness_polls: Option<u32>,
    pub request_timeout_secs: u64,
    /// Node RPC certificates are issued by the node's private CA.
    pub accept_invalid_certs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            datalayer_host: DEFAULT_DATALAYER_HOST.to_string(),
            wallet_host: DEFAULT_WALLET_HOST.to_string(),
            fee_estimate_host: None,
            certificate_folder_path: DEFAULT_CERTIFICATE_FOLDER.to_string(),
            default_wallet_id: 1,
            default_fee: DEFAULT_FEE_MOJOS,
            default_mirror_coin_amount: DEFAULT_MIRROR_COIN_AMOUNT_MOJOS,
            maximum_rpc_payload_size: DEFAULT_MAXIMUM_RPC_PAYLOAD_SIZE,
            oversize_safety_margin: DEFAULT_OVERSIZE_SAFETY_MARGIN,
            oversize_ordering: OversizeOrdering::default(),
            readiness_poll_interval_secs: DEFAULT_READINESS_POLL_INTERVAL_SECS,
            max_readiness_polls: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            accept_invalid_certs: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("invalid URL for {name}: {reason}")]
    InvalidUrl { name: &'static str, reason: String },
}

impl ClientConfig {
    /// Parse a partial JSON document; absent keys keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Read a partial JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Defaults, then the `DATALAYER_CONFIG` file if set, then individual
    /// environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = match env_optional(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.with_overrides(env_optional)?;
        config.validate()?;
        Ok(config)
    }

    /// Layer values from `lookup` (usually the environment) over `self`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DATALAYER_HOST") {
            self.datalayer_host = v;
        }
        if let Some(v) = lookup("WALLET_HOST") {
            self.wallet_host = v;
        }
        if let Some(v) = lookup("FEE_ESTIMATE_HOST") {
            self.fee_estimate_host = Some(v);
        }
        if let Some(v) = lookup("CERTIFICATE_FOLDER_PATH") {
            self.certificate_folder_path = v;
        }
        if let Some(v) = lookup("DEFAULT_WALLET_ID") {
            self.default_wallet_id = parse_value("DEFAULT_WALLET_ID", &v)?;
        }
        if let Some(v) = lookup("DEFAULT_FEE") {
            self.default_fee = parse_value("DEFAULT_FEE", &v)?;
        }
        if let Some(v) = lookup("DEFAULT_MIRROR_COIN_AMOUNT") {
            self.default_mirror_coin_amount = parse_value("DEFAULT_MIRROR_COIN_AMOUNT", &v)?;
        }
        if let Some(v) = lookup("MAXIMUM_RPC_PAYLOAD_SIZE") {
            self.maximum_rpc_payload_size = parse_value("MAXIMUM_RPC_PAYLOAD_SIZE", &v)?;
        }
        if let Some(v) = lookup("OVERSIZE_SAFETY_MARGIN") {
            self.oversize_safety_margin = parse_value("OVERSIZE_SAFETY_MARGIN", &v)?;
        }
        if let Some(v) = lookup("OVERSIZE_ORDERING") {
            self.oversize_ordering = parse_value("OVERSIZE_ORDERING", &v)?;
        }
        if let Some(v) = lookup("READINESS_POLL_INTERVAL_SECS") {
            self.readiness_poll_interval_secs = parse_value("READINESS_POLL_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = lookup("MAX_READINESS_POLLS") {
            self.max_readiness_polls = Some(parse_value("MAX_READINESS_POLLS", &v)?);
        }
        if let Some(v) = lookup("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_value("REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("ACCEPT_INVALID_CERTS") {
            self.accept_invalid_certs = parse_value("ACCEPT_INVALID_CERTS", &v)?;
        }
        Ok(self)
    }

    /// Check URLs and the payload ceiling.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("datalayer_host", &self.datalayer_host)?;
        validate_url("wallet_host", &self.wallet_host)?;
        if let Some(host) = &self.fee_estimate_host {
            validate_url("fee_estimate_host", host)?;
        }
        if self.maximum_rpc_payload_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "maximum_rpc_payload_size",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn datalayer_url(&self, endpoint: &str) -> String {
        join_endpoint(&self.datalayer_host, endpoint)
    }

    pub fn wallet_url(&self, endpoint: &str) -> String {
        join_endpoint(&self.wallet_host, endpoint)
    }

    pub fn fee_estimate_url(&self) -> Option<String> {
        self.fee_estimate_host
            .as_deref()
            .map(|host| join_endpoint(host, "get_fee_estimate"))
    }

    pub fn readiness_poll_interval(&self) -> Duration {
        Duration::from_secs(self.readiness_poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn join_endpoint(host: &str, endpoint: &str) -> String {
    format!("{}/{}", host.trim_end_matches('/'), endpoint.trim_start_matches('/'))
}

fn validate_url(name: &'static str, raw: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "https" | "http" => Ok(()),
        other => Err(ConfigError::InvalidUrl {
            name,
            reason: format!("unsupported scheme `{other}`"),
        }),
    }
}

fn parse_value<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
    })
}

/// Read a non-empty, trimmed environment variable.
pub(crate) fn env_optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
