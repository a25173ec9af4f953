// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for iqfan.
//!
//! Config is loaded from the `[iqfan-server]` section of `iqfan.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./iqfan.toml`
//! 3. `~/.config/iqfan/iqfan.toml`
//! 4. `/etc/iqfan/iqfan.toml`

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use iqfan_app::ConfigFile;
use iqfan_core::{
    ChainConfig, Decimation, DistributorConfig, OverflowPolicy, SinkConfig, SourceKind,
};
use iqfan_dsp::{DemodMode, WordType};
use serde::{Deserialize, Serialize};

/// Accepted `block_exponent` range: one IQ pair up to 16 Mi samples per read.
const MIN_BLOCK_EXPONENT: u32 = 1;
const MAX_BLOCK_EXPONENT: u32 = 24;

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Sample source and distributor tuning
    pub source: SourceConfig,
    /// One entry per demodulation chain
    pub chains: Vec<ChainConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    #[default]
    Stdin,
    File,
    Tcp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: InputKind,
    /// Capture file, for `kind = "file"`
    pub path: Option<PathBuf>,
    /// `host:port` of a raw sample relay, for `kind = "tcp"`
    pub addr: Option<String>,
    /// Sample word type, e.g. `>i2`, `<u1`, `float32`
    pub word_type: WordType,
    /// Each read is `1 << block_exponent` samples
    pub block_exponent: u32,
    /// Per-chain channel depth in blocks
    pub channel_capacity: usize,
    /// `drop` or `block` at a full chain channel; files block, live sources drop
    pub overflow: Option<OverflowPolicy>,
    /// How often blocking waits re-check for shutdown
    pub poll_interval_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        let dist = DistributorConfig::default();
        Self {
            kind: InputKind::Stdin,
            path: None,
            addr: None,
            word_type: dist.word_type,
            block_exponent: dist.block_exponent,
            channel_capacity: 16,
            overflow: None,
            poll_interval_ms: dist.poll_interval.as_millis() as u64,
        }
    }
}

impl SourceConfig {
    pub fn source_kind(&self) -> Result<SourceKind, String> {
        match self.kind {
            InputKind::Stdin => Ok(SourceKind::Stdin),
            InputKind::File => self
                .path
                .clone()
                .map(|path| SourceKind::File { path })
                .ok_or_else(|| "[source].path is required when kind = \"file\"".to_string()),
            InputKind::Tcp => self
                .addr
                .clone()
                .map(|addr| SourceKind::Tcp { addr })
                .ok_or_else(|| "[source].addr is required when kind = \"tcp\"".to_string()),
        }
    }

    pub fn overflow(&self) -> OverflowPolicy {
        self.overflow.unwrap_or(match self.kind {
            InputKind::File => OverflowPolicy::Block,
            InputKind::Stdin | InputKind::Tcp => OverflowPolicy::Drop,
        })
    }

    pub fn distributor_config(&self) -> DistributorConfig {
        DistributorConfig {
            word_type: self.word_type,
            block_exponent: self.block_exponent,
            overflow: self.overflow(),
            poll_interval: self.poll_interval(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ServerConfig {
    /// Problems that stop the whole server, in file order.
    ///
    /// Per-chain problems are left to [`ServerConfig::partition_chains`].
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Err(e) = validate_log_level(self.general.log_level.as_deref()) {
            errors.push(e);
        }
        if let Err(e) = self.source.source_kind() {
            errors.push(e);
        }
        if !(MIN_BLOCK_EXPONENT..=MAX_BLOCK_EXPONENT).contains(&self.source.block_exponent) {
            errors.push(format!(
                "[source].block_exponent must be between {} and {}",
                MIN_BLOCK_EXPONENT, MAX_BLOCK_EXPONENT
            ));
        }
        if self.source.channel_capacity == 0 {
            errors.push("[source].channel_capacity must be > 0".to_string());
        }
        if self.source.poll_interval_ms == 0 {
            errors.push("[source].poll_interval_ms must be > 0".to_string());
        }
        if self.chains.is_empty() {
            errors.push("no chains configured; use --mode or add [[chains]]".to_string());
        }
        errors
    }

    /// Split the chains into those that can start and one message per chain
    /// that cannot.
    ///
    /// Ids and outputs are checked against the chains accepted before, so
    /// the first of two clashing chains still runs.
    pub fn partition_chains(&self) -> (Vec<ChainConfig>, Vec<String>) {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        let mut ids = HashSet::new();
        let mut outputs = HashSet::new();
        for chain in &self.chains {
            if ids.contains(chain.id.as_str()) {
                rejected.push(format!("[{}] duplicate chain id", chain.id));
                continue;
            }
            if let Err(e) = chain.validate() {
                rejected.push(e.to_string());
                continue;
            }
            // One writer per output.
            let labels: Vec<String> = match &chain.vfo_offsets_hz {
                Some(offsets) => (0..offsets.len())
                    .map(|n| chain.sink.for_vfo(n).to_string())
                    .collect(),
                None => vec![chain.sink.to_string()],
            };
            if let Some(taken) = labels.iter().find(|label| outputs.contains(label.as_str())) {
                rejected.push(format!("[{}] {} is already used by another chain", chain.id, taken));
                continue;
            }
            ids.insert(chain.id.as_str());
            outputs.extend(labels);
            accepted.push(chain.clone());
        }
        (accepted, rejected)
    }

    /// Generate an example configuration under the `[iqfan-server]` header.
    pub fn example_toml() -> String {
        #[derive(serde::Serialize)]
        struct Wrapper {
            #[serde(rename = "iqfan-server")]
            inner: ServerConfig,
        }
        let example = ServerConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            source: SourceConfig {
                kind: InputKind::File,
                path: Some(PathBuf::from("capture.iq")),
                ..Default::default()
            },
            chains: vec![
                ChainConfig {
                    id: "broadcast".to_string(),
                    sample_rate: 2_400_000,
                    decimation: Decimation::Factor(8),
                    center_offset_hz: -250_000.0,
                    tuned_freq_hz: 98_100_000.0,
                    mode: Some(DemodMode::Wfm),
                    output_cutoff_hz: 15_000,
                    sink: SinkConfig::File {
                        path: PathBuf::from("broadcast.f64"),
                    },
                    ..Default::default()
                },
                ChainConfig {
                    id: "airband".to_string(),
                    sample_rate: 2_400_000,
                    center_offset_hz: 300_000.0,
                    mode: Some(DemodMode::Am),
                    vfo_offsets_hz: Some(vec![0.0, 25_000.0, -25_000.0]),
                    sink: SinkConfig::Pipe {
                        path: PathBuf::from("/tmp/airband"),
                    },
                    ..Default::default()
                },
            ],
        };
        toml::to_string_pretty(&Wrapper { inner: example }).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "iqfan-server"
    }
}
