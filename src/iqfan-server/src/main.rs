// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;

use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam::channel::{self, Receiver};
use tokio::signal;
use tracing::{error, info, warn};

use iqfan_app::{init_logging, ConfigFile};
use iqfan_core::{
    parse_offsets, ChainConfig, ChainPlan, ChainRunner, Decimation, Distributor, DynResult,
    Liveness, PipelineResult, SampleBlock, SinkConfig, TerminationCause,
};
use iqfan_dsp::{DemodMode, WordType};

use config::{InputKind, ServerConfig};

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - IQ sample fan-out and demodulation");
/// How long to wait for the distributor once every chain has stopped.
const DISTRIBUTOR_GRACE: Duration = Duration::from_millis(400);
/// How long chains get to drain after Ctrl+C before they are left behind.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);
const JOIN_POLL: Duration = Duration::from_millis(50);
const CLI_CHAIN_ID: &str = "cli";

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Read samples from FILE ("-" for stdin)
    #[arg(short = 'i', long = "input", value_name = "FILE", conflicts_with = "tcp")]
    input: Option<PathBuf>,
    /// Read samples from a raw TCP relay
    #[arg(long = "tcp", value_name = "HOST:PORT")]
    tcp: Option<String>,
    /// Sample word type (e.g. >i2, <u1, f4, int16)
    #[arg(short = 'w', long = "word-type")]
    word_type: Option<WordType>,
    /// Input sample rate in Hz
    #[arg(short = 's', long = "sample-rate")]
    sample_rate: Option<u32>,
    /// Decimation factor (power of two) or "auto"
    #[arg(short = 'd', long = "decimation")]
    decimation: Option<Decimation>,
    /// Offset of the wanted signal from the capture centre, in Hz
    #[arg(short = 'o', long = "offset", allow_hyphen_values = true)]
    offset: Option<f64>,
    /// Tuned frequency in Hz (informational)
    #[arg(short = 'f', long = "freq")]
    freq: Option<f64>,
    /// Demodulator: fm, nfm, wfm, am, real, imag.
    /// Builds a single chain from the command line, replacing configured chains.
    #[arg(short = 'm', long = "mode")]
    mode: Option<DemodMode>,
    /// Scale IQ samples to unit magnitude before shifting
    #[arg(short = 'n', long = "normalize")]
    normalize: bool,
    /// Output low-pass cutoff in Hz
    #[arg(long = "cutoff")]
    cutoff: Option<u32>,
    /// Comma-separated VFO offsets in Hz relative to the shifted centre
    #[arg(long = "vfos", value_name = "LIST", allow_hyphen_values = true)]
    vfos: Option<String>,
    /// Write demodulated doubles to FILE
    #[arg(long = "output", value_name = "FILE", conflicts_with = "pipe")]
    output: Option<PathBuf>,
    /// Write demodulated doubles to a named pipe
    #[arg(long = "pipe", value_name = "PATH")]
    pipe: Option<PathBuf>,
    /// Remove the DC offset drift with the IQ corrector
    #[arg(long = "iq-correction")]
    iq_correction: bool,
    /// Carry the shifter phase across blocks
    #[arg(long = "continuous-phase")]
    continuous_phase: bool,
    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long = "log-level")]
    log_level: Option<String>,
}

/// Build the single chain described by the command line.
fn chain_from_cli(cli: &Cli, mode: DemodMode) -> DynResult<ChainConfig> {
    let defaults = ChainConfig::default();
    let vfo_offsets_hz = cli.vfos.as_deref().map(parse_offsets).transpose()?;
    let sink = match (&cli.output, &cli.pipe) {
        (Some(path), _) => SinkConfig::File { path: path.clone() },
        (None, Some(path)) => SinkConfig::Pipe { path: path.clone() },
        (None, None) => SinkConfig::Stdout,
    };
    Ok(ChainConfig {
        id: CLI_CHAIN_ID.to_string(),
        sample_rate: cli.sample_rate.unwrap_or(defaults.sample_rate),
        decimation: cli.decimation.unwrap_or(defaults.decimation),
        center_offset_hz: cli.offset.unwrap_or(defaults.center_offset_hz),
        tuned_freq_hz: cli.freq.unwrap_or(defaults.tuned_freq_hz),
        vfo_offsets_hz,
        mode: Some(mode),
        normalize: cli.normalize,
        output_cutoff_hz: cli.cutoff.unwrap_or(defaults.output_cutoff_hz),
        iq_correction: cli.iq_correction,
        continuous_phase: cli.continuous_phase,
        sink,
        ..defaults
    })
}

/// Merge CLI overrides into the file configuration.
fn resolve_config(cli: &Cli, mut cfg: ServerConfig) -> DynResult<ServerConfig> {
    if let Some(level) = &cli.log_level {
        cfg.general.log_level = Some(level.clone());
    }

    if let Some(path) = &cli.input {
        if path.as_os_str() == "-" {
            cfg.source.kind = InputKind::Stdin;
        } else {
            cfg.source.kind = InputKind::File;
            cfg.source.path = Some(path.clone());
        }
    } else if let Some(addr) = &cli.tcp {
        cfg.source.kind = InputKind::Tcp;
        cfg.source.addr = Some(addr.clone());
    }
    if let Some(word_type) = cli.word_type {
        cfg.source.word_type = word_type;
    }

    if let Some(mode) = cli.mode {
        cfg.chains = vec![chain_from_cli(cli, mode)?];
    }
    Ok(cfg)
}

/// Open the chain's sinks and run it on a thread named `chain-<id>`.
///
/// Sinks are opened on the chain thread since a pipe blocks until a reader
/// attaches.
fn spawn_chain(
    plan: ChainPlan,
    rx: Receiver<SampleBlock>,
    block_hint: usize,
    liveness: Liveness,
    poll: Duration,
) -> std::io::Result<JoinHandle<PipelineResult<()>>> {
    std::thread::Builder::new()
        .name(format!("chain-{}", plan.id()))
        .spawn(move || {
            let mut runner = match ChainRunner::open(&plan, block_hint, liveness, poll) {
                Ok(runner) => runner,
                Err(e) if e.is_termination() => {
                    info!("[{}] stopped before its sinks opened", plan.id());
                    return Ok(());
                }
                Err(e) => {
                    error!("[{}] failed to open {}: {}", plan.id(), plan.config.sink, e);
                    return Err(e);
                }
            };
            runner.run(rx)
        })
}

type ChainHandle = (String, JoinHandle<PipelineResult<()>>);

/// Join the chains whose threads have finished; returns how many failed.
fn reap_finished(handles: &mut Vec<ChainHandle>) -> usize {
    let mut failed = 0;
    let (done, running): (Vec<_>, Vec<_>) = handles.drain(..).partition(|(_, h)| h.is_finished());
    *handles = running;
    for (id, handle) in done {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(_)) => failed += 1,
            Err(_) => {
                error!("[{}] chain thread panicked", id);
                failed += 1;
            }
        }
    }
    failed
}

/// Wait for every chain, or after Ctrl+C for at most [`SHUTDOWN_GRACE`].
///
/// Chains still running at the deadline are detached. Returns how many
/// chains failed.
async fn wait_for_chains(mut handles: Vec<ChainHandle>, liveness: &Liveness) -> DynResult<usize> {
    let mut failed = 0;
    let mut deadline: Option<Instant> = None;
    let mut ctrl_c = std::pin::pin!(signal::ctrl_c());
    loop {
        failed += reap_finished(&mut handles);
        if handles.is_empty() {
            return Ok(failed);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            for (id, _) in &handles {
                warn!("[{}] did not stop within {:?}, leaving it behind", id, SHUTDOWN_GRACE);
            }
            return Ok(failed);
        }
        tokio::select! {
            res = &mut ctrl_c, if deadline.is_none() => {
                res?;
                info!("Ctrl+C received, shutting down ({})", TerminationCause::Interrupt);
                liveness.halt();
                deadline = Some(Instant::now() + SHUTDOWN_GRACE);
            }
            _ = tokio::time::sleep(JOIN_POLL) => {}
        }
    }
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_toml());
        return Ok(());
    }

    let (cfg, config_path) = if let Some(ref path) = cli.config {
        let cfg = ServerConfig::load_from_file(path)?;
        (cfg, Some(path.clone()))
    } else {
        ServerConfig::load_from_default_paths()?
    };
    let cfg = resolve_config(&cli, cfg)?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let errors = cfg.validation_errors();
    if !errors.is_empty() {
        for e in &errors {
            error!("Config error: {}", e);
        }
        std::process::exit(1);
    }

    // A chain that is invalid or fails to plan is reported and skipped.
    let (chains, rejected) = cfg.partition_chains();
    for e in &rejected {
        error!("Chain not started: {}", e);
    }
    let plans: Vec<ChainPlan> = chains
        .into_iter()
        .filter_map(|chain| {
            let id = chain.id.clone();
            match ChainPlan::new(chain) {
                Ok(plan) => Some(plan),
                Err(e) => {
                    error!("[{}] not started: {}", id, e);
                    None
                }
            }
        })
        .collect();
    if plans.is_empty() {
        return Err("no chain could be started".into());
    }

    let source_kind = cfg.source.source_kind()?;
    let dist_cfg = cfg.source.distributor_config();
    let poll = cfg.source.poll_interval();
    let block_hint = dist_cfg.samples_per_block() / 2;

    info!(
        "Starting iqfan (source: {}, word type: {}, overflow: {}, {} chain(s))",
        source_kind,
        dist_cfg.word_type,
        dist_cfg.overflow,
        plans.len()
    );

    let liveness = Liveness::new();
    let mut distributor = Distributor::new(source_kind.open()?, &dist_cfg, liveness.clone());

    let mut chain_handles = Vec::with_capacity(plans.len());
    for plan in plans {
        let id = plan.id().to_string();
        let (tx, rx) = channel::bounded(cfg.source.channel_capacity);
        distributor.register(id.clone(), tx);
        info!(
            "[{}] {} at {} Hz, sink {}",
            id, plan.mode, plan.decimated_rate, plan.config.sink
        );
        chain_handles.push((id, spawn_chain(plan, rx, block_hint, liveness.clone(), poll)?));
    }

    let distributor_handle = distributor.spawn()?;

    let failed = wait_for_chains(chain_handles, &liveness).await?;
    // No chain is left to feed.
    liveness.halt();

    let deadline = Instant::now() + DISTRIBUTOR_GRACE;
    while !distributor_handle.is_finished() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    if distributor_handle.is_finished() {
        match distributor_handle.join() {
            Ok(Ok(blocks)) => info!("Distributor published {} blocks", blocks),
            Ok(Err(e)) => error!("Distributor stopped: {}", e),
            Err(_) => error!("Distributor thread panicked"),
        }
    } else {
        warn!("Source is still blocked in read, not waiting for it");
    }

    if failed > 0 {
        return Err(format!("{} chain(s) failed", failed).into());
    }
    Ok(())
}
