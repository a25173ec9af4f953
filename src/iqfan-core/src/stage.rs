// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-chain DSP stages.
//!
//! A chain splits into a [`FrontEnd`] (everything up to and including the
//! decimator, shared by all VFOs of the chain) and one [`ChannelStage`] per
//! output (input band-limiter, demodulator, output filter).

use iqfan_dsp::filter::{deemphasis, ellip_lowpass, DEEMPHASIS_TAU_S};
use iqfan_dsp::{
    iq, Decimator, DemodMode, Demodulator, FilterChain, FrequencyShifter, IqCorrector, PhaseMode,
    Sos,
};
use num_complex::Complex64;
use tracing::debug;

use crate::config::ChainConfig;
use crate::error::{PipelineError, PipelineResult};

pub const FILTER_ORDER: usize = 8;
pub const PASSBAND_RIPPLE_DB: f64 = 1.0;
pub const STOPBAND_ATTEN_DB: f64 = 30.0;

/// Validated chain configuration with its filter tables designed.
///
/// Built once per chain; construction is where config errors surface.
#[derive(Debug, Clone)]
pub struct ChainPlan {
    pub config: ChainConfig,
    pub mode: DemodMode,
    pub factor: usize,
    pub sample_rate: f64,
    pub decimated_rate: f64,
    pub input_sos: Vec<Sos>,
    pub output_sos: Vec<Sos>,
}

impl ChainPlan {
    pub fn new(config: ChainConfig) -> PipelineResult<Self> {
        config.validate()?;
        let mode = config
            .mode
            .ok_or_else(|| PipelineError::config("no demodulator selected"))?;
        let fs_dec = config.decimated_rate() as f64;
        let nyquist = fs_dec / 2.0;

        let input_sos = match mode.input_bandwidth_hz() {
            Some(bw) if bw / 2.0 < nyquist => ellip_lowpass(
                FILTER_ORDER,
                PASSBAND_RIPPLE_DB,
                STOPBAND_ATTEN_DB,
                bw / 2.0,
                fs_dec,
            )?,
            _ => Vec::new(),
        };

        let mut output_sos = Vec::with_capacity(FILTER_ORDER / 2 + 1);
        if mode.uses_deemphasis() {
            output_sos.push(deemphasis(fs_dec, DEEMPHASIS_TAU_S));
        }
        output_sos.extend(ellip_lowpass(
            FILTER_ORDER,
            PASSBAND_RIPPLE_DB,
            STOPBAND_ATTEN_DB,
            config.output_cutoff_hz as f64,
            fs_dec,
        )?);

        debug!(
            "[{}] {} at {} Hz, decimation {} -> {} Hz, {} input / {} output sections",
            config.id,
            mode,
            config.sample_rate,
            config.decimation_factor(),
            fs_dec,
            input_sos.len(),
            output_sos.len()
        );

        Ok(Self {
            mode,
            factor: config.decimation_factor() as usize,
            sample_rate: config.sample_rate as f64,
            decimated_rate: fs_dec,
            input_sos,
            output_sos,
            config,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn phase_mode(&self) -> PhaseMode {
        if self.config.continuous_phase {
            PhaseMode::Continuous
        } else {
            PhaseMode::Reset
        }
    }

    pub fn vfo_offsets(&self) -> Option<&[f64]> {
        self.config.vfo_offsets_hz.as_deref()
    }
}

/// Deinterleave, correct, normalize, shift to centre and decimate.
#[derive(Debug)]
pub struct FrontEnd {
    corrector: Option<IqCorrector>,
    normalize: bool,
    shifter: FrequencyShifter,
    decimator: Decimator,
    iq: Vec<Complex64>,
}

impl FrontEnd {
    /// `block_hint` is the expected complex samples per block.
    pub fn new(plan: &ChainPlan, block_hint: usize) -> Self {
        let cfg = &plan.config;
        Self {
            corrector: cfg
                .iq_correction
                .then(|| IqCorrector::new(plan.sample_rate, cfg.impedance)),
            normalize: cfg.normalize,
            shifter: FrequencyShifter::new(
                cfg.center_offset_hz,
                plan.sample_rate,
                plan.phase_mode(),
            ),
            decimator: Decimator::new(plan.factor, block_hint),
            iq: Vec::with_capacity(block_hint),
        }
    }

    pub fn process(&mut self, flat: &[f64]) -> Vec<Complex64> {
        iq::assemble_into(flat, &mut self.iq);
        if let Some(corrector) = self.corrector.as_mut() {
            corrector.apply(&mut self.iq);
        }
        if self.normalize {
            iq::normalize(&mut self.iq);
        }
        self.shifter.process(&mut self.iq);
        self.decimator.process(&self.iq)
    }
}

/// Optional VFO shift, input band-limiter, demodulator, output filter.
#[derive(Debug)]
pub struct ChannelStage {
    vfo: Option<FrequencyShifter>,
    input: FilterChain<Complex64>,
    demod: Demodulator,
    output: FilterChain<f64>,
}

impl ChannelStage {
    pub fn new(plan: &ChainPlan, vfo_offset_hz: Option<f64>) -> Self {
        Self {
            vfo: vfo_offset_hz
                .map(|f| FrequencyShifter::new(f, plan.decimated_rate, plan.phase_mode())),
            input: FilterChain::new(&plan.input_sos),
            demod: plan.mode.demodulator(),
            output: FilterChain::new(&plan.output_sos),
        }
    }

    pub fn process(&mut self, mut iq: Vec<Complex64>) -> Vec<f64> {
        if let Some(vfo) = self.vfo.as_mut() {
            vfo.process(&mut iq);
        }
        self.input.process(&mut iq);
        let mut out = self.demod.demodulate(&iq);
        self.output.process(&mut out);
        out
    }
}
