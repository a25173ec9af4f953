// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};
use tracing::{debug, error, info, warn};

use crate::block::SampleBlock;
use crate::error::{PipelineError, PipelineResult};
use crate::liveness::Liveness;
use crate::sink::Sink;
use crate::stage::{ChainPlan, ChannelStage, FrontEnd};
use crate::vfo::VfoFanout;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Idle,
    Running,
    Draining,
    Halted,
}

/// What a chain does with each decimated block.
pub enum Transform {
    Single { stage: ChannelStage, sink: Sink },
    Vfo(VfoFanout),
}

impl Transform {
    fn process(&mut self, iq: Vec<num_complex::Complex64>) -> PipelineResult<()> {
        match self {
            Self::Single { stage, sink } => {
                let out = stage.process(iq);
                sink.write_samples(&out)?;
                Ok(())
            }
            Self::Vfo(fanout) => fanout.dispatch(iq),
        }
    }

    fn finish(&mut self) -> PipelineResult<()> {
        match self {
            Self::Single { sink, .. } => Ok(sink.close()?),
            Self::Vfo(fanout) => fanout.finish(),
        }
    }
}

/// One consumer of the distributor: front end plus transform, driven over
/// every received block in order.
pub struct ChainRunner {
    id: String,
    front: FrontEnd,
    transform: Transform,
    liveness: Liveness,
    poll: Duration,
    state: ChainState,
    processed: u64,
}

impl ChainRunner {
    /// Build with explicit sinks: one for a single chain, one per offset for
    /// a VFO chain.
    pub fn with_sinks(
        plan: &ChainPlan,
        sinks: Vec<Sink>,
        block_hint: usize,
        liveness: Liveness,
        poll: Duration,
    ) -> PipelineResult<Self> {
        let front = FrontEnd::new(plan, block_hint);
        let transform = match plan.vfo_offsets() {
            Some(_) => Transform::Vfo(VfoFanout::spawn(plan, sinks, liveness.clone(), poll)?),
            None => {
                let mut sinks = sinks.into_iter();
                let (Some(sink), None) = (sinks.next(), sinks.next()) else {
                    return Err(PipelineError::config(format!(
                        "[{}] a single chain takes exactly one sink",
                        plan.id()
                    )));
                };
                Transform::Single {
                    stage: ChannelStage::new(plan, None),
                    sink,
                }
            }
        };
        Ok(Self {
            id: plan.id().to_string(),
            front,
            transform,
            liveness,
            poll,
            state: ChainState::Idle,
            processed: 0,
        })
    }

    /// Open the sinks named in the plan's config and build the runner.
    pub fn open(
        plan: &ChainPlan,
        block_hint: usize,
        liveness: Liveness,
        poll: Duration,
    ) -> PipelineResult<Self> {
        let sink_cfg = &plan.config.sink;
        let sinks = match plan.vfo_offsets() {
            Some(offsets) => (0..offsets.len())
                .map(|n| Sink::open(&sink_cfg.for_vfo(n), &liveness))
                .collect::<PipelineResult<Vec<_>>>()?,
            None => vec![Sink::open(sink_cfg, &liveness)?],
        };
        Self::with_sinks(plan, sinks, block_hint, liveness, poll)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    fn transition(&mut self, next: ChainState) {
        if self.state != next {
            debug!("[{}] {:?} -> {:?}", self.id, self.state, next);
            self.state = next;
        }
    }

    fn process(&mut self, block: &SampleBlock) -> PipelineResult<()> {
        if self.state == ChainState::Idle {
            self.transition(ChainState::Running);
        }
        let iq = self.front.process(&block.samples);
        self.transform.process(iq)?;
        self.processed += 1;
        Ok(())
    }

    fn receive_loop(&mut self, rx: &Receiver<SampleBlock>) -> PipelineResult<()> {
        loop {
            if self.liveness.is_halted() {
                break;
            }
            match rx.recv_timeout(self.poll) {
                Ok(block) => self.process(&block)?,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.transition(ChainState::Draining);
        while let Ok(block) = rx.try_recv() {
            self.process(&block)?;
        }
        Ok(())
    }

    /// Drive the chain until end of stream, liveness halt or a fatal error.
    ///
    /// Errors are fatal to this chain only and are returned after logging;
    /// the inbound channel is released on every exit path.
    pub fn run(&mut self, rx: Receiver<SampleBlock>) -> PipelineResult<()> {
        let result = self.receive_loop(&rx);
        drop(rx);
        let result = match result {
            Ok(()) => self.transform.finish(),
            Err(e) => {
                if let Err(close) = self.transform.finish() {
                    warn!("[{}] closing sinks also failed: {}", self.id, close);
                }
                Err(e)
            }
        };
        self.transition(ChainState::Halted);
        match result {
            Ok(()) => {
                info!("[{}] halted after {} blocks", self.id, self.processed);
                Ok(())
            }
            Err(e) if e.is_termination() => {
                info!("[{}] halted after {} blocks: {}", self.id, self.processed, e);
                Ok(())
            }
            Err(e) => {
                error!(
                    "[{}] chain failed after {} blocks: {}",
                    self.id, self.processed, e
                );
                Err(e)
            }
        }
    }

    /// Run on a dedicated thread named `chain-<id>`.
    pub fn spawn(
        mut self,
        rx: Receiver<SampleBlock>,
    ) -> std::io::Result<JoinHandle<PipelineResult<()>>> {
        std::thread::Builder::new()
            .name(format!("chain-{}", self.id))
            .spawn(move || self.run(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainConfig;
    use crossbeam::channel;
    use iqfan_dsp::DemodMode;
    use std::sync::Arc;

    fn real_plan() -> ChainPlan {
        ChainPlan::new(ChainConfig {
            id: "t".to_string(),
            mode: Some(DemodMode::Real),
            ..Default::default()
        })
        .unwrap()
    }

    fn block(seq: u64, pairs: usize) -> SampleBlock {
        SampleBlock::new(seq, vec![1.0; pairs * 2])
    }

    #[test]
    fn drains_queued_blocks_after_disconnect() {
        let (out_tx, out_rx) = channel::unbounded::<Arc<[f64]>>();
        let liveness = Liveness::new();
        let mut runner = ChainRunner::with_sinks(
            &real_plan(),
            vec![Sink::channel(out_tx)],
            64,
            liveness.clone(),
            Duration::from_millis(5),
        )
        .unwrap();
        assert_eq!(runner.state(), ChainState::Idle);

        let (tx, rx) = channel::bounded(4);
        for seq in 0..3 {
            tx.send(block(seq, 64)).unwrap();
        }
        drop(tx);

        runner.run(rx).unwrap();
        assert_eq!(runner.state(), ChainState::Halted);
        assert_eq!(runner.processed(), 3);
        let outputs: Vec<_> = out_rx.try_iter().collect();
        assert_eq!(outputs.len(), 3);
        assert!(outputs.iter().all(|o| o.len() == 64));
    }

    #[test]
    fn halted_liveness_still_drains_the_queue() {
        let (out_tx, out_rx) = channel::unbounded::<Arc<[f64]>>();
        let liveness = Liveness::new();
        let mut runner = ChainRunner::with_sinks(
            &real_plan(),
            vec![Sink::channel(out_tx)],
            32,
            liveness.clone(),
            Duration::from_millis(5),
        )
        .unwrap();

        let (tx, rx) = channel::bounded(4);
        tx.send(block(0, 32)).unwrap();
        tx.send(block(1, 32)).unwrap();
        liveness.halt();

        runner.run(rx).unwrap();
        assert_eq!(runner.processed(), 2);
        assert_eq!(out_rx.try_iter().count(), 2);
        drop(tx);
    }

    #[test]
    fn sink_failure_is_fatal_to_the_chain_only() {
        let (out_tx, out_rx) = channel::unbounded::<Arc<[f64]>>();
        drop(out_rx);
        let liveness = Liveness::new();
        let mut runner = ChainRunner::with_sinks(
            &real_plan(),
            vec![Sink::channel(out_tx)],
            32,
            liveness.clone(),
            Duration::from_millis(5),
        )
        .unwrap();

        let (tx, rx) = channel::bounded(4);
        tx.send(block(0, 32)).unwrap();
        tx.send(block(1, 32)).unwrap();
        let err = runner.run(rx).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
        assert_eq!(runner.state(), ChainState::Halted);
        assert_eq!(runner.processed(), 0);
        // Fatal chain errors do not touch the shared flag.
        assert!(liveness.is_alive());
    }

    #[test]
    fn single_chain_rejects_wrong_sink_count() {
        let result = ChainRunner::with_sinks(
            &real_plan(),
            Vec::new(),
            32,
            Liveness::new(),
            DEFAULT_POLL_INTERVAL,
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn spawned_runner_uses_a_named_thread() {
        let (out_tx, _out_rx) = channel::unbounded::<Arc<[f64]>>();
        let runner = ChainRunner::with_sinks(
            &real_plan(),
            vec![Sink::channel(out_tx)],
            32,
            Liveness::new(),
            Duration::from_millis(5),
        )
        .unwrap();
        let (tx, rx) = channel::bounded::<SampleBlock>(1);
        let handle = runner.spawn(rx).unwrap();
        assert_eq!(handle.thread().name(), Some("chain-t"));
        drop(tx);
        handle.join().unwrap().unwrap();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn write_error_survives_a_failing_close() {
        use std::fs::OpenOptions;
        use std::io::BufWriter;

        let full = OpenOptions::new().write(true).open("/dev/full").unwrap();
        let mut runner = ChainRunner::with_sinks(
            &real_plan(),
            vec![Sink::File(BufWriter::new(full))],
            2048,
            Liveness::new(),
            Duration::from_millis(5),
        )
        .unwrap();

        // The first block fits the write buffer; the second forces a flush,
        // and the buffered bytes then fail again on close.
        let (tx, rx) = channel::bounded(4);
        tx.send(block(0, 32)).unwrap();
        tx.send(block(1, 2048)).unwrap();
        drop(tx);
        let err = runner.run(rx).unwrap_err();
        match err {
            PipelineError::Io(e) => assert_eq!(e.raw_os_error(), Some(libc::ENOSPC)),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.state(), ChainState::Halted);
        assert_eq!(runner.processed(), 1);
    }
}
