// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Multi-VFO extraction from one decimated IQ stream.
//!
//! One long-lived worker thread per offset, each owning its
//! [`ChannelStage`] and [`Sink`]. At most one generation (one decimated
//! block) is in flight: [`VfoFanout::dispatch`] first waits for every worker
//! of the previous generation to report back. A worker whose sink fails is
//! retired and the remaining VFOs keep running.

use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use num_complex::Complex64;
use tracing::{debug, error, warn};

use crate::error::{PipelineError, PipelineResult, TerminationCause};
use crate::liveness::Liveness;
use crate::sink::Sink;
use crate::stage::{ChainPlan, ChannelStage};

/// How long a halting fanout waits for the in-flight generation.
pub const DRAIN_GRACE: Duration = Duration::from_secs(2);

type Job = Arc<[Complex64]>;

struct Completion {
    index: usize,
    result: io::Result<()>,
}

struct Worker {
    offset_hz: f64,
    tx: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
    pending: bool,
}

impl Worker {
    fn is_live(&self) -> bool {
        self.tx.is_some()
    }
}

pub struct VfoFanout {
    id: String,
    workers: Vec<Worker>,
    done_rx: Receiver<Completion>,
    in_flight: usize,
    generation: u64,
    liveness: Liveness,
    poll: Duration,
}

fn worker_loop(
    index: usize,
    mut stage: ChannelStage,
    mut sink: Sink,
    jobs: Receiver<Job>,
    done: Sender<Completion>,
) {
    // Ends when the fanout drops its sender.
    for job in jobs.iter() {
        let out = stage.process(job.to_vec());
        let result = sink.write_samples(&out);
        let failed = result.is_err();
        if done.send(Completion { index, result }).is_err() || failed {
            break;
        }
    }
    if let Err(e) = sink.close() {
        warn!("VFO {} sink close failed: {}", index, e);
    }
}

impl VfoFanout {
    /// Start one worker per offset in `plan`, pairing offsets with `sinks`.
    pub fn spawn(
        plan: &ChainPlan,
        sinks: Vec<Sink>,
        liveness: Liveness,
        poll: Duration,
    ) -> PipelineResult<Self> {
        let id = plan.id().to_string();
        let offsets = plan
            .vfo_offsets()
            .filter(|o| !o.is_empty())
            .ok_or_else(|| PipelineError::config(format!("[{id}] empty VFO list")))?;
        if offsets.len() != sinks.len() {
            return Err(PipelineError::config(format!(
                "[{id}] {} VFO offsets but {} sinks",
                offsets.len(),
                sinks.len()
            )));
        }

        let (done_tx, done_rx) = channel::unbounded();
        let mut workers = Vec::with_capacity(offsets.len());
        for (index, (&offset_hz, sink)) in offsets.iter().zip(sinks).enumerate() {
            let (tx, rx) = channel::bounded::<Job>(1);
            let stage = ChannelStage::new(plan, Some(offset_hz));
            let done = done_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("vfo-{id}-{index}"))
                .spawn(move || worker_loop(index, stage, sink, rx, done))?;
            debug!("[{}] VFO {} at {:+} Hz started", id, index, offset_hz);
            workers.push(Worker {
                offset_hz,
                tx: Some(tx),
                handle: Some(handle),
                pending: false,
            });
        }

        Ok(Self {
            id,
            workers,
            done_rx,
            in_flight: 0,
            generation: 0,
            liveness,
            poll,
        })
    }

    /// Generations dispatched so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Workers still processing the current generation.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn live_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.is_live()).count()
    }

    fn retire(&mut self, index: usize) {
        if let Some(worker) = self.workers.get_mut(index) {
            worker.tx = None;
            if worker.pending {
                worker.pending = false;
                self.in_flight = self.in_flight.saturating_sub(1);
            }
        }
    }

    fn complete(&mut self, done: Completion) {
        let index = done.index;
        if let Some(worker) = self.workers.get_mut(index) {
            if worker.pending {
                worker.pending = false;
                self.in_flight = self.in_flight.saturating_sub(1);
            }
        }
        if let Err(e) = done.result {
            let offset = self.workers.get(index).map_or(0.0, |w| w.offset_hz);
            warn!(
                "[{}] VFO {} ({:+} Hz) sink failed, retiring it: {}",
                self.id, index, offset, e
            );
            self.retire(index);
        }
    }

    /// Retire workers that died without reporting back.
    fn reap_dead(&mut self) {
        let dead: Vec<usize> = self
            .workers
            .iter()
            .enumerate()
            .filter(|(_, w)| w.pending && w.handle.as_ref().is_some_and(|h| h.is_finished()))
            .map(|(i, _)| i)
            .collect();
        for index in dead {
            error!("[{}] VFO {} worker exited mid-block", self.id, index);
            self.retire(index);
        }
    }

    /// Block until every worker of the current generation has finished.
    fn wait_generation(&mut self) -> PipelineResult<()> {
        let mut deadline: Option<Instant> = None;
        while self.in_flight > 0 {
            match self.done_rx.recv_timeout(self.poll) {
                Ok(done) => self.complete(done),
                Err(RecvTimeoutError::Timeout) => {
                    self.reap_dead();
                    if self.liveness.is_halted() {
                        let limit = *deadline.get_or_insert_with(|| Instant::now() + DRAIN_GRACE);
                        if Instant::now() >= limit {
                            warn!(
                                "[{}] abandoning generation {} with {} VFOs in flight",
                                self.id, self.generation, self.in_flight
                            );
                            return Err(PipelineError::Termination(TerminationCause::Halted));
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    for worker in &mut self.workers {
                        worker.pending = false;
                    }
                    self.in_flight = 0;
                }
            }
        }
        Ok(())
    }

    /// Hand `block` to every live worker once the previous generation is done.
    pub fn dispatch(&mut self, block: Vec<Complex64>) -> PipelineResult<()> {
        self.wait_generation()?;
        if self.live_workers() == 0 {
            return Err(PipelineError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("[{}] every VFO sink has failed", self.id),
            )));
        }

        let job: Job = block.into();
        let mut gone = Vec::new();
        for (index, worker) in self.workers.iter_mut().enumerate() {
            let Some(tx) = worker.tx.as_ref() else {
                continue;
            };
            match tx.send(job.clone()) {
                Ok(()) => {
                    worker.pending = true;
                    self.in_flight += 1;
                }
                Err(_) => gone.push(index),
            }
        }
        for index in gone {
            warn!("[{}] VFO {} worker is gone, retiring it", self.id, index);
            self.retire(index);
        }
        self.generation += 1;
        Ok(())
    }

    /// Wait for the last generation, close every worker and join them.
    ///
    /// Workers still stuck in a sink once the drain grace has run out are
    /// detached instead of joined.
    pub fn finish(&mut self) -> PipelineResult<()> {
        let waited = self.wait_generation();
        let grace = match waited {
            Err(ref e) if e.is_termination() => Duration::ZERO,
            _ => DRAIN_GRACE,
        };
        self.shutdown(grace);
        match waited {
            Err(e) if !e.is_termination() => Err(e),
            _ => Ok(()),
        }
    }

    /// Close every worker's queue, then join those that exit within `grace`.
    fn shutdown(&mut self, grace: Duration) {
        for worker in &mut self.workers {
            worker.tx = None;
        }
        let deadline = Instant::now() + grace;
        loop {
            let running = self
                .workers
                .iter()
                .filter(|w| w.handle.as_ref().is_some_and(|h| !h.is_finished()))
                .count();
            if running == 0 || Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(self.poll.min(deadline.saturating_duration_since(Instant::now())));
        }
        for (index, worker) in self.workers.iter_mut().enumerate() {
            let Some(handle) = worker.handle.take() else {
                continue;
            };
            if !handle.is_finished() {
                warn!(
                    "[{}] VFO {} at {:+} Hz is stuck in its sink, detaching it",
                    self.id, index, worker.offset_hz
                );
                continue;
            }
            if handle.join().is_err() {
                error!("[{}] VFO {} worker panicked", self.id, index);
            }
        }
    }
}

impl Drop for VfoFanout {
    fn drop(&mut self) {
        self.shutdown(DRAIN_GRACE);
    }
}
