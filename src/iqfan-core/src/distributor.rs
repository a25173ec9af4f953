// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Raw read loop and block fan-out.
//!
//! The distributor owns the byte source. Each iteration reads one fixed-size
//! chunk, unpacks it once and offers the block to every registered consumer.
//! What happens at a full channel is the [`OverflowPolicy`]. A consumer is
//! only ever pruned once its channel is closed.

use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, SendTimeoutError, Sender, TrySendError};
use iqfan_dsp::WordType;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::block::SampleBlock;
use crate::chain::DEFAULT_POLL_INTERVAL;
use crate::error::PipelineResult;
use crate::liveness::Liveness;
use crate::source::{read_full, ByteSource};

pub const DEFAULT_BLOCK_EXPONENT: u32 = 14;
/// Behaviour when a consumer's channel is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Skip the block for that consumer only. Suits live sources, where the
    /// reader must keep up with the device.
    #[default]
    Drop,
    /// Wait for room, re-checking liveness every poll interval. Suits
    /// finite sources such as capture files.
    Block,
}

impl std::fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Drop => write!(f, "drop"),
            Self::Block => write!(f, "block"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributorConfig {
    pub word_type: WordType,
    /// Samples per read are `1 << block_exponent`.
    pub block_exponent: u32,
    pub overflow: OverflowPolicy,
    /// How long a blocking send waits before re-checking liveness.
    pub poll_interval: Duration,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            word_type: WordType::default(),
            block_exponent: DEFAULT_BLOCK_EXPONENT,
            overflow: OverflowPolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl DistributorConfig {
    pub fn samples_per_block(&self) -> usize {
        1usize << self.block_exponent
    }

    pub fn chunk_bytes(&self) -> usize {
        self.samples_per_block() * self.word_type.width()
    }
}

struct Consumer {
    id: String,
    tx: Sender<SampleBlock>,
    dropped: u64,
}

enum Delivery {
    Sent,
    Dropped,
    Closed,
}

impl Consumer {
    fn offer(&self, block: SampleBlock) -> Delivery {
        match self.tx.try_send(block) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => Delivery::Dropped,
            Err(TrySendError::Disconnected(_)) => Delivery::Closed,
        }
    }

    /// Waits for room, giving up on this block only once `liveness` halts.
    fn wait_for_room(&self, mut block: SampleBlock, poll: Duration, liveness: &Liveness) -> Delivery {
        loop {
            match self.tx.send_timeout(block, poll) {
                Ok(()) => return Delivery::Sent,
                Err(SendTimeoutError::Disconnected(_)) => return Delivery::Closed,
                Err(SendTimeoutError::Timeout(b)) => {
                    if liveness.is_halted() {
                        return Delivery::Dropped;
                    }
                    block = b;
                }
            }
        }
    }
}

/// Registers consumers with a running distributor from another thread.
#[derive(Debug, Clone)]
pub struct ConsumerAttacher {
    tx: Sender<(String, Sender<SampleBlock>)>,
}

impl ConsumerAttacher {
    /// Returns `false` once the distributor has stopped.
    pub fn attach(&self, id: impl Into<String>, tx: Sender<SampleBlock>) -> bool {
        self.tx.send((id.into(), tx)).is_ok()
    }
}

pub struct Distributor {
    source: Box<dyn ByteSource>,
    config: DistributorConfig,
    liveness: Liveness,
    consumers: Vec<Consumer>,
    attach_tx: Sender<(String, Sender<SampleBlock>)>,
    attach_rx: Receiver<(String, Sender<SampleBlock>)>,
    seq: u64,
}

impl Distributor {
    pub fn new(source: Box<dyn ByteSource>, config: &DistributorConfig, liveness: Liveness) -> Self {
        let (attach_tx, attach_rx) = channel::unbounded();
        Self {
            source,
            config: *config,
            liveness,
            consumers: Vec::new(),
            attach_tx,
            attach_rx,
            seq: 0,
        }
    }

    pub fn register(&mut self, id: impl Into<String>, tx: Sender<SampleBlock>) {
        let id = id.into();
        info!("Registered consumer {}", id);
        self.consumers.push(Consumer { id, tx, dropped: 0 });
    }

    pub fn attacher(&self) -> ConsumerAttacher {
        ConsumerAttacher {
            tx: self.attach_tx.clone(),
        }
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    pub fn consumer_ids(&self) -> Vec<&str> {
        self.consumers.iter().map(|c| c.id.as_str()).collect()
    }

    pub fn chunk_bytes(&self) -> usize {
        self.config.chunk_bytes()
    }

    /// Blocks published so far.
    pub fn published(&self) -> u64 {
        self.seq
    }

    /// Blocks skipped for consumer `id` because its channel was full.
    pub fn dropped(&self, id: &str) -> Option<u64> {
        self.consumers.iter().find(|c| c.id == id).map(|c| c.dropped)
    }

    fn admit_pending(&mut self) {
        while let Ok((id, tx)) = self.attach_rx.try_recv() {
            self.register(id, tx);
        }
    }

    /// Offer `block` to every consumer; returns how many accepted it.
    pub fn publish(&mut self, block: SampleBlock) -> usize {
        let DistributorConfig {
            overflow,
            poll_interval,
            ..
        } = self.config;
        let liveness = &self.liveness;
        let seq = block.seq;
        let mut delivered = 0;
        self.consumers.retain_mut(|consumer| {
            let outcome = match overflow {
                OverflowPolicy::Drop => consumer.offer(block.clone()),
                OverflowPolicy::Block => consumer.wait_for_room(block.clone(), poll_interval, liveness),
            };
            match outcome {
                Delivery::Sent => {
                    delivered += 1;
                    true
                }
                Delivery::Dropped => {
                    consumer.dropped += 1;
                    warn!(
                        "Consumer {} is full, dropped block {} ({} so far)",
                        consumer.id, seq, consumer.dropped
                    );
                    true
                }
                Delivery::Closed => {
                    info!("Pruning consumer {}: channel closed", consumer.id);
                    false
                }
            }
        });
        delivered
    }

    /// Read, unpack and publish until end of stream or liveness halt.
    ///
    /// Returns the number of blocks published. End of stream halts the
    /// shared liveness flag; so does a read failure, which is returned.
    pub fn run(mut self) -> PipelineResult<u64> {
        let mut buf = vec![0u8; self.config.chunk_bytes()];
        debug!(
            "Distributor reading {} byte chunks of {}, overflow {}",
            buf.len(),
            self.config.word_type,
            self.config.overflow
        );
        let result = loop {
            if self.liveness.is_halted() {
                break Ok(self.seq);
            }
            self.admit_pending();

            let n = match read_full(self.source.as_mut(), &mut buf) {
                Ok(n) => n,
                Err(e) => {
                    error!("Source read failed after {} blocks: {}", self.seq, e);
                    self.liveness.halt();
                    break Err(e.into());
                }
            };
            if n == 0 {
                info!("End of stream after {} blocks", self.seq);
                self.liveness.halt();
                break Ok(self.seq);
            }

            let samples = self.config.word_type.unpack(&buf[..n]);
            let block = SampleBlock::new(self.seq, samples);
            self.publish(block);
            self.seq += 1;
        };
        // Closing every consumer channel lets chains drain and stop.
        self.consumers.clear();
        result
    }

    /// Run on a dedicated thread named `iq-distributor`.
    pub fn spawn(self) -> std::io::Result<JoinHandle<PipelineResult<u64>>> {
        std::thread::Builder::new()
            .name("iq-distributor".to_string())
            .spawn(move || self.run())
    }
}
