// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod block;
pub mod chain;
pub mod config;
pub mod distributor;
pub mod error;
pub mod liveness;
pub mod sink;
pub mod source;
pub mod stage;
pub mod vfo;

pub use block::SampleBlock;
pub use chain::{ChainRunner, ChainState, Transform, DEFAULT_POLL_INTERVAL};
pub use config::{parse_offsets, ChainConfig, Decimation};
pub use distributor::{ConsumerAttacher, Distributor, DistributorConfig, OverflowPolicy};
pub use error::{PipelineError, PipelineResult, TerminationCause};
pub use liveness::Liveness;
pub use sink::{Sink, SinkConfig};
pub use source::{ByteSource, ReaderSource, SourceKind};
pub use stage::{ChainPlan, ChannelStage, FrontEnd};
pub use vfo::VfoFanout;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
