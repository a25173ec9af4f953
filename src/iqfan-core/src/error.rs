// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;

use iqfan_dsp::{DesignError, FormatError};
use thiserror::Error;

/// Expected shutdown signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationCause {
    EndOfStream,
    Interrupt,
    /// The liveness flag was observed already set.
    Halted,
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EndOfStream => "end of stream",
            Self::Interrupt => "interrupted",
            Self::Halted => "pipeline halted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("terminated: {0}")]
    Termination(TerminationCause),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this is an orderly shutdown rather than a failure.
    pub fn is_termination(&self) -> bool {
        matches!(self, Self::Termination(_))
    }
}

impl From<DesignError> for PipelineError {
    fn from(err: DesignError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<TerminationCause> for PipelineError {
    fn from(cause: TerminationCause) -> Self {
        Self::Termination(cause)
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_keep_the_taxonomy() {
        let err: PipelineError = "x9".parse::<iqfan_dsp::WordType>().unwrap_err().into();
        assert!(matches!(err, PipelineError::Format(_)));

        let err: PipelineError = DesignError::ZeroOrder.into();
        assert!(matches!(err, PipelineError::Config(_)));

        let err: PipelineError = std::io::Error::other("gone").into();
        assert!(matches!(err, PipelineError::Io(_)));

        let err: PipelineError = TerminationCause::Interrupt.into();
        assert!(err.is_termination());
        assert_eq!(err.to_string(), "terminated: interrupted");
    }
}
