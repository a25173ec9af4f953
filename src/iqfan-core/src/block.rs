// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::Arc;

/// One unpacked read of the raw stream.
///
/// The values are shared read-only between every consumer; each chain
/// assembles its own complex copy before any stage mutates samples.
#[derive(Debug, Clone)]
pub struct SampleBlock {
    pub seq: u64,
    pub samples: Arc<[f64]>,
}

impl SampleBlock {
    pub fn new(seq: u64, samples: Vec<f64>) -> Self {
        Self {
            seq,
            samples: samples.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
