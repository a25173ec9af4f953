// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Pipeline-wide termination signal.
///
/// Every loop reads it at the top of each iteration and after each bounded
/// wait. Setting it is the only cancellation primitive; it is never cleared.
#[derive(Debug, Clone, Default)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn halt(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_halted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn is_alive(&self) -> bool {
        !self.is_halted()
    }
}
