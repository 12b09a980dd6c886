//! Per-phase progress counters
//!
//! Counters are atomics so the HTTP surface can read them while workers
//! write. Neither value of a pair ever decreases.

use serde::{Deserialize, Serialize};
use shellmatch_common::MatchPhase;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct PhaseCounter {
    completed: AtomicUsize,
    total: AtomicUsize,
}

impl PhaseCounter {
    fn snapshot(&self) -> PhaseProgress {
        PhaseProgress {
            completed: self.completed.load(Ordering::Acquire),
            total: self.total.load(Ordering::Acquire),
        }
    }
}

/// (completed, total) for one phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub completed: usize,
    pub total: usize,
}

/// Point-in-time copy of both phases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub matching: PhaseProgress,
    pub assessment: PhaseProgress,
}

#[derive(Debug, Default)]
pub struct BatchProgress {
    matching: PhaseCounter,
    assessment: PhaseCounter,
}

impl BatchProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, phase: MatchPhase) -> &PhaseCounter {
        match phase {
            MatchPhase::Matching => &self.matching,
            MatchPhase::Assessment => &self.assessment,
        }
    }

    /// Raise the phase total; a smaller value is ignored
    pub fn set_total(&self, phase: MatchPhase, total: usize) {
        self.counter(phase).total.fetch_max(total, Ordering::AcqRel);
    }

    /// Record one finished item and return the new completed count
    pub fn complete_one(&self, phase: MatchPhase) -> usize {
        self.counter(phase).completed.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn phase(&self, phase: MatchPhase) -> PhaseProgress {
        self.counter(phase).snapshot()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            matching: self.matching.snapshot(),
            assessment: self.assessment.snapshot(),
        }
    }
}
