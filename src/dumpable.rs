//! Tracks, per chromosome, the last id1 index definitively finished (no
//! individual with a smaller index will ever be touched again on that
//! chromosome), and derives the globally dumpable id1 range from it.

use std::sync::atomic::{AtomicI64, Ordering};

/// Sentinel meaning "nothing finished yet on this chromosome".
const NOT_YET_DUMPABLE: i64 = -1;

pub struct DumpableFrontier {
    last_dumpable: Vec<AtomicI64>,
}

impl DumpableFrontier {
    pub fn new(num_chromosomes: usize) -> Self {
        DumpableFrontier {
            last_dumpable: (0..num_chromosomes)
                .map(|_| AtomicI64::new(NOT_YET_DUMPABLE))
                .collect(),
        }
    }

    /// Called by the worker owning `chrom` (1-indexed). Workers never
    /// share a chromosome, so this is always a single-writer update; a
    /// `Relaxed` store is sufficient because the barrier's own mutex/condvar
    /// handshake already establishes the happens-before edge the master
    /// needs before it reads these values.
    pub fn update(&self, chrom: u8, last_finished_id1: i64) {
        self.last_dumpable[(chrom - 1) as usize].store(last_finished_id1, Ordering::Relaxed);
    }

    /// The minimum of every chromosome's last-dumpable index. `-1` means no
    /// chromosome has finished any individual yet.
    pub fn min_dumpable(&self) -> i64 {
        self.last_dumpable
            .iter()
            .map(|a| a.load(Ordering::Relaxed))
            .min()
            .unwrap_or(NOT_YET_DUMPABLE)
    }
}
