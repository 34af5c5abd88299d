//! Adaptive calibration of classification thresholds from observed
//! full-sibling candidates.
//!
//! As pairs with a high IBD2 fraction are observed during the release pass,
//! their kinship estimates accumulate here. Once enough of them have been
//! seen, the baseline thresholds are shifted down (never up) to compensate
//! for a matcher-wide tendency to under- or over-estimate IBD sharing.

use crate::classifier::Thresholds;

/// A full-sibling candidate stops contributing to calibration once this
/// many have been observed; further ones are counted but ignored for the
/// running mean, preventing very long runs from letting the calibration
/// drift arbitrarily.
pub const MAX_NUM_FS: u32 = 1000;

/// Minimum number of full-sibling candidates observed before any
/// classification can happen (pairs are spilled, not classified, until
/// this is reached).
pub const MIN_NUM_FS: u32 = 200;

/// Minimum number of newly observed full-sibling candidates since the last
/// shift before another shift is attempted.
pub const MIN_ADJUSTING_INTERVAL: u32 = 50;

/// Expected kinship coefficient of a true parent-offspring/full-sibling
/// pair, used as the denominator of the shift factor.
pub const PO_FS_START_EXPECTED: f64 = 0.25;

pub struct Calibrator {
    baseline: Thresholds,
    current: Thresholds,
    num_fs: u32,
    sum_fs_kinship: f64,
    last_shifted_at: u32,
}

impl Calibrator {
    pub fn new(baseline: Thresholds) -> Self {
        Calibrator {
            baseline,
            current: baseline,
            num_fs: 0,
            sum_fs_kinship: 0.0,
            last_shifted_at: 0,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.current
    }

    pub fn num_full_siblings(&self) -> u32 {
        self.num_fs
    }

    /// Register a full-sibling candidate. `ibd1_union` is the *union*
    /// IBD1 length (not the exclusive/union-minus-IBD2 length used for
    /// classification) — see DESIGN.md's Open Question decision on this.
    pub fn add_full_sibling(&mut self, ibd1_union: f64, ibd2: f64, total_length: f64) {
        if self.num_fs >= MAX_NUM_FS {
            return;
        }
        let kinship = crate::classifier::compute_kinship(ibd1_union, ibd2, total_length);
        self.num_fs += 1;
        self.sum_fs_kinship += kinship;
    }

    /// Re-derive the shift factor from the mean observed full-sibling
    /// kinship and apply it to the baseline thresholds, if enough new
    /// candidates have accumulated since the last shift. Returns the shift
    /// factor when a shift happened.
    pub fn maybe_shift(&mut self) -> Option<f64> {
        if self.num_fs < MIN_NUM_FS || self.num_fs > MAX_NUM_FS {
            return None;
        }
        if self.num_fs - self.last_shifted_at < MIN_ADJUSTING_INTERVAL {
            return None;
        }
        let mean = self.sum_fs_kinship / self.num_fs as f64;
        let factor = (mean / PO_FS_START_EXPECTED).min(1.0);
        self.current = self.baseline.scaled(factor);
        self.last_shifted_at = self.num_fs;
        Some(factor)
    }
}
