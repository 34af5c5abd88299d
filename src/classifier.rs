//! Pairwise relatedness classification from aggregated IBD statistics.
//!
//! The threshold values below are the baseline kinship-coefficient cut
//! points: the midpoint (in log2 space) between the expected kinship of
//! adjacent relatedness degrees, e.g. `MZ_START` sits halfway between the
//! expected kinship of a monozygotic twin pair (0.5) and a parent-offspring
//! or full-sibling pair (0.25).

/// Kinship-coefficient classification boundaries. `current()` values start
/// equal to `baseline()` and are only ever multiplied down by the
/// calibrator's shift factor, never recomputed from scratch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub mz_start: f64,
    pub po_fs_start: f64,
    pub second_start: f64,
    pub third_start: f64,
    pub fourth_start: f64,
    pub fs_start: f64,
}

/// Ratio applied to the baseline kinship thresholds when computing the
/// conservative lower bound used to decide whether a pair is worth
/// spilling for later reclassification (see `min_kinship_coefficient`).
pub const MIN_POWER: f64 = 0.5;

/// IBD2 fraction above which a pair notifies the calibrator (baseline,
/// before any shift).
pub const FS_START_BASELINE: f64 = 0.1;

impl Thresholds {
    pub fn baseline() -> Self {
        Thresholds {
            mz_start: 2f64.powf(-1.5),
            po_fs_start: 2f64.powf(-2.5),
            second_start: 2f64.powf(-3.5),
            third_start: 2f64.powf(-4.5),
            fourth_start: 2f64.powf(-5.5),
            fs_start: FS_START_BASELINE,
        }
    }

    /// Scale every threshold by `factor` (expected to be in `(0, 1]`).
    pub fn scaled(&self, factor: f64) -> Self {
        Thresholds {
            mz_start: self.mz_start * factor,
            po_fs_start: self.po_fs_start * factor,
            second_start: self.second_start * factor,
            third_start: self.third_start * factor,
            fourth_start: self.fourth_start * factor,
            fs_start: self.fs_start * factor,
        }
    }
}

/// Inferred relatedness degree, encoded the same way the original tool's
/// output column does: MZ=0, PO=1, FS=2, 2nd=3, 3rd=4, 4th=5, UN=6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relatedness {
    MonozygoticTwin,
    ParentOffspring,
    FullSibling,
    SecondDegree,
    ThirdDegree,
    FourthDegree,
    Unrelated,
}

impl Relatedness {
    pub fn encoding(self) -> u8 {
        match self {
            Relatedness::MonozygoticTwin => 0,
            Relatedness::ParentOffspring => 1,
            Relatedness::FullSibling => 2,
            Relatedness::SecondDegree => 3,
            Relatedness::ThirdDegree => 4,
            Relatedness::FourthDegree => 5,
            Relatedness::Unrelated => 6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Relatedness::MonozygoticTwin => "MZ",
            Relatedness::ParentOffspring => "PO",
            Relatedness::FullSibling => "FS",
            Relatedness::SecondDegree => "2nd",
            Relatedness::ThirdDegree => "3rd",
            Relatedness::FourthDegree => "4th",
            Relatedness::Unrelated => "UN",
        }
    }
}

/// Kinship coefficient from exclusive (union-minus-IBD2) IBD1 length and
/// IBD2 length, both in centimorgans, over the total genetic length.
pub fn compute_kinship(ibd1_exclusive: f64, ibd2: f64, total_length: f64) -> f64 {
    ibd1_exclusive / (4.0 * total_length) + ibd2 / (2.0 * total_length)
}

/// Fraction of the genome IBD2, i.e. `ibd2 / total_length`.
pub fn compute_ibd2_frac(ibd2: f64, total_length: f64) -> f64 {
    ibd2 / total_length
}

/// Fraction of the genome IBD1 (exclusive), i.e. `ibd1_exclusive / total_length`.
pub fn compute_ibd1_frac(ibd1_exclusive: f64, total_length: f64) -> f64 {
    ibd1_exclusive / total_length
}

/// Recover an IBD1 fraction from a spilled `(kinship, ibd2_frac)` pair, used
/// only by the second pass where the exclusive IBD1 length itself was never
/// persisted. Preserved exactly as derived in the original tool, including
/// its apparent unit inconsistency (`ibd2_frac` is not rescaled by
/// `total_length` in the subtracted term) — changing it would silently
/// alter every second-pass classification.
pub fn ibd1_frac_from_kinship(kinship: f64, ibd2_frac: f64, total_length: f64) -> f64 {
    ((4.0 * kinship * total_length - 2.0 * ibd2_frac) / total_length).max(0.0)
}

/// Classify a pair given its current kinship coefficient, IBD2 fraction and
/// the calibrator's current thresholds. Boundary order matters: at
/// `kinship == second_start` exactly, this returns `ThirdDegree`, not
/// `SecondDegree` — the third-degree band's upper bound is checked first
/// and is closed on both ends, matching the original tool bit-for-bit.
pub fn encode(kinship: f64, ibd2_frac: f64, t: &Thresholds) -> Relatedness {
    if kinship >= t.mz_start {
        Relatedness::MonozygoticTwin
    } else if kinship >= t.po_fs_start {
        if ibd2_frac >= t.fs_start {
            Relatedness::FullSibling
        } else {
            Relatedness::ParentOffspring
        }
    } else if kinship >= t.third_start && kinship <= t.second_start {
        Relatedness::ThirdDegree
    } else if kinship >= t.second_start {
        Relatedness::SecondDegree
    } else if kinship >= t.fourth_start {
        Relatedness::FourthDegree
    } else {
        Relatedness::Unrelated
    }
}

/// Degree gate applied at emission time: with `max_degree == 1`, only
/// MZ/PO/FS pass; otherwise a pair passes when its degree (`encoding - 1`,
/// with MZ/PO/FS all folded into degree 0) is at most `max_degree`.
pub fn passes_degree_gate(encoding: u8, max_degree: u8) -> bool {
    if max_degree == 1 {
        encoding <= 2
    } else {
        (encoding as i32 - 1) <= max_degree as i32
    }
}

/// The conservative lower kinship bound below which a pair is dropped
/// outright during the first pass rather than spilled for reclassification.
/// Computed once, from the *baseline* thresholds, at the start of a run.
pub fn min_kinship_coefficient(max_degree: u8, baseline: &Thresholds) -> crate::error::Result<f64> {
    let base = match max_degree {
        1 => baseline.po_fs_start,
        2 => baseline.second_start,
        3 => baseline.third_start,
        4 => baseline.fourth_start,
        other => {
            return Err(crate::error::RaffiError::InvalidArgs(format!(
                "max_degree must be in 1..=4, got {other}"
            )))
        }
    };
    Ok(base * MIN_POWER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_thresholds_are_monotonically_decreasing() {
        let t = Thresholds::baseline();
        assert!(t.mz_start > t.po_fs_start);
        assert!(t.po_fs_start > t.second_start);
        assert!(t.second_start > t.third_start);
        assert!(t.third_start > t.fourth_start);
    }

    #[test]
    fn encode_mz() {
        let t = Thresholds::baseline();
        assert_eq!(encode(0.45, 0.0, &t), Relatedness::MonozygoticTwin);
    }

    #[test]
    fn encode_po_vs_fs_by_ibd2() {
        let t = Thresholds::baseline();
        let k = (t.mz_start + t.po_fs_start) / 2.0;
        assert_eq!(encode(k, 0.0, &t), Relatedness::ParentOffspring);
        assert_eq!(encode(k, 0.2, &t), Relatedness::FullSibling);
    }

    #[test]
    fn third_degree_boundary_wins_on_tie_with_second() {
        let t = Thresholds::baseline();
        assert_eq!(encode(t.second_start, 0.0, &t), Relatedness::ThirdDegree);
    }

    #[test]
    fn below_fourth_is_unrelated() {
        let t = Thresholds::baseline();
        assert_eq!(encode(t.fourth_start / 2.0, 0.0, &t), Relatedness::Unrelated);
    }

    #[test]
    fn degree_gate_first_degree_only() {
        assert!(passes_degree_gate(0, 1));
        assert!(passes_degree_gate(2, 1));
        assert!(!passes_degree_gate(3, 1));
    }

    #[test]
    fn degree_gate_fourth_degree_excludes_unrelated() {
        assert!(passes_degree_gate(5, 4));
        assert!(!passes_degree_gate(6, 4));
    }

    #[test]
    fn min_kinship_rejects_out_of_range_degree() {
        let t = Thresholds::baseline();
        assert!(min_kinship_coefficient(0, &t).is_err());
        assert!(min_kinship_coefficient(5, &t).is_err());
        assert!(min_kinship_coefficient(2, &t).is_ok());
    }
}
