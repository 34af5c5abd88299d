#![allow(clippy::too_many_arguments)]

//! raffi-kinship: pairwise genetic-relatedness inference from precomputed
//! IBD segment reports.
//!
//! # Features
//!
//! - **Parallel aggregation**: one worker thread per chromosome slice,
//!   synchronized by a barrier so pairs are released in sample-ID order.
//! - **Streaming I/O**: bounded memory regardless of cohort size; partial
//!   sums are aggregated and released incrementally as soon as no further
//!   input can affect them.
//! - **Adaptive calibration**: classification thresholds are derived from
//!   the full-sibling kinship distribution actually observed in the cohort.
//!
//! # Example
//!
//! ```rust,no_run
//! use raffi_kinship::config::RunConfig;
//! use raffi_kinship::engine;
//!
//! let config = RunConfig::new(
//!     "panels".into(),
//!     "panel_chr".into(),
//!     "genetic_maps".into(),
//!     "matcher_output".into(),
//!     "out".into(),
//!     3,
//!     4,
//!     false,
//!     true,
//! ).unwrap();
//! let stats = engine::run(&config).unwrap();
//! println!("{stats}");
//! ```

pub mod barrier;
pub mod calibrator;
pub mod classifier;
pub mod config;
pub mod dumpable;
pub mod engine;
pub mod error;
pub mod genetic_map;
pub mod ordering;
pub mod output;
pub mod release;
pub mod segment;
pub mod spill;
pub mod worker;

pub use config::RunConfig;
pub use engine::RunStats;
pub use error::{RaffiError, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::classifier::{Relatedness, Thresholds};
    pub use crate::config::RunConfig;
    pub use crate::engine::{self, RunStats};
    pub use crate::error::{RaffiError, Result};
}

#[cfg(test)]
mod tests {
    use crate::classifier::{self, Relatedness, Thresholds};

    #[test]
    fn baseline_thresholds_classify_a_parent_offspring_pair() {
        let thresholds = Thresholds::baseline();
        let kinship = 0.25;
        let ibd2_frac = 0.0;
        let relatedness = classifier::encode(kinship, ibd2_frac, &thresholds);
        assert_eq!(relatedness, Relatedness::ParentOffspring);
    }
}
