//! Mendelian randomization on GWAS summary statistics.
//!
//! Stages run in order: harmonization, instrument selection, correlation pruning, causal
//! estimation, heterogeneity diagnostics, outlier detection and leave-one-out analysis.

pub mod error;
pub mod logging;
pub mod types;

pub mod df_utils;
pub mod io;
pub mod parallel;
pub mod qc;
pub mod schema;
pub mod stats;
pub mod utils;

pub mod estimators;
pub mod harmonize;
pub mod heterogeneity;
pub mod loo;
pub mod pipeline;
pub mod presso;
pub mod prune;
pub mod reference;
pub mod report;
pub mod simulate;
