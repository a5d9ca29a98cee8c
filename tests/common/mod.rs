#![allow(dead_code)]

use mrcope::types::{Alignment, AssociationRecord, HarmonizedInstrument, PruneMethod, PrunedSet};

pub fn instrument(snp: &str, beta_x: f64, se_x: f64, beta_y: f64, se_y: f64) -> HarmonizedInstrument {
    HarmonizedInstrument {
        snp: snp.to_string(),
        chr: None,
        bp: None,
        effect_allele: "A".to_string(),
        other_allele: "G".to_string(),
        beta_exposure: beta_x,
        se_exposure: se_x,
        pval_exposure: 1e-10,
        eaf_exposure: 0.3,
        beta_outcome: beta_y,
        se_outcome: se_y,
        pval_outcome: 0.5,
        eaf_outcome: 0.3,
        alignment: Alignment::Aligned,
    }
}

pub fn record(snp: &str, a1: &str, a2: &str, beta: f64, se: f64, eaf: f64) -> AssociationRecord {
    AssociationRecord {
        snp: snp.to_string(),
        chr: None,
        bp: None,
        effect_allele: a1.to_string(),
        other_allele: a2.to_string(),
        beta,
        se,
        pvalue: 1e-8,
        eaf,
    }
}

pub fn pruned(instruments: Vec<HarmonizedInstrument>) -> PrunedSet {
    PrunedSet {
        instruments,
        removed: Vec::new(),
        method: PruneMethod::Simulation,
    }
}

pub const SCENARIO_BETA_X: [f64; 5] = [0.10, 0.20, 0.15, 0.12, 0.50];

/// Four instruments with a causal effect of 0.3 and one strongly pleiotropic instrument (rs5).
pub fn scenario() -> Vec<HarmonizedInstrument> {
    SCENARIO_BETA_X
        .iter()
        .enumerate()
        .map(|(i, &bx)| {
            let by = if i == 4 { 0.50 * bx + 0.40 } else { 0.30 * bx };
            instrument(&format!("rs{}", i + 1), bx, 0.02, by, 0.05)
        })
        .collect()
}

/// The same scenario as raw exposure and outcome records.
pub fn scenario_records() -> (Vec<AssociationRecord>, Vec<AssociationRecord>) {
    let exposure = scenario()
        .iter()
        .map(|i| record(&i.snp, "A", "G", i.beta_exposure, i.se_exposure, 0.3))
        .collect();
    let outcome = scenario()
        .iter()
        .map(|i| record(&i.snp, "A", "G", i.beta_outcome, i.se_outcome, 0.3))
        .collect();
    (exposure, outcome)
}
