use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::info;

use crate::error::MrError;
use crate::io::write_dataframe;
use crate::qc::{check_min_usize, check_range_f64};
use crate::stats::normal_two_sided_p;
use crate::types::AssociationRecord;

const NUCLEOTIDES: [&str; 4] = ["A", "C", "G", "T"];

#[derive(Debug, Clone)]
pub struct SimulateConfig {
    pub n_instruments: usize,
    pub causal_effect: f64,
    pub pleiotropic_fraction: f64,
    pub pleiotropy_offset: f64,
    pub beta_exposure_mean: f64,
    pub beta_exposure_sd: f64,
    pub se_exposure: (f64, f64),
    pub se_outcome: (f64, f64),
    pub seed: u64,
}

impl Default for SimulateConfig {
    fn default() -> Self {
        Self {
            n_instruments: 50,
            causal_effect: 0.3,
            pleiotropic_fraction: 0.0,
            pleiotropy_offset: 0.05,
            beta_exposure_mean: 0.08,
            beta_exposure_sd: 0.01,
            se_exposure: (0.01, 0.03),
            se_outcome: (0.01, 0.03),
            seed: 42,
        }
    }
}

impl SimulateConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        check_min_usize(self.n_instruments, 1, "n_instruments")?;
        check_range_f64(self.pleiotropic_fraction, 0.0, 1.0, true, "pleiotropic_fraction")?;
        for (name, (lo, hi)) in [("se_exposure", self.se_exposure), ("se_outcome", self.se_outcome)] {
            if !(lo > 0.0 && hi >= lo && hi.is_finite()) {
                return Err(MrError::InputValidation(format!(
                    "{name} range must satisfy 0 < low <= high, got ({lo}, {hi})"
                )));
            }
        }
        if !(self.beta_exposure_sd.is_finite() && self.beta_exposure_sd >= 0.0) {
            return Err(MrError::InputValidation(
                "beta_exposure_sd must be a non-negative number".into(),
            ));
        }
        Ok(())
    }
}

fn uniform(rng: &mut StdRng, (lo, hi): (f64, f64)) -> f64 {
    if hi > lo { rng.random_range(lo..hi) } else { lo }
}

pub fn simulate(
    config: &SimulateConfig,
) -> crate::error::Result<(Vec<AssociationRecord>, Vec<AssociationRecord>)> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let n = config.n_instruments;
    let n_pleio = (config.pleiotropic_fraction * n as f64).round() as usize;
    let pleiotropic: HashSet<usize> = sample(&mut rng, n, n_pleio.min(n)).into_iter().collect();
    let exposure_dist = Normal::new(config.beta_exposure_mean, config.beta_exposure_sd)
        .map_err(|e| MrError::InputValidation(format!("exposure effect distribution: {e}")))?;

    let mut exposure = Vec::with_capacity(n);
    let mut outcome = Vec::with_capacity(n);
    for i in 0..n {
        let a1 = NUCLEOTIDES[rng.random_range(0..4)];
        let a2 = loop {
            let candidate = NUCLEOTIDES[rng.random_range(0..4)];
            if candidate != a1 {
                break candidate;
            }
        };
        let eaf = rng.random_range(0.05..0.5);
        let chr = rng.random_range(1u8..=22);
        let bp = rng.random_range(1_000_000u64..50_000_000);

        let beta_x = exposure_dist.sample(&mut rng);
        let se_x = uniform(&mut rng, config.se_exposure);
        let se_y = uniform(&mut rng, config.se_outcome);
        let noise = Normal::new(0.0, se_y)
            .map_err(|e| MrError::InputValidation(format!("outcome noise: {e}")))?
            .sample(&mut rng);
        let offset = if pleiotropic.contains(&i) {
            config.pleiotropy_offset
        } else {
            0.0
        };
        let beta_y = config.causal_effect * beta_x + offset + noise;

        let snp = format!("rs{}", 1_000_000 + i);
        exposure.push(AssociationRecord {
            snp: snp.clone(),
            chr: Some(chr),
            bp: Some(bp),
            effect_allele: a1.to_string(),
            other_allele: a2.to_string(),
            beta: beta_x,
            se: se_x,
            pvalue: normal_two_sided_p(beta_x / se_x),
            eaf,
        });
        outcome.push(AssociationRecord {
            snp,
            chr: Some(chr),
            bp: Some(bp),
            effect_allele: a1.to_string(),
            other_allele: a2.to_string(),
            beta: beta_y,
            se: se_y,
            pvalue: normal_two_sided_p(beta_y / se_y),
            eaf,
        });
    }
    info!(
        "Simulated {n} instruments ({} pleiotropic, causal effect {})",
        pleiotropic.len(),
        config.causal_effect
    );
    Ok((exposure, outcome))
}

pub fn records_table(records: &[AssociationRecord]) -> Result<DataFrame> {
    let chr: Vec<Option<u32>> = records.iter().map(|r| r.chr.map(u32::from)).collect();
    let bp: Vec<Option<u64>> = records.iter().map(|r| r.bp).collect();
    Ok(DataFrame::new_with_height(
        records.len(),
        vec![
            Series::new(
                "SNP".into(),
                records.iter().map(|r| r.snp.clone()).collect::<Vec<_>>(),
            )
            .into(),
            Series::new("CHR".into(), chr).into(),
            Series::new("BP".into(), bp).into(),
            Series::new(
                "A1".into(),
                records
                    .iter()
                    .map(|r| r.effect_allele.clone())
                    .collect::<Vec<_>>(),
            )
            .into(),
            Series::new(
                "A2".into(),
                records
                    .iter()
                    .map(|r| r.other_allele.clone())
                    .collect::<Vec<_>>(),
            )
            .into(),
            Series::new("EAF".into(), records.iter().map(|r| r.eaf).collect::<Vec<_>>()).into(),
            Series::new("BETA".into(), records.iter().map(|r| r.beta).collect::<Vec<_>>()).into(),
            Series::new("SE".into(), records.iter().map(|r| r.se).collect::<Vec<_>>()).into(),
            Series::new(
                "PVALUE".into(),
                records.iter().map(|r| r.pvalue).collect::<Vec<_>>(),
            )
            .into(),
        ],
    )?)
}

pub fn write_simulated(config: &SimulateConfig, exposure_path: &Path, outcome_path: &Path) -> Result<()> {
    let (exposure, outcome) = simulate(config)?;
    write_dataframe(&records_table(&exposure)?, exposure_path)?;
    write_dataframe(&records_table(&outcome)?, outcome_path)?;
    info!(
        "Wrote {} and {}",
        exposure_path.display(),
        outcome_path.display()
    );
    Ok(())
}
