use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::{debug, info, warn};

use crate::error::{MrError, Result};
use crate::estimators::{IvwSums, check_weights, ivw_as};
use crate::parallel::tally_indexed;
use crate::qc::{check_min_usize, check_range_f64};
use crate::types::{
    DistortionTest, HarmonizedInstrument, Method, OutlierCall, OutlierReport, PrunedSet,
};

pub const PRESSO_MIN_INSTRUMENTS: usize = 4;

#[derive(Debug, Clone)]
pub struct PressoConfig {
    pub n_trials: usize,
    pub threshold: f64,
    pub seed: u64,
    pub cores: Option<usize>,
}

impl Default for PressoConfig {
    fn default() -> Self {
        Self {
            n_trials: 1000,
            threshold: 0.05,
            seed: 42,
            cores: None,
        }
    }
}

impl PressoConfig {
    pub fn validate(&self) -> Result<()> {
        check_min_usize(self.n_trials, 1, "n_trials")?;
        check_range_f64(self.threshold, 0.0, 1.0, false, "threshold")
    }
}

struct Leaveout {
    weight: f64,
    slope: f64,
    observed: f64,
    exposure: Normal<f64>,
    outcome: Normal<f64>,
}

fn leaveouts(instruments: &[HarmonizedInstrument]) -> Result<Vec<Leaveout>> {
    let sums = IvwSums::from_instruments(instruments);
    instruments
        .iter()
        .map(|inst| {
            let slope = sums.remove(inst).slope().ok_or_else(|| {
                MrError::DegenerateRatio(format!(
                    "IVW slope without {} is undefined: remaining exposure effects are zero",
                    inst.snp
                ))
            })?;
            let weight = inst.outcome_weight();
            let resid = inst.beta_outcome - slope * inst.beta_exposure;
            let exposure = Normal::new(inst.beta_exposure, inst.se_exposure).map_err(|e| {
                MrError::InputValidation(format!("{}: exposure SE {}: {e}", inst.snp, inst.se_exposure))
            })?;
            let outcome = Normal::new(slope * inst.beta_exposure, inst.se_outcome).map_err(|e| {
                MrError::InputValidation(format!("{}: outcome SE {}: {e}", inst.snp, inst.se_outcome))
            })?;
            Ok(Leaveout {
                weight,
                slope,
                observed: weight * resid * resid,
                exposure,
                outcome,
            })
        })
        .collect()
}

// Tallies one trial: slot 0 counts a simulated total at least as large as the observed RSS,
// slot `1 + i` a simulated contribution of instrument `i` at least as large as its observed one.
fn trial_counts(parts: &[Leaveout], rss_obs: f64, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut counts = vec![0usize; parts.len() + 1];
    let mut total = 0.0;
    for (i, part) in parts.iter().enumerate() {
        let x = part.exposure.sample(&mut rng);
        let y = part.outcome.sample(&mut rng);
        let r = y - part.slope * x;
        let contribution = part.weight * r * r;
        total += contribution;
        if contribution >= part.observed {
            counts[i + 1] = 1;
        }
    }
    if total >= rss_obs {
        counts[0] = 1;
    }
    counts
}

pub fn presso(set: &PrunedSet, config: &PressoConfig) -> Result<OutlierReport> {
    presso_instruments(&set.instruments, config)
}

pub fn presso_instruments(
    instruments: &[HarmonizedInstrument],
    config: &PressoConfig,
) -> Result<OutlierReport> {
    config.validate()?;
    let n = instruments.len();
    if n < PRESSO_MIN_INSTRUMENTS {
        return Err(MrError::InsufficientInstruments {
            method: "Outlier test",
            required: PRESSO_MIN_INSTRUMENTS,
            found: n,
        });
    }
    check_weights(instruments)?;

    let needed = (n as f64 / config.threshold).ceil() as usize;
    if config.n_trials < needed {
        warn!(
            "{} trials cannot resolve Bonferroni-corrected p-values below {} for {n} instruments; \
             consider at least {needed}",
            config.n_trials, config.threshold
        );
    }

    let parts = leaveouts(instruments)?;
    let rss_obs: f64 = parts.iter().map(|p| p.observed).sum();

    let tallies = tally_indexed(
        config.cores,
        "build outlier test pool",
        config.n_trials,
        n + 1,
        |t| trial_counts(&parts, rss_obs, config.seed.wrapping_add(t as u64)),
    )?;
    let trials = config.n_trials as f64;
    let global_pvalue = tallies[0] as f64 / trials;
    info!("Global test: RSS = {rss_obs:.4}, p = {global_pvalue:.4}");

    let mut calls = Vec::new();
    let mut flagged = Vec::new();
    if global_pvalue < config.threshold {
        for (i, inst) in instruments.iter().enumerate() {
            let pvalue = (tallies[i + 1] as f64 / trials * n as f64).min(1.0);
            let is_outlier = pvalue < config.threshold;
            if is_outlier {
                flagged.push(inst.snp.clone());
            }
            calls.push(OutlierCall {
                snp: inst.snp.clone(),
                rss_obs: parts[i].observed,
                pvalue,
                flagged: is_outlier,
            });
        }
        info!("Outlier test flagged {} of {n} instruments", flagged.len());
    } else {
        debug!("Global test not significant; outlier test skipped");
    }

    let mut report = OutlierReport {
        rss_obs,
        global_pvalue,
        calls,
        flagged,
        distortion: None,
        corrected: None,
        n_trials: config.n_trials,
        seed: config.seed,
    };
    if report.flagged.is_empty() {
        return Ok(report);
    }

    let outlier_mask: Vec<bool> = instruments
        .iter()
        .map(|i| report.flagged.contains(&i.snp))
        .collect();
    let kept: Vec<HarmonizedInstrument> = instruments
        .iter()
        .zip(&outlier_mask)
        .filter(|(_, out)| !**out)
        .map(|(i, _)| i.clone())
        .collect();
    if kept.len() < 2 {
        warn!(
            "Only {} instrument(s) remain after removing outliers; no corrected estimate",
            kept.len()
        );
        return Ok(report);
    }
    let corrected = ivw_as(Method::OutlierCorrectedIvw, &kept)?;
    report.distortion = distortion_test(instruments, &kept, corrected.estimate, config)?;
    report.corrected = Some(corrected);
    Ok(report)
}

fn distortion_pct(all: f64, corrected: f64) -> f64 {
    100.0 * (all - corrected) / corrected.abs()
}

// Compares the observed distortion with the distortion obtained when the outliers are replaced
// by non-outliers drawn with replacement. Distortion trials continue the seed sequence after the
// global trials.
fn distortion_test(
    instruments: &[HarmonizedInstrument],
    kept: &[HarmonizedInstrument],
    corrected: f64,
    config: &PressoConfig,
) -> Result<Option<DistortionTest>> {
    if corrected.abs() < f64::EPSILON {
        warn!("Outlier-corrected estimate is zero; distortion is undefined");
        return Ok(None);
    }
    let Some(all) = IvwSums::from_instruments(instruments).slope() else {
        return Ok(None);
    };
    let observed = distortion_pct(all, corrected);
    let kept_sums = IvwSums::from_instruments(kept);
    let refill = instruments.len() - kept.len();
    let offset = config.n_trials as u64;

    let tallies = tally_indexed(
        config.cores,
        "build distortion test pool",
        config.n_trials,
        1,
        |t| {
            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(offset + t as u64));
            let mut sums = kept_sums;
            for _ in 0..refill {
                sums = sums.add(&kept[rng.random_range(0..kept.len())]);
            }
            let exceeds = sums
                .slope()
                .map(|null_all| distortion_pct(null_all, corrected).abs() > observed.abs())
                .unwrap_or(false);
            vec![usize::from(exceeds)]
        },
    )?;
    let pvalue = tallies[0] as f64 / config.n_trials as f64;
    info!("Distortion test: {observed:.2}% (p = {pvalue:.4})");
    Ok(Some(DistortionTest {
        coefficient_pct: observed,
        pvalue,
    }))
}
