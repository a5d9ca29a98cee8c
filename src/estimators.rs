use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, warn};

use crate::error::{MrError, Result};
use crate::parallel::map_indexed;
use crate::qc::check_min_usize;
use crate::stats::{Z_975, normal_two_sided_p, sample_sd, t_quantile_975, t_two_sided_p};
use crate::types::{
    CausalEstimate, EggerFit, HarmonizedInstrument, InterceptTest, Method, WaldRatio,
};

pub const IVW_MIN_INSTRUMENTS: usize = 2;
pub const MEDIAN_MIN_INSTRUMENTS: usize = 3;
pub const EGGER_MIN_INSTRUMENTS: usize = 3;

pub const MIN_ABS_EXPOSURE: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    pub bootstrap_replicates: usize,
    pub seed: u64,
    pub cores: Option<usize>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            bootstrap_replicates: 1000,
            seed: 42,
            cores: None,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<()> {
        check_min_usize(self.bootstrap_replicates, 2, "bootstrap_replicates")
    }
}

pub fn check_weights(instruments: &[HarmonizedInstrument]) -> Result<()> {
    for inst in instruments {
        let w = inst.outcome_weight();
        if !(inst.se_outcome > 0.0 && w.is_finite()) {
            return Err(MrError::InputValidation(format!(
                "instrument {} has a non-positive outcome weight (SE = {})",
                inst.snp, inst.se_outcome
            )));
        }
        if !inst.beta_exposure.is_finite() || !inst.beta_outcome.is_finite() {
            return Err(MrError::InputValidation(format!(
                "instrument {} has a non-finite effect size",
                inst.snp
            )));
        }
    }
    Ok(())
}

fn require(method: Method, required: usize, found: usize) -> Result<()> {
    if found < required {
        return Err(MrError::InsufficientInstruments {
            method: method.as_str(),
            required,
            found,
        });
    }
    Ok(())
}

fn normal_estimate(method: Method, estimate: f64, se: f64, n: usize) -> CausalEstimate {
    CausalEstimate {
        method,
        estimate,
        se,
        ci_lower: estimate - Z_975 * se,
        ci_upper: estimate + Z_975 * se,
        pvalue: normal_two_sided_p(estimate / se),
        n_instruments: n,
    }
}

// Running sums of the weighted regression through the origin, `sum(w*bx*by)` and
// `sum(w*bx^2)`. Subtracting one instrument's terms gives its leave-one-out slope in O(1).
#[derive(Debug, Clone, Copy, Default)]
pub struct IvwSums {
    pub sxy: f64,
    pub sxx: f64,
}

impl IvwSums {
    pub fn from_instruments(instruments: &[HarmonizedInstrument]) -> Self {
        instruments.iter().fold(Self::default(), |acc, i| acc.add(i))
    }

    pub fn add(self, inst: &HarmonizedInstrument) -> Self {
        let w = inst.outcome_weight();
        Self {
            sxy: self.sxy + w * inst.beta_exposure * inst.beta_outcome,
            sxx: self.sxx + w * inst.beta_exposure * inst.beta_exposure,
        }
    }

    pub fn remove(self, inst: &HarmonizedInstrument) -> Self {
        let w = inst.outcome_weight();
        Self {
            sxy: self.sxy - w * inst.beta_exposure * inst.beta_outcome,
            sxx: self.sxx - w * inst.beta_exposure * inst.beta_exposure,
        }
    }

    pub fn slope(&self) -> Option<f64> {
        (self.sxx > 0.0 && self.sxx.is_finite()).then(|| self.sxy / self.sxx)
    }
}

pub fn ivw(instruments: &[HarmonizedInstrument]) -> Result<CausalEstimate> {
    ivw_as(Method::Ivw, instruments)
}

pub(crate) fn ivw_as(method: Method, instruments: &[HarmonizedInstrument]) -> Result<CausalEstimate> {
    require(method, IVW_MIN_INSTRUMENTS, instruments.len())?;
    check_weights(instruments)?;
    let sums = IvwSums::from_instruments(instruments);
    let Some(beta) = sums.slope() else {
        return Err(MrError::DegenerateRatio(
            "all exposure effects are zero; the weighted slope is undefined".into(),
        ));
    };
    let se = (1.0 / sums.sxx).sqrt();
    Ok(normal_estimate(method, beta, se, instruments.len()))
}

pub fn wald_ratios(instruments: &[HarmonizedInstrument]) -> Vec<WaldRatio> {
    instruments
        .iter()
        .filter_map(|inst| {
            if inst.beta_exposure.abs() < MIN_ABS_EXPOSURE {
                warn!(
                    "Skipping ratio estimate for {}: exposure effect is numerically zero",
                    inst.snp
                );
                return None;
            }
            let ratio = inst.beta_outcome / inst.beta_exposure;
            let se = inst.se_outcome / inst.beta_exposure.abs();
            Some(WaldRatio {
                snp: inst.snp.clone(),
                ratio,
                se,
                pvalue: normal_two_sided_p(ratio / se),
            })
        })
        .collect()
}

// Weighted median of `values`, interpolating where the cumulative weight (minus half of each
// point's own weight) crosses one half.
pub fn weighted_median_point(values: &[f64], weights: &[f64]) -> f64 {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let total: f64 = weights.iter().sum();
    let sorted: Vec<f64> = order.iter().map(|&i| values[i]).collect();
    let mut cumulative = Vec::with_capacity(order.len());
    let mut running = 0.0;
    for &i in &order {
        let w = weights[i] / total;
        running += w;
        cumulative.push(running - 0.5 * w);
    }
    let Some(below) = cumulative.iter().rposition(|&p| p < 0.5) else {
        return sorted[0];
    };
    if below + 1 >= sorted.len() {
        return sorted[below];
    }
    let (p0, p1) = (cumulative[below], cumulative[below + 1]);
    sorted[below] + (sorted[below + 1] - sorted[below]) * (0.5 - p0) / (p1 - p0)
}

struct RatioInputs {
    bx: Vec<f64>,
    by: Vec<f64>,
    se_x: Vec<f64>,
    se_y: Vec<f64>,
    weights: Vec<f64>,
}

fn ratio_inputs(instruments: &[HarmonizedInstrument]) -> RatioInputs {
    let mut inputs = RatioInputs {
        bx: Vec::with_capacity(instruments.len()),
        by: Vec::with_capacity(instruments.len()),
        se_x: Vec::with_capacity(instruments.len()),
        se_y: Vec::with_capacity(instruments.len()),
        weights: Vec::with_capacity(instruments.len()),
    };
    for inst in instruments {
        if inst.beta_exposure.abs() < MIN_ABS_EXPOSURE {
            warn!(
                "Excluding {} from the weighted median: exposure effect is numerically zero",
                inst.snp
            );
            continue;
        }
        inputs.bx.push(inst.beta_exposure);
        inputs.by.push(inst.beta_outcome);
        inputs.se_x.push(inst.se_exposure);
        inputs.se_y.push(inst.se_outcome);
        // inverse first-order variance of the ratio
        inputs
            .weights
            .push(inst.beta_exposure * inst.beta_exposure * inst.outcome_weight());
    }
    inputs
}

pub fn weighted_median(
    instruments: &[HarmonizedInstrument],
    config: &EstimatorConfig,
) -> Result<CausalEstimate> {
    config.validate()?;
    check_weights(instruments)?;
    let inputs = ratio_inputs(instruments);
    let n = inputs.bx.len();
    require(Method::WeightedMedian, MEDIAN_MIN_INSTRUMENTS, n)?;

    let ratios: Vec<f64> = inputs
        .by
        .iter()
        .zip(&inputs.bx)
        .map(|(y, x)| y / x)
        .collect();
    let estimate = weighted_median_point(&ratios, &inputs.weights);

    let replicates = map_indexed(
        config.cores,
        "build weighted median bootstrap pool",
        config.bootstrap_replicates,
        |r| Ok(bootstrap_replicate(&inputs, config.seed.wrapping_add(r as u64))),
    )?;
    let finite: Vec<f64> = replicates.into_iter().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return Err(MrError::DegenerateRatio(
            "weighted median bootstrap produced no finite replicates".into(),
        ));
    }
    let se = sample_sd(&finite);
    debug!(
        "weighted median: estimate={estimate}, se={se}, replicates={}",
        finite.len()
    );
    Ok(normal_estimate(Method::WeightedMedian, estimate, se, n))
}

fn bootstrap_replicate(inputs: &RatioInputs, seed: u64) -> f64 {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut ratios = Vec::with_capacity(inputs.bx.len());
    for i in 0..inputs.bx.len() {
        let (Ok(dx), Ok(dy)) = (
            Normal::new(inputs.bx[i], inputs.se_x[i]),
            Normal::new(inputs.by[i], inputs.se_y[i]),
        ) else {
            return f64::NAN;
        };
        let x = dx.sample(&mut rng);
        let y = dy.sample(&mut rng);
        let ratio = y / x;
        if !ratio.is_finite() {
            return f64::NAN;
        }
        ratios.push(ratio);
    }
    weighted_median_point(&ratios, &inputs.weights)
}

pub fn egger(instruments: &[HarmonizedInstrument]) -> Result<EggerFit> {
    let n = instruments.len();
    require(Method::Egger, EGGER_MIN_INSTRUMENTS, n)?;
    check_weights(instruments)?;

    let mut bx = Vec::with_capacity(n);
    let mut by = Vec::with_capacity(n);
    let mut w = Vec::with_capacity(n);
    for inst in instruments {
        let sign = if inst.beta_exposure < 0.0 { -1.0 } else { 1.0 };
        bx.push(inst.beta_exposure * sign);
        by.push(inst.beta_outcome * sign);
        w.push(inst.outcome_weight());
    }

    let sw: f64 = w.iter().sum();
    let swx: f64 = bx.iter().zip(&w).map(|(x, w)| w * x).sum();
    let swy: f64 = by.iter().zip(&w).map(|(y, w)| w * y).sum();
    let swxx: f64 = bx.iter().zip(&w).map(|(x, w)| w * x * x).sum();
    let swxy: f64 = bx
        .iter()
        .zip(&by)
        .zip(&w)
        .map(|((x, y), w)| w * x * y)
        .sum();
    let det = sw * swxx - swx * swx;
    if !(det.is_finite() && det > 1e-12 * sw * swxx) {
        return Err(MrError::SingularDesign(
            "exposure effects do not vary; the Egger slope and intercept are not identifiable"
                .into(),
        ));
    }

    let slope = (sw * swxy - swx * swy) / det;
    let intercept = (swxx * swy - swx * swxy) / det;

    let rss: f64 = bx
        .iter()
        .zip(&by)
        .zip(&w)
        .map(|((x, y), w)| {
            let r = y - intercept - slope * x;
            w * r * r
        })
        .sum();
    let df = (n - 2) as f64;
    let residual_se = (rss / df).sqrt();
    // Known weights: residual dispersion only ever inflates the standard errors.
    let scale = residual_se.max(1.0);
    let se_slope = (sw / det).sqrt() * scale;
    let se_intercept = (swxx / det).sqrt() * scale;
    let tq = t_quantile_975(df);

    Ok(EggerFit {
        slope: CausalEstimate {
            method: Method::Egger,
            estimate: slope,
            se: se_slope,
            ci_lower: slope - tq * se_slope,
            ci_upper: slope + tq * se_slope,
            pvalue: t_two_sided_p(slope / se_slope, df),
            n_instruments: n,
        },
        intercept: InterceptTest {
            intercept,
            se: se_intercept,
            pvalue: t_two_sided_p(intercept / se_intercept, df),
        },
        residual_se,
    })
}
