use tracing::{debug, warn};

use crate::error::{MrError, Result};
use crate::estimators::check_weights;
use crate::stats::chi_square_sf;
use crate::types::{
    CausalEstimate, EggerFit, HarmonizedInstrument, HeterogeneityResult, Method,
    PleiotropyDiagnostics,
};

pub const EXPOSURE_I2_WARNING: f64 = 0.9;

pub fn i_squared(q: f64, df: usize) -> f64 {
    if !(q.is_finite() && q > 0.0) {
        return 0.0;
    }
    ((q - df as f64) / q).max(0.0) * 100.0
}

pub fn cochran_q(instruments: &[HarmonizedInstrument], ivw: &CausalEstimate) -> Result<HeterogeneityResult> {
    let n = instruments.len();
    if n < 2 {
        return Err(MrError::InsufficientInstruments {
            method: "Cochran's Q",
            required: 2,
            found: n,
        });
    }
    check_weights(instruments)?;
    let q: f64 = instruments
        .iter()
        .map(|i| {
            let r = i.beta_outcome - ivw.estimate * i.beta_exposure;
            i.outcome_weight() * r * r
        })
        .sum();
    let df = n - 1;
    Ok(HeterogeneityResult {
        method: Method::Ivw,
        q,
        df,
        q_pvalue: chi_square_sf(q, df),
        i2: i_squared(q, df),
    })
}

pub fn egger_q(instruments: &[HarmonizedInstrument], fit: &EggerFit) -> Result<HeterogeneityResult> {
    let n = instruments.len();
    if n < 3 {
        return Err(MrError::InsufficientInstruments {
            method: "Rücker's Q",
            required: 3,
            found: n,
        });
    }
    check_weights(instruments)?;
    let q: f64 = instruments
        .iter()
        .map(|i| {
            let sign = if i.beta_exposure < 0.0 { -1.0 } else { 1.0 };
            let r = sign * i.beta_outcome
                - fit.intercept.intercept
                - fit.slope.estimate * sign * i.beta_exposure;
            i.outcome_weight() * r * r
        })
        .sum();
    let df = n - 2;
    Ok(HeterogeneityResult {
        method: Method::Egger,
        q,
        df,
        q_pvalue: chi_square_sf(q, df),
        i2: i_squared(q, df),
    })
}

// Heterogeneity of the oriented exposure effects (I²_GX) as a proportion in [0, 1].
pub fn exposure_i2(instruments: &[HarmonizedInstrument]) -> Option<f64> {
    let n = instruments.len();
    if n < 2 {
        return None;
    }
    let weights: Vec<f64> = instruments
        .iter()
        .map(|i| 1.0 / (i.se_exposure * i.se_exposure))
        .collect();
    if weights.iter().any(|w| !(w.is_finite() && *w > 0.0)) {
        return None;
    }
    let total: f64 = weights.iter().sum();
    let mean = instruments
        .iter()
        .zip(&weights)
        .map(|(i, w)| w * i.beta_exposure.abs())
        .sum::<f64>()
        / total;
    let q: f64 = instruments
        .iter()
        .zip(&weights)
        .map(|(i, w)| {
            let d = i.beta_exposure.abs() - mean;
            w * d * d
        })
        .sum();
    Some(i_squared(q, n - 1) / 100.0)
}

pub fn diagnostics(
    instruments: &[HarmonizedInstrument],
    ivw: &CausalEstimate,
    egger: Option<&EggerFit>,
) -> Result<PleiotropyDiagnostics> {
    let ivw_q = cochran_q(instruments, ivw)?;
    debug!(
        "Cochran's Q = {:.4} on {} df (p = {:.4e}), I2 = {:.1}%",
        ivw_q.q, ivw_q.df, ivw_q.q_pvalue, ivw_q.i2
    );

    let egger_q = match egger {
        Some(fit) => Some(egger_q(instruments, fit)?),
        None => None,
    };
    let intercept = egger.map(|fit| fit.intercept.clone());

    let exposure_i2 = exposure_i2(instruments);
    if let Some(i2) = exposure_i2
        && egger.is_some()
        && i2 < EXPOSURE_I2_WARNING
    {
        warn!(
            "Exposure-side I2 is {i2:.3}; the MR Egger slope may be diluted towards zero"
        );
    }

    Ok(PleiotropyDiagnostics {
        ivw: ivw_q,
        egger: egger_q,
        intercept,
        exposure_i2,
    })
}
