use anyhow::Result;
use polars::prelude::*;

use crate::types::{
    CausalEstimate, DroppedInstrument, HarmonizedInstrument, HeterogeneityResult,
    LeaveOneOutSeries, Method, OutlierReport, PleiotropyDiagnostics, WaldRatio,
};

pub fn instruments_table(instruments: &[HarmonizedInstrument]) -> Result<DataFrame> {
    let n = instruments.len();
    let col_str = |name: &str, f: &dyn Fn(&HarmonizedInstrument) -> String| -> Column {
        Series::new(name.into(), instruments.iter().map(f).collect::<Vec<_>>()).into()
    };
    let col_f64 = |name: &str, f: &dyn Fn(&HarmonizedInstrument) -> f64| -> Column {
        Series::new(name.into(), instruments.iter().map(f).collect::<Vec<_>>()).into()
    };
    let chr: Vec<Option<u32>> = instruments.iter().map(|i| i.chr.map(u32::from)).collect();
    let bp: Vec<Option<u64>> = instruments.iter().map(|i| i.bp).collect();
    let df = DataFrame::new_with_height(
        n,
        vec![
            col_str("SNP", &|i| i.snp.clone()),
            Series::new("CHR".into(), chr).into(),
            Series::new("BP".into(), bp).into(),
            col_str("A1", &|i| i.effect_allele.clone()),
            col_str("A2", &|i| i.other_allele.clone()),
            col_f64("BETA_EXPOSURE", &|i| i.beta_exposure),
            col_f64("SE_EXPOSURE", &|i| i.se_exposure),
            col_f64("PVALUE_EXPOSURE", &|i| i.pval_exposure),
            col_f64("EAF_EXPOSURE", &|i| i.eaf_exposure),
            col_f64("BETA_OUTCOME", &|i| i.beta_outcome),
            col_f64("SE_OUTCOME", &|i| i.se_outcome),
            col_f64("PVALUE_OUTCOME", &|i| i.pval_outcome),
            col_f64("EAF_OUTCOME", &|i| i.eaf_outcome),
            col_f64("F_STAT", &|i| i.f_statistic()),
            col_str("ALIGNMENT", &|i| i.alignment.as_str().to_string()),
        ],
    )?;
    Ok(df)
}

pub fn dropped_table(dropped: &[DroppedInstrument]) -> Result<DataFrame> {
    let snp: Vec<String> = dropped.iter().map(|d| d.snp.clone()).collect();
    let reason: Vec<&str> = dropped.iter().map(|d| d.reason.as_str()).collect();
    Ok(DataFrame::new_with_height(
        dropped.len(),
        vec![
            Series::new("SNP".into(), snp).into(),
            Series::new("REASON".into(), reason).into(),
        ],
    )?)
}

fn heterogeneity_for<'a>(
    method: Method,
    diagnostics: Option<&'a PleiotropyDiagnostics>,
) -> Option<&'a HeterogeneityResult> {
    let d = diagnostics?;
    match method {
        Method::Ivw => Some(&d.ivw),
        Method::Egger => d.egger.as_ref(),
        _ => None,
    }
}

pub fn mr_results_table(
    estimates: &[&CausalEstimate],
    diagnostics: Option<&PleiotropyDiagnostics>,
) -> Result<DataFrame> {
    let n = estimates.len();
    let mut method = Vec::with_capacity(n);
    let mut estimate = Vec::with_capacity(n);
    let mut se = Vec::with_capacity(n);
    let mut ci_lower = Vec::with_capacity(n);
    let mut ci_upper = Vec::with_capacity(n);
    let mut pvalue = Vec::with_capacity(n);
    let mut n_snp = Vec::with_capacity(n);
    let mut q = Vec::with_capacity(n);
    let mut q_df = Vec::with_capacity(n);
    let mut q_p = Vec::with_capacity(n);
    let mut i2 = Vec::with_capacity(n);
    let mut intercept = Vec::with_capacity(n);
    let mut intercept_se = Vec::with_capacity(n);
    let mut intercept_p = Vec::with_capacity(n);
    for est in estimates {
        method.push(est.method.as_str());
        estimate.push(est.estimate);
        se.push(est.se);
        ci_lower.push(est.ci_lower);
        ci_upper.push(est.ci_upper);
        pvalue.push(est.pvalue);
        n_snp.push(est.n_instruments as u64);
        let het = heterogeneity_for(est.method, diagnostics);
        q.push(het.map(|h| h.q));
        q_df.push(het.map(|h| h.df as u64));
        q_p.push(het.map(|h| h.q_pvalue));
        i2.push(het.map(|h| h.i2));
        let icpt = diagnostics
            .filter(|_| est.method == Method::Egger)
            .and_then(|d| d.intercept.as_ref());
        intercept.push(icpt.map(|t| t.intercept));
        intercept_se.push(icpt.map(|t| t.se));
        intercept_p.push(icpt.map(|t| t.pvalue));
    }
    Ok(DataFrame::new_with_height(
        n,
        vec![
            Series::new("METHOD".into(), method).into(),
            Series::new("ESTIMATE".into(), estimate).into(),
            Series::new("SE".into(), se).into(),
            Series::new("CI_LOWER".into(), ci_lower).into(),
            Series::new("CI_UPPER".into(), ci_upper).into(),
            Series::new("PVALUE".into(), pvalue).into(),
            Series::new("N_SNP".into(), n_snp).into(),
            Series::new("Q".into(), q).into(),
            Series::new("Q_DF".into(), q_df).into(),
            Series::new("Q_PVALUE".into(), q_p).into(),
            Series::new("I2".into(), i2).into(),
            Series::new("INTERCEPT".into(), intercept).into(),
            Series::new("INTERCEPT_SE".into(), intercept_se).into(),
            Series::new("INTERCEPT_PVALUE".into(), intercept_p).into(),
        ],
    )?)
}

pub fn wald_ratio_table(ratios: &[WaldRatio]) -> Result<DataFrame> {
    Ok(DataFrame::new_with_height(
        ratios.len(),
        vec![
            Series::new(
                "SNP".into(),
                ratios.iter().map(|r| r.snp.clone()).collect::<Vec<_>>(),
            )
            .into(),
            Series::new("RATIO".into(), ratios.iter().map(|r| r.ratio).collect::<Vec<_>>()).into(),
            Series::new("SE".into(), ratios.iter().map(|r| r.se).collect::<Vec<_>>()).into(),
            Series::new(
                "PVALUE".into(),
                ratios.iter().map(|r| r.pvalue).collect::<Vec<_>>(),
            )
            .into(),
        ],
    )?)
}

pub fn presso_summary_table(report: &OutlierReport) -> Result<DataFrame> {
    let corrected = report.corrected.as_ref();
    Ok(DataFrame::new_with_height(
        1,
        vec![
            Series::new("RSS_OBS".into(), vec![report.rss_obs]).into(),
            Series::new("GLOBAL_PVALUE".into(), vec![report.global_pvalue]).into(),
            Series::new("N_OUTLIERS".into(), vec![report.outlier_count() as u64]).into(),
            Series::new(
                "CORRECTED_ESTIMATE".into(),
                vec![corrected.map(|c| c.estimate)],
            )
            .into(),
            Series::new("CORRECTED_SE".into(), vec![corrected.map(|c| c.se)]).into(),
            Series::new(
                "DISTORTION_PCT".into(),
                vec![report.distortion.as_ref().map(|d| d.coefficient_pct)],
            )
            .into(),
            Series::new(
                "DISTORTION_PVALUE".into(),
                vec![report.distortion.as_ref().map(|d| d.pvalue)],
            )
            .into(),
            Series::new("N_TRIALS".into(), vec![report.n_trials as u64]).into(),
            Series::new("SEED".into(), vec![report.seed]).into(),
        ],
    )?)
}

pub fn presso_outliers_table(report: &OutlierReport) -> Result<DataFrame> {
    let calls = &report.calls;
    Ok(DataFrame::new_with_height(
        calls.len(),
        vec![
            Series::new(
                "SNP".into(),
                calls.iter().map(|c| c.snp.clone()).collect::<Vec<_>>(),
            )
            .into(),
            Series::new("RSS_OBS".into(), calls.iter().map(|c| c.rss_obs).collect::<Vec<_>>())
                .into(),
            Series::new("PVALUE".into(), calls.iter().map(|c| c.pvalue).collect::<Vec<_>>()).into(),
            Series::new(
                "OUTLIER".into(),
                calls.iter().map(|c| c.flagged).collect::<Vec<_>>(),
            )
            .into(),
        ],
    )?)
}

pub fn leave_one_out_table(series: &LeaveOneOutSeries) -> Result<DataFrame> {
    let entries = &series.entries;
    let pick = |f: fn(&CausalEstimate) -> f64| -> Vec<f64> {
        entries.iter().map(|e| f(&e.estimate)).collect()
    };
    Ok(DataFrame::new_with_height(
        entries.len(),
        vec![
            Series::new(
                "EXCLUDED".into(),
                entries.iter().map(|e| e.excluded.clone()).collect::<Vec<_>>(),
            )
            .into(),
            Series::new("ESTIMATE".into(), pick(|e| e.estimate)).into(),
            Series::new("SE".into(), pick(|e| e.se)).into(),
            Series::new("CI_LOWER".into(), pick(|e| e.ci_lower)).into(),
            Series::new("CI_UPPER".into(), pick(|e| e.ci_upper)).into(),
            Series::new("PVALUE".into(), pick(|e| e.pvalue)).into(),
        ],
    )?)
}
