use std::collections::HashMap;
use std::fs::{File, create_dir_all, remove_file};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{self, MrError, SkipReason, Stage, StageResult};
use crate::estimators::{EstimatorConfig, egger, ivw, wald_ratios, weighted_median};
use crate::harmonize::{HarmonizeConfig, harmonize};
use crate::heterogeneity::diagnostics;
use crate::io::{read_table, records_from_frame, write_dataframe, write_json};
use crate::logging::{log_drop_summary, log_line, log_skip, open_run_log};
use crate::loo::{LooConfig, leave_one_out};
use crate::presso::{PressoConfig, presso};
use crate::prune::{PruneConfig, prune};
use crate::qc::{SelectionConfig, check_file_exists, select_instruments};
use crate::reference::{LdReference, OpenGwasClumper, ReferenceConfig};
use crate::report::{
    dropped_table, instruments_table, leave_one_out_table, mr_results_table,
    presso_outliers_table, presso_summary_table, wald_ratio_table,
};
use crate::types::{
    AssociationRecord, CausalEstimate, EggerFit, HarmonizedSet, LeaveOneOutSeries,
    OutlierReport, PleiotropyDiagnostics, PrunedSet, WaldRatio,
};

#[derive(Debug, Clone, Default)]
pub struct AnalysisConfig {
    pub harmonize: HarmonizeConfig,
    pub selection: SelectionConfig,
    pub prune: PruneConfig,
    pub estimator: EstimatorConfig,
    pub presso: PressoConfig,
    pub loo: LooConfig,
}

impl AnalysisConfig {
    pub fn validate(&self) -> error::Result<()> {
        self.harmonize.validate()?;
        self.selection.validate()?;
        self.prune.validate()?;
        self.estimator.validate()?;
        self.presso.validate()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.prune.seed = seed;
        self.estimator.seed = seed;
        self.presso.seed = seed;
        self
    }

    pub fn with_cores(mut self, cores: Option<usize>) -> Self {
        self.prune.cores = cores;
        self.estimator.cores = cores;
        self.presso.cores = cores;
        self.loo.cores = cores;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub exposure: PathBuf,
    pub outcome: PathBuf,
    pub out_dir: PathBuf,
    pub exposure_columns: HashMap<String, String>,
    pub outcome_columns: HashMap<String, String>,
    pub reference: Option<ReferenceConfig>,
    pub analysis: AnalysisConfig,
}

// IVW must succeed for the stage to count as run; the other methods may be skipped alone.
#[derive(Debug, Clone)]
pub struct EstimateSet {
    pub ivw: CausalEstimate,
    pub weighted_median: StageResult<CausalEstimate>,
    pub egger: StageResult<EggerFit>,
    pub wald_ratios: Vec<WaldRatio>,
}

impl EstimateSet {
    pub fn estimates(&self) -> Vec<&CausalEstimate> {
        let mut out = vec![&self.ivw];
        if let Ok(wm) = &self.weighted_median {
            out.push(wm);
        }
        if let Ok(fit) = &self.egger {
            out.push(&fit.slope);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestCounts {
    pub exposure: usize,
    pub outcome: usize,
}

#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub ingested: StageResult<IngestCounts>,
    pub harmonized: StageResult<HarmonizedSet>,
    pub selected: StageResult<HarmonizedSet>,
    pub pruned: StageResult<PrunedSet>,
    pub estimates: StageResult<EstimateSet>,
    pub diagnostics: StageResult<PleiotropyDiagnostics>,
    pub presso: StageResult<OutlierReport>,
    pub leave_one_out: StageResult<LeaveOneOutSeries>,
}

fn run_stage<T>(stage: Stage, f: impl FnOnce() -> error::Result<T>) -> StageResult<T> {
    f().map_err(|err| {
        let reason = SkipReason::new(stage, &err);
        warn!("{reason}");
        reason
    })
}

fn after<U, T>(
    stage: Stage,
    upstream: &StageResult<U>,
    f: impl FnOnce(&U) -> error::Result<T>,
) -> StageResult<T> {
    match upstream {
        Ok(value) => run_stage(stage, || f(value)),
        Err(skip) => {
            let reason = SkipReason::upstream(stage, skip);
            warn!("{reason}");
            Err(reason)
        }
    }
}

type Tables<'a> = (&'a [AssociationRecord], &'a [AssociationRecord]);

// Only an invalid configuration is an error; stage failures are reported as skips.
pub fn run_analysis(
    exposure: &[AssociationRecord],
    outcome: &[AssociationRecord],
    config: &AnalysisConfig,
    reference: Option<&dyn LdReference>,
) -> error::Result<AnalysisOutput> {
    analyze(&Ok((exposure, outcome)), config, reference)
}

fn analyze(
    tables: &StageResult<Tables<'_>>,
    config: &AnalysisConfig,
    reference: Option<&dyn LdReference>,
) -> error::Result<AnalysisOutput> {
    config.validate()?;

    let ingested = tables
        .as_ref()
        .map(|(exposure, outcome)| IngestCounts {
            exposure: exposure.len(),
            outcome: outcome.len(),
        })
        .map_err(Clone::clone);
    let harmonized = after(Stage::Harmonize, tables, |(exposure, outcome)| {
        harmonize(exposure, outcome, &config.harmonize)
    });
    let selected = after(Stage::Select, &harmonized, |set| {
        select_instruments(set, &config.selection)
    });
    let pruned = after(Stage::Prune, &selected, |set| {
        prune(set, &config.prune, reference)
    });

    let estimates = after(Stage::Estimate, &pruned, |set| {
        let ivw = ivw(&set.instruments)?;
        info!(
            "IVW estimate {:.4} (SE {:.4}, p = {:.3e}) from {} instruments",
            ivw.estimate, ivw.se, ivw.pvalue, ivw.n_instruments
        );
        let weighted_median = run_stage(Stage::Estimate, || {
            weighted_median(&set.instruments, &config.estimator)
        });
        let egger = run_stage(Stage::Estimate, || egger(&set.instruments));
        Ok(EstimateSet {
            ivw,
            weighted_median,
            egger,
            wald_ratios: wald_ratios(&set.instruments),
        })
    });

    let diagnostics = match (&pruned, &estimates) {
        (Ok(set), Ok(est)) => run_stage(Stage::Heterogeneity, || {
            diagnostics(&set.instruments, &est.ivw, est.egger.as_ref().ok())
        }),
        (_, Err(skip)) | (Err(skip), _) => Err(SkipReason::upstream(Stage::Heterogeneity, skip)),
    };

    let presso = after(Stage::Presso, &pruned, |set| presso(set, &config.presso));
    let leave_one_out = after(Stage::LeaveOneOut, &pruned, |set| {
        leave_one_out(set, &config.loo)
    });

    Ok(AnalysisOutput {
        ingested,
        harmonized,
        selected,
        pruned,
        estimates,
        diagnostics,
        presso,
        leave_one_out,
    })
}

#[derive(Debug, Serialize)]
pub struct StageStatus {
    pub stage: Stage,
    pub status: &'static str,
    pub n_instruments: Option<usize>,
    pub skip: Option<SkipReason>,
}

impl StageStatus {
    fn of<T>(stage: Stage, result: &StageResult<T>, count: impl Fn(&T) -> Option<usize>) -> Self {
        match result {
            Ok(value) => Self {
                stage,
                status: "ok",
                n_instruments: count(value),
                skip: None,
            },
            Err(reason) => Self {
                stage,
                status: "skipped",
                n_instruments: None,
                skip: Some(reason.clone()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub stages: Vec<StageStatus>,
    // Estimators skipped inside an otherwise completed estimate stage.
    pub method_skips: Vec<SkipReason>,
}

impl RunSummary {
    pub fn from_output(output: &AnalysisOutput) -> Self {
        let mut method_skips = Vec::new();
        if let Ok(est) = &output.estimates {
            if let Err(r) = &est.weighted_median {
                method_skips.push(r.clone());
            }
            if let Err(r) = &est.egger {
                method_skips.push(r.clone());
            }
        }
        Self {
            stages: vec![
                StageStatus::of(Stage::Ingest, &output.ingested, |c| Some(c.exposure)),
                StageStatus::of(Stage::Harmonize, &output.harmonized, |s| Some(s.len())),
                StageStatus::of(Stage::Select, &output.selected, |s| Some(s.len())),
                StageStatus::of(Stage::Prune, &output.pruned, |s| Some(s.len())),
                StageStatus::of(Stage::Estimate, &output.estimates, |e| {
                    Some(e.ivw.n_instruments)
                }),
                StageStatus::of(Stage::Heterogeneity, &output.diagnostics, |d| {
                    Some(d.ivw.df + 1)
                }),
                StageStatus::of(Stage::Presso, &output.presso, |_| {
                    output.pruned.as_ref().ok().map(|s| s.len())
                }),
                StageStatus::of(Stage::LeaveOneOut, &output.leave_one_out, |s| Some(s.len())),
            ],
            method_skips,
        }
    }
}

const ARTIFACTS: [&str; 9] = [
    "harmonized.tsv",
    "dropped.tsv",
    "pruned.tsv",
    "mr_results.tsv",
    "wald_ratios.tsv",
    "presso_summary.tsv",
    "presso_outliers.tsv",
    "leave_one_out.tsv",
    "run_summary.json",
];

// Tables and sentinels left by an earlier run into the same directory would contradict this one.
fn clear_artifacts(out_dir: &Path) -> Result<()> {
    let sentinels = Stage::ALL.iter().map(|s| format!("{s}.skipped.json"));
    for name in ARTIFACTS.iter().map(|s| s.to_string()).chain(sentinels) {
        let path = out_dir.join(&name);
        match remove_file(&path) {
            Ok(()) => debug!("Removed previous {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }
    Ok(())
}

fn write_skip(out_dir: &Path, log: &mut File, reason: &SkipReason) -> Result<()> {
    log_skip(log, reason)?;
    write_json(reason, &out_dir.join(format!("{}.skipped.json", reason.stage)))
}

pub fn write_outputs(output: &AnalysisOutput, out_dir: &Path, log: &mut File) -> Result<()> {
    clear_artifacts(out_dir)?;
    match &output.ingested {
        Ok(counts) => log_line(
            log,
            &format!(
                "Loaded {} exposure and {} outcome records",
                counts.exposure, counts.outcome
            ),
            true,
        )?,
        Err(reason) => write_skip(out_dir, log, reason)?,
    }
    match &output.harmonized {
        Ok(set) => {
            write_dataframe(&instruments_table(&set.instruments)?, &out_dir.join("harmonized.tsv"))?;
            log_line(log, &format!("Harmonized instruments: {}", set.len()), true)?;
        }
        Err(reason) => write_skip(out_dir, log, reason)?,
    }
    match (&output.selected, &output.harmonized) {
        (Ok(set), _) | (Err(_), Ok(set)) => {
            log_drop_summary(log, "instrument QC", &set.dropped)?;
            write_dataframe(&dropped_table(&set.dropped)?, &out_dir.join("dropped.tsv"))?;
        }
        _ => {}
    }
    if let Err(reason) = &output.selected {
        write_skip(out_dir, log, reason)?;
    }
    match &output.pruned {
        Ok(set) => {
            write_dataframe(&instruments_table(&set.instruments)?, &out_dir.join("pruned.tsv"))?;
            log_line(
                log,
                &format!(
                    "Pruning ({}) kept {} instruments, removed {}",
                    set.method.as_str(),
                    set.len(),
                    set.removed.len()
                ),
                true,
            )?;
        }
        Err(reason) => write_skip(out_dir, log, reason)?,
    }

    let corrected = output
        .presso
        .as_ref()
        .ok()
        .and_then(|r| r.corrected.as_ref());
    match &output.estimates {
        Ok(est) => {
            let mut rows = est.estimates();
            if let Some(c) = corrected {
                rows.push(c);
            }
            let table = mr_results_table(&rows, output.diagnostics.as_ref().ok())?;
            write_dataframe(&table, &out_dir.join("mr_results.tsv"))?;
            write_dataframe(&wald_ratio_table(&est.wald_ratios)?, &out_dir.join("wald_ratios.tsv"))?;
            for row in rows {
                log_line(
                    log,
                    &format!(
                        "{}: {:.4} (95% CI {:.4} to {:.4}, p = {:.3e})",
                        row.method, row.estimate, row.ci_lower, row.ci_upper, row.pvalue
                    ),
                    true,
                )?;
            }
            for reason in [est.weighted_median.as_ref().err(), est.egger.as_ref().err()]
                .into_iter()
                .flatten()
            {
                log_skip(log, reason)?;
            }
        }
        Err(reason) => write_skip(out_dir, log, reason)?,
    }
    if let Err(reason) = &output.diagnostics {
        write_skip(out_dir, log, reason)?;
    }

    match &output.presso {
        Ok(report) => {
            write_dataframe(&presso_summary_table(report)?, &out_dir.join("presso_summary.tsv"))?;
            write_dataframe(&presso_outliers_table(report)?, &out_dir.join("presso_outliers.tsv"))?;
            log_line(
                log,
                &format!(
                    "Global test p = {:.4}; outliers: {}",
                    report.global_pvalue,
                    if report.flagged.is_empty() {
                        "none".to_string()
                    } else {
                        report.flagged.join(", ")
                    }
                ),
                true,
            )?;
        }
        Err(reason) => write_skip(out_dir, log, reason)?,
    }
    match &output.leave_one_out {
        Ok(series) => {
            write_dataframe(&leave_one_out_table(series)?, &out_dir.join("leave_one_out.tsv"))?;
        }
        Err(reason) => write_skip(out_dir, log, reason)?,
    }

    write_json(&RunSummary::from_output(output), &out_dir.join("run_summary.json"))
}

fn build_reference(config: &PipelineConfig) -> Result<Option<Box<dyn LdReference>>> {
    let Some(reference) = &config.reference else {
        return Ok(None);
    };
    match OpenGwasClumper::new(reference.clone().with_env_token()) {
        Ok(client) => Ok(Some(Box::new(client))),
        Err(err @ MrError::ExternalService(_)) if config.analysis.prune.fallback => {
            warn!("{err}; pruning will use simulated genotypes");
            Ok(None)
        }
        Err(err) => Err(err).context("configure LD reference"),
    }
}

pub fn run_pipeline(config: &PipelineConfig) -> Result<AnalysisOutput> {
    check_file_exists(&config.exposure, "exposure")?;
    check_file_exists(&config.outcome, "outcome")?;
    config.analysis.validate()?;
    create_dir_all(&config.out_dir)
        .with_context(|| format!("create {}", config.out_dir.display()))?;
    let mut log = open_run_log(&config.out_dir, "mrcope")?;
    log_line(
        &mut log,
        &format!(
            "Analysis started: exposure {}, outcome {}",
            config.exposure.display(),
            config.outcome.display()
        ),
        true,
    )?;

    // Unreadable files abort the run; tables that parse but fail validation skip ingestion.
    let exposure_frame = read_table(&config.exposure).context("read exposure table")?;
    let outcome_frame = read_table(&config.outcome).context("read outcome table")?;
    let ingested = run_stage(Stage::Ingest, || {
        let exposure = records_from_frame(exposure_frame, "exposure", &config.exposure_columns)?;
        let outcome = records_from_frame(outcome_frame, "outcome", &config.outcome_columns)?;
        Ok((exposure, outcome))
    });
    let reference = build_reference(config)?;

    let tables = ingested
        .as_ref()
        .map(|(exposure, outcome)| (exposure.as_slice(), outcome.as_slice()))
        .map_err(Clone::clone);
    let output = analyze(&tables, &config.analysis, reference.as_deref())?;
    write_outputs(&output, &config.out_dir, &mut log)?;
    log_line(
        &mut log,
        &format!("Results written to {}", config.out_dir.display()),
        true,
    )?;
    Ok(output)
}
