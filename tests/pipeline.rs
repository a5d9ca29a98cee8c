mod common;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use common::{record, scenario_records};
use mrcope::error::Stage;
use mrcope::io::write_dataframe;
use mrcope::pipeline::{AnalysisConfig, PipelineConfig, run_analysis, run_pipeline};
use mrcope::qc::SelectionConfig;
use mrcope::simulate::{SimulateConfig, records_table, simulate};
use mrcope::types::{AssociationRecord, Method, PruneMethod};
use tempfile::TempDir;

#[test]
fn end_to_end_flags_the_pleiotropic_instrument() {
    let (exposure, outcome) = scenario_records();
    let output = run_analysis(&exposure, &outcome, &AnalysisConfig::default(), None)
        .expect("valid configuration");

    let pruned = output.pruned.as_ref().expect("pruned");
    assert_eq!(pruned.len(), 5);
    assert_eq!(pruned.method, PruneMethod::Simulation);

    let estimates = output.estimates.as_ref().expect("estimates");
    assert!(estimates.ivw.estimate > 0.30);
    assert!(estimates.weighted_median.is_ok());
    assert!(estimates.egger.is_ok());
    assert_eq!(estimates.wald_ratios.len(), 5);

    let report = output.presso.as_ref().expect("presso");
    assert!(report.global_pvalue < 0.05);
    assert!(report.flagged.contains(&"rs5".to_string()));
    let corrected = report.corrected.as_ref().expect("corrected");
    assert!((corrected.estimate - 0.30).abs() < 0.02);

    let diagnostics = output.diagnostics.as_ref().expect("diagnostics");
    assert!(diagnostics.ivw.q_pvalue < 0.05);

    let loo = output.leave_one_out.as_ref().expect("leave-one-out");
    assert_eq!(loo.len(), pruned.len());
}

#[test]
fn skipped_stages_propagate_downstream() {
    let (exposure, outcome) = scenario_records();
    let config = AnalysisConfig {
        selection: SelectionConfig {
            min_f_statistic: 1e6,
            ..SelectionConfig::default()
        },
        ..AnalysisConfig::default()
    };
    let output = run_analysis(&exposure, &outcome, &config, None).expect("valid configuration");
    assert!(output.harmonized.is_ok());
    let select = output.selected.as_ref().expect_err("selection skipped");
    assert_eq!(select.kind, "InsufficientDataError");
    assert!(select.recoverable);

    let prune = output.pruned.as_ref().expect_err("prune skipped");
    assert_eq!(prune.stage, Stage::Prune);
    assert_eq!(prune.kind, "UpstreamSkipped");
    assert!(output.estimates.is_err());
    assert!(output.diagnostics.is_err());
    assert!(output.presso.is_err());
    assert!(output.leave_one_out.is_err());
}

#[test]
fn small_sets_skip_only_the_methods_that_need_more() {
    let exposure = vec![
        record("rs1", "A", "G", 0.10, 0.02, 0.3),
        record("rs2", "C", "T", 0.20, 0.02, 0.3),
    ];
    let outcome = vec![
        record("rs1", "A", "G", 0.03, 0.05, 0.3),
        record("rs2", "C", "T", 0.06, 0.05, 0.3),
    ];
    let output = run_analysis(&exposure, &outcome, &AnalysisConfig::default(), None)
        .expect("valid configuration");
    let estimates = output.estimates.as_ref().expect("ivw runs on two instruments");
    assert_eq!(estimates.ivw.method, Method::Ivw);
    assert_eq!(
        estimates.weighted_median.as_ref().expect_err("median skipped").kind,
        "InsufficientInstrumentsError"
    );
    assert!(estimates.egger.is_err());
    assert!(output.diagnostics.is_ok());
    assert_eq!(
        output.presso.as_ref().expect_err("presso skipped").stage,
        Stage::Presso
    );
    assert!(output.leave_one_out.is_err());
}

#[test]
fn invalid_configuration_is_rejected_up_front() {
    let (exposure, outcome) = scenario_records();
    let mut config = AnalysisConfig::default();
    config.harmonize.palindrome_tolerance = 0.9;
    assert!(run_analysis(&exposure, &outcome, &config, None).is_err());
}

#[test]
fn pipeline_writes_artifacts_and_sentinels() {
    let dir = TempDir::new().expect("temp dir");
    let (exposure, outcome) = scenario_records();
    let exposure_path = dir.path().join("exposure.tsv");
    let outcome_path = dir.path().join("outcome.tsv");
    write_dataframe(&records_table(&exposure).expect("table"), &exposure_path).expect("write");
    write_dataframe(&records_table(&outcome).expect("table"), &outcome_path).expect("write");

    let out_dir = dir.path().join("results");
    let config = PipelineConfig {
        exposure: exposure_path,
        outcome: outcome_path,
        out_dir: out_dir.clone(),
        exposure_columns: HashMap::new(),
        outcome_columns: HashMap::new(),
        reference: None,
        analysis: AnalysisConfig::default(),
    };
    run_pipeline(&config).expect("pipeline");
    for name in [
        "harmonized.tsv",
        "dropped.tsv",
        "pruned.tsv",
        "mr_results.tsv",
        "wald_ratios.tsv",
        "presso_summary.tsv",
        "presso_outliers.tsv",
        "leave_one_out.tsv",
        "run_summary.json",
        "mrcope.log",
    ] {
        assert!(out_dir.join(name).exists(), "{name} missing");
    }
    let results = fs::read_to_string(out_dir.join("mr_results.tsv")).expect("read results");
    assert!(results.contains("Inverse variance weighted"));
    assert!(results.contains("Outlier-corrected IVW"));

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out_dir.join("run_summary.json")).expect("read"))
            .expect("json");
    let stages = summary["stages"].as_array().expect("stages");
    assert_eq!(stages.len(), 8);
    assert!(stages.iter().all(|s| s["status"] == "ok"));
    let presso = stages
        .iter()
        .find(|s| s["stage"] == "presso")
        .expect("presso status");
    assert_eq!(presso["n_instruments"], 5);

    // Three instruments: outlier detection is skipped and leaves a sentinel.
    let small_dir = dir.path().join("small");
    let exposure_path = dir.path().join("exposure_small.tsv");
    let outcome_path = dir.path().join("outcome_small.tsv");
    write_dataframe(&records_table(&exposure[..3]).expect("table"), &exposure_path).expect("write");
    write_dataframe(&records_table(&outcome[..3]).expect("table"), &outcome_path).expect("write");
    let config = PipelineConfig {
        exposure: exposure_path,
        outcome: outcome_path,
        out_dir: small_dir.clone(),
        ..config
    };
    run_pipeline(&config).expect("pipeline");
    assert!(small_dir.join("presso.skipped.json").exists());
    assert!(!small_dir.join("presso_summary.tsv").exists());
    assert!(small_dir.join("leave_one_out.tsv").exists());
}

#[test]
fn simulated_data_recovers_the_causal_effect() {
    let sim = SimulateConfig {
        n_instruments: 100,
        seed: 5,
        ..SimulateConfig::default()
    };
    let (exposure, outcome) = simulate(&sim).expect("simulate");
    let output = run_analysis(&exposure, &outcome, &AnalysisConfig::default(), None)
        .expect("valid configuration");
    let estimates = output.estimates.as_ref().expect("estimates");
    assert!(
        (estimates.ivw.estimate - sim.causal_effect).abs() < 0.1,
        "ivw {}",
        estimates.ivw.estimate
    );
}

fn write_tables(dir: &Path, exposure: &[AssociationRecord], outcome: &[AssociationRecord]) {
    write_dataframe(&records_table(exposure).expect("table"), &dir.join("exposure.tsv")).expect("write");
    write_dataframe(&records_table(outcome).expect("table"), &dir.join("outcome.tsv")).expect("write");
}

fn config_for(dir: &Path, out_dir: &Path) -> PipelineConfig {
    PipelineConfig {
        exposure: dir.join("exposure.tsv"),
        outcome: dir.join("outcome.tsv"),
        out_dir: out_dir.to_path_buf(),
        exposure_columns: HashMap::new(),
        outcome_columns: HashMap::new(),
        reference: None,
        analysis: AnalysisConfig::default(),
    }
}

#[test]
fn invalid_tables_skip_ingestion_and_still_write_a_summary() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(
        dir.path().join("exposure.csv"),
        "SNP,A1,A2,BETA,SE,EAF\nrs1,A,G,0.1,0.02,0.3\n",
    )
    .expect("write exposure");
    let (_, outcome) = scenario_records();
    write_dataframe(
        &records_table(&outcome).expect("table"),
        &dir.path().join("outcome.tsv"),
    )
    .expect("write outcome");

    let out_dir = dir.path().join("results");
    let config = PipelineConfig {
        exposure: dir.path().join("exposure.csv"),
        ..config_for(dir.path(), &out_dir)
    };
    let output = run_pipeline(&config).expect("validation failures are not fatal");
    let ingest = output.ingested.as_ref().expect_err("ingest skipped");
    assert_eq!(ingest.stage, Stage::Ingest);
    assert_eq!(ingest.kind, "InputValidationError");
    assert!(ingest.recoverable);
    assert!(ingest.message.contains("PVALUE"));
    assert_eq!(
        output.harmonized.as_ref().expect_err("harmonize skipped").kind,
        "UpstreamSkipped"
    );
    assert!(output.leave_one_out.is_err());

    assert!(out_dir.join("ingest.skipped.json").exists());
    assert!(out_dir.join("harmonize.skipped.json").exists());
    assert!(!out_dir.join("harmonized.tsv").exists());
    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out_dir.join("run_summary.json")).expect("read"))
            .expect("json");
    let stages = summary["stages"].as_array().expect("stages");
    assert_eq!(stages[0]["stage"], "ingest");
    assert_eq!(stages[0]["status"], "skipped");
    assert_eq!(stages[0]["skip"]["kind"], "InputValidationError");
    assert!(stages.iter().all(|s| s["status"] == "skipped"));
}

#[test]
fn reused_output_directory_holds_only_the_latest_run() {
    let dir = TempDir::new().expect("temp dir");
    let out_dir = dir.path().join("results");
    let (exposure, outcome) = scenario_records();

    write_tables(dir.path(), &exposure, &outcome);
    run_pipeline(&config_for(dir.path(), &out_dir)).expect("full run");
    assert!(out_dir.join("presso_summary.tsv").exists());

    write_tables(dir.path(), &exposure[..3], &outcome[..3]);
    run_pipeline(&config_for(dir.path(), &out_dir)).expect("small run");
    assert!(out_dir.join("presso.skipped.json").exists());
    assert!(!out_dir.join("presso_summary.tsv").exists());
    assert!(!out_dir.join("presso_outliers.tsv").exists());

    write_tables(dir.path(), &exposure, &outcome);
    run_pipeline(&config_for(dir.path(), &out_dir)).expect("full run again");
    assert!(!out_dir.join("presso.skipped.json").exists());
    assert!(out_dir.join("presso_summary.tsv").exists());
}
