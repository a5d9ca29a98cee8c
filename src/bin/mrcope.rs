use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};

use mrcope::estimators::EstimatorConfig;
use mrcope::harmonize::HarmonizeConfig;
use mrcope::logging::init_tracing;
use mrcope::loo::LooConfig;
use mrcope::pipeline::{AnalysisConfig, PipelineConfig, run_pipeline};
use mrcope::presso::PressoConfig;
use mrcope::prune::{PruneConfig, PruneOrder};
use mrcope::qc::SelectionConfig;
use mrcope::reference::{DEFAULT_BASE_URL, ReferenceConfig};
use mrcope::simulate::{SimulateConfig, write_simulated};

#[derive(Parser)]
#[command(name = "mrcope")]
#[command(about = "Mendelian randomization from GWAS summary statistics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderArg {
    Significance,
    Input,
}

#[derive(Subcommand)]
enum Command {
    Run {
        #[arg(long, required = true)]
        exposure: PathBuf,
        #[arg(long, required = true)]
        outcome: PathBuf,
        #[arg(long, default_value = "mrcope_results")]
        out_dir: PathBuf,
        #[arg(long = "exposure-column")]
        exposure_columns: Vec<String>,
        #[arg(long = "outcome-column")]
        outcome_columns: Vec<String>,
        #[arg(long, default_value_t = 0.08)]
        palindrome_tolerance: f64,
        #[arg(long)]
        keep_indels: bool,
        #[arg(long, default_value_t = 10.0)]
        min_f: f64,
        #[arg(long)]
        exposure_p: Option<f64>,
        #[arg(long)]
        outcome_p_floor: Option<f64>,
        #[arg(long)]
        min_eaf: Option<f64>,
        #[arg(long, default_value_t = 0.001)]
        r2: f64,
        #[arg(long, default_value_t = 10_000)]
        window_kb: u64,
        #[arg(long, default_value_t = 20_000)]
        ld_sample_size: usize,
        #[arg(long, value_enum, default_value_t = OrderArg::Significance)]
        prune_order: OrderArg,
        #[arg(long)]
        reference: bool,
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        reference_url: String,
        #[arg(long, default_value_t = 30)]
        reference_timeout: u64,
        #[arg(long, default_value = "EUR")]
        population: String,
        #[arg(long)]
        no_fallback: bool,
        #[arg(long, default_value_t = 1000)]
        bootstrap: usize,
        #[arg(long, default_value_t = 1000)]
        trials: usize,
        #[arg(long, default_value_t = 0.05)]
        outlier_threshold: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long)]
        cores: Option<usize>,
    },
    Simulate {
        #[arg(long, required = true)]
        exposure: PathBuf,
        #[arg(long, required = true)]
        outcome: PathBuf,
        #[arg(long, default_value_t = 50)]
        n_instruments: usize,
        #[arg(long, default_value_t = 0.3)]
        causal_effect: f64,
        #[arg(long, default_value_t = 0.0)]
        pleiotropic_fraction: f64,
        #[arg(long, default_value_t = 0.05)]
        pleiotropy_offset: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn parse_columns(pairs: &[String]) -> anyhow::Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    for pair in pairs {
        let Some((canonical, header)) = pair.split_once('=') else {
            bail!("column mapping '{pair}' should look like CANONICAL=header");
        };
        out.insert(
            canonical.trim().to_ascii_uppercase(),
            header.trim().to_string(),
        );
    }
    Ok(out)
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            exposure,
            outcome,
            out_dir,
            exposure_columns,
            outcome_columns,
            palindrome_tolerance,
            keep_indels,
            min_f,
            exposure_p,
            outcome_p_floor,
            min_eaf,
            r2,
            window_kb,
            ld_sample_size,
            prune_order,
            reference,
            reference_url,
            reference_timeout,
            population,
            no_fallback,
            bootstrap,
            trials,
            outlier_threshold,
            seed,
            cores,
        } => {
            let analysis = AnalysisConfig {
                harmonize: HarmonizeConfig {
                    palindrome_tolerance,
                    drop_indels: !keep_indels,
                },
                selection: SelectionConfig {
                    min_f_statistic: min_f,
                    exposure_p_threshold: exposure_p,
                    outcome_p_floor,
                    min_eaf,
                },
                prune: PruneConfig {
                    r2_threshold: r2,
                    window_kb,
                    sample_size: ld_sample_size,
                    order: match prune_order {
                        OrderArg::Significance => PruneOrder::Significance,
                        OrderArg::Input => PruneOrder::Input,
                    },
                    population,
                    fallback: !no_fallback,
                    ..PruneConfig::default()
                },
                estimator: EstimatorConfig {
                    bootstrap_replicates: bootstrap,
                    ..EstimatorConfig::default()
                },
                presso: PressoConfig {
                    n_trials: trials,
                    threshold: outlier_threshold,
                    ..PressoConfig::default()
                },
                loo: LooConfig::default(),
            }
            .with_seed(seed)
            .with_cores(cores);

            let config = PipelineConfig {
                exposure,
                outcome,
                out_dir,
                exposure_columns: parse_columns(&exposure_columns)?,
                outcome_columns: parse_columns(&outcome_columns)?,
                reference: reference.then(|| ReferenceConfig {
                    base_url: reference_url,
                    token: None,
                    timeout_secs: reference_timeout,
                }),
                analysis,
            };
            run_pipeline(&config).context("mrcope run failed")?;
        }
        Command::Simulate {
            exposure,
            outcome,
            n_instruments,
            causal_effect,
            pleiotropic_fraction,
            pleiotropy_offset,
            seed,
        } => {
            let config = SimulateConfig {
                n_instruments,
                causal_effect,
                pleiotropic_fraction,
                pleiotropy_offset,
                seed,
                ..SimulateConfig::default()
            };
            write_simulated(&config, &exposure, &outcome)?;
        }
    }
    Ok(())
}
