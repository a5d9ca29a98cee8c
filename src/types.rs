use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationRecord {
    pub snp: String,
    pub chr: Option<u8>,
    pub bp: Option<u64>,
    pub effect_allele: String,
    pub other_allele: String,
    pub beta: f64,
    pub se: f64,
    pub pvalue: f64,
    pub eaf: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssociationPair {
    pub exposure: AssociationRecord,
    pub outcome: AssociationRecord,
}

impl AssociationPair {
    pub fn new(exposure: AssociationRecord, outcome: AssociationRecord) -> Option<Self> {
        if exposure.snp != outcome.snp {
            return None;
        }
        Some(Self { exposure, outcome })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Aligned,
    Flipped,
    StrandAligned,
    StrandFlipped,
}

impl Alignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Alignment::Aligned => "aligned",
            Alignment::Flipped => "flipped",
            Alignment::StrandAligned => "strand_aligned",
            Alignment::StrandFlipped => "strand_flipped",
        }
    }

    pub fn sign_changed(&self) -> bool {
        matches!(self, Alignment::Flipped | Alignment::StrandFlipped)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarmonizedInstrument {
    pub snp: String,
    pub chr: Option<u8>,
    pub bp: Option<u64>,
    pub effect_allele: String,
    pub other_allele: String,
    pub beta_exposure: f64,
    pub se_exposure: f64,
    pub pval_exposure: f64,
    pub eaf_exposure: f64,
    pub beta_outcome: f64,
    pub se_outcome: f64,
    pub pval_outcome: f64,
    pub eaf_outcome: f64,
    pub alignment: Alignment,
}

impl HarmonizedInstrument {
    pub fn f_statistic(&self) -> f64 {
        (self.beta_exposure * self.beta_exposure) / (self.se_exposure * self.se_exposure)
    }

    pub fn outcome_weight(&self) -> f64 {
        1.0 / (self.se_outcome * self.se_outcome)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    MissingInOutcome,
    Duplicate,
    NonSnpAllele,
    InvalidStatistic,
    AlleleMismatch,
    AmbiguousPalindrome,
    WeakInstrument,
    ExposurePvalue,
    OutcomePvalue,
    LowFrequency,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MissingInOutcome => "missing_in_outcome",
            DropReason::Duplicate => "duplicate",
            DropReason::NonSnpAllele => "non_snp_allele",
            DropReason::InvalidStatistic => "invalid_statistic",
            DropReason::AlleleMismatch => "allele_mismatch",
            DropReason::AmbiguousPalindrome => "ambiguous_palindrome",
            DropReason::WeakInstrument => "weak_instrument",
            DropReason::ExposurePvalue => "exposure_pvalue",
            DropReason::OutcomePvalue => "outcome_pvalue",
            DropReason::LowFrequency => "low_frequency",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedInstrument {
    pub snp: String,
    pub reason: DropReason,
}

#[derive(Debug, Clone, Default)]
pub struct HarmonizedSet {
    pub instruments: Vec<HarmonizedInstrument>,
    pub dropped: Vec<DroppedInstrument>,
}

impl HarmonizedSet {
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn dropped_count(&self, reason: DropReason) -> usize {
        self.dropped.iter().filter(|d| d.reason == reason).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PruneMethod {
    Simulation,
    Reference,
    SimulationFallback,
}

impl PruneMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PruneMethod::Simulation => "simulation",
            PruneMethod::Reference => "reference",
            PruneMethod::SimulationFallback => "simulation_fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrunedSet {
    pub instruments: Vec<HarmonizedInstrument>,
    pub removed: Vec<String>,
    pub method: PruneMethod,
}

impl PrunedSet {
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.instruments.iter().map(|i| i.snp.as_str()).collect()
    }

    pub fn without(&self, exclude: &[&str]) -> Vec<HarmonizedInstrument> {
        self.instruments
            .iter()
            .filter(|i| !exclude.contains(&i.snp.as_str()))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Method {
    #[serde(rename = "Inverse variance weighted")]
    Ivw,
    #[serde(rename = "Weighted median")]
    WeightedMedian,
    #[serde(rename = "MR Egger")]
    Egger,
    #[serde(rename = "Outlier-corrected IVW")]
    OutlierCorrectedIvw,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Ivw => "Inverse variance weighted",
            Method::WeightedMedian => "Weighted median",
            Method::Egger => "MR Egger",
            Method::OutlierCorrectedIvw => "Outlier-corrected IVW",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CausalEstimate {
    pub method: Method,
    pub estimate: f64,
    pub se: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub pvalue: f64,
    pub n_instruments: usize,
}

impl CausalEstimate {
    pub fn covers(&self, value: f64) -> bool {
        self.ci_lower <= value && value <= self.ci_upper
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaldRatio {
    pub snp: String,
    pub ratio: f64,
    pub se: f64,
    pub pvalue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterceptTest {
    pub intercept: f64,
    pub se: f64,
    pub pvalue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EggerFit {
    pub slope: CausalEstimate,
    pub intercept: InterceptTest,
    pub residual_se: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeterogeneityResult {
    pub method: Method,
    pub q: f64,
    pub df: usize,
    pub q_pvalue: f64,
    pub i2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PleiotropyDiagnostics {
    pub ivw: HeterogeneityResult,
    pub egger: Option<HeterogeneityResult>,
    pub intercept: Option<InterceptTest>,
    pub exposure_i2: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierCall {
    pub snp: String,
    pub rss_obs: f64,
    pub pvalue: f64,
    pub flagged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistortionTest {
    pub coefficient_pct: f64,
    pub pvalue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierReport {
    pub rss_obs: f64,
    pub global_pvalue: f64,
    pub calls: Vec<OutlierCall>,
    pub flagged: Vec<String>,
    pub distortion: Option<DistortionTest>,
    pub corrected: Option<CausalEstimate>,
    pub n_trials: usize,
    pub seed: u64,
}

impl OutlierReport {
    pub fn outlier_count(&self) -> usize {
        self.flagged.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaveOneOut {
    pub excluded: String,
    pub estimate: CausalEstimate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeaveOneOutSeries {
    pub entries: Vec<LeaveOneOut>,
}

impl LeaveOneOutSeries {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, snp: &str) -> Option<&CausalEstimate> {
        self.entries
            .iter()
            .find(|e| e.excluded == snp)
            .map(|e| &e.estimate)
    }
}
