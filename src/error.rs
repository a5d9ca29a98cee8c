use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MrError {
    #[error("input validation failed: {0}")]
    InputValidation(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("{method} requires at least {required} instruments, found {found}")]
    InsufficientInstruments {
        method: &'static str,
        required: usize,
        found: usize,
    },

    #[error("degenerate ratio: {0}")]
    DegenerateRatio(String),

    #[error("singular design: {0}")]
    SingularDesign(String),

    #[error("external service error: {0}")]
    ExternalService(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MrError {
    pub fn kind(&self) -> &'static str {
        match self {
            MrError::InputValidation(_) => "InputValidationError",
            MrError::InsufficientData(_) => "InsufficientDataError",
            MrError::InsufficientInstruments { .. } => "InsufficientInstrumentsError",
            MrError::DegenerateRatio(_) => "DegenerateRatioError",
            MrError::SingularDesign(_) => "SingularDesignError",
            MrError::ExternalService(_) => "ExternalServiceError",
            MrError::Io(_) => "IoError",
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MrError::InputValidation(_)
                | MrError::InsufficientData(_)
                | MrError::InsufficientInstruments { .. }
                | MrError::DegenerateRatio(_)
                | MrError::SingularDesign(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MrError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    Harmonize,
    Select,
    Prune,
    Estimate,
    Heterogeneity,
    Presso,
    LeaveOneOut,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Ingest,
        Stage::Harmonize,
        Stage::Select,
        Stage::Prune,
        Stage::Estimate,
        Stage::Heterogeneity,
        Stage::Presso,
        Stage::LeaveOneOut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Harmonize => "harmonize",
            Stage::Select => "select",
            Stage::Prune => "prune",
            Stage::Estimate => "estimate",
            Stage::Heterogeneity => "heterogeneity",
            Stage::Presso => "presso",
            Stage::LeaveOneOut => "leave_one_out",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Written as `<stage>.skipped.json` in place of the stage's artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct SkipReason {
    pub stage: Stage,
    pub kind: &'static str,
    pub message: String,
    pub recoverable: bool,
}

impl SkipReason {
    pub fn new(stage: Stage, err: &MrError) -> Self {
        Self {
            stage,
            kind: err.kind(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }

    pub fn upstream(stage: Stage, upstream: &SkipReason) -> Self {
        Self {
            stage,
            kind: "UpstreamSkipped",
            message: format!("upstream stage {} was skipped", upstream.stage),
            recoverable: true,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} skipped ({}): {}", self.stage, self.kind, self.message)
    }
}

pub type StageResult<T> = std::result::Result<T, SkipReason>;
