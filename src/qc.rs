use std::path::Path;

use tracing::info;

use crate::error::{MrError, Result};
use crate::types::{DropReason, DroppedInstrument, HarmonizedInstrument, HarmonizedSet};

pub fn check_range_f64(value: f64, min: f64, max: f64, inclusive: bool, name: &str) -> Result<()> {
    if !value.is_finite() {
        return Err(MrError::InputValidation(format!(
            "Value of {name} should be finite"
        )));
    }
    if inclusive {
        if value < min || value > max {
            return Err(MrError::InputValidation(format!(
                "Value of {name} should be within [{min}, {max}], got {value}"
            )));
        }
    } else if value <= min || value >= max {
        return Err(MrError::InputValidation(format!(
            "Value of {name} should be within ({min}, {max}), got {value}"
        )));
    }
    Ok(())
}

pub fn check_min_usize(value: usize, min: usize, name: &str) -> Result<()> {
    if value < min {
        return Err(MrError::InputValidation(format!(
            "Value of {name} should be at least {min}, got {value}"
        )));
    }
    Ok(())
}

pub fn check_file_exists(path: &Path, name: &str) -> Result<()> {
    if !path.exists() {
        return Err(MrError::InputValidation(format!(
            "File {path:?} passed to {name} does not exist"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SelectionConfig {
    pub min_f_statistic: f64,
    pub exposure_p_threshold: Option<f64>,
    pub outcome_p_floor: Option<f64>,
    pub min_eaf: Option<f64>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_f_statistic: 10.0,
            exposure_p_threshold: None,
            outcome_p_floor: None,
            min_eaf: None,
        }
    }
}

impl SelectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.min_f_statistic.is_finite() || self.min_f_statistic < 0.0 {
            return Err(MrError::InputValidation(
                "Value of min_f_statistic should be a non-negative number".into(),
            ));
        }
        if let Some(p) = self.exposure_p_threshold {
            check_range_f64(p, 0.0, 1.0, true, "exposure_p_threshold")?;
        }
        if let Some(p) = self.outcome_p_floor {
            check_range_f64(p, 0.0, 1.0, true, "outcome_p_floor")?;
        }
        if let Some(f) = self.min_eaf {
            check_range_f64(f, 0.0, 0.5, true, "min_eaf")?;
        }
        Ok(())
    }

    fn reject(&self, inst: &HarmonizedInstrument) -> Option<DropReason> {
        if inst.f_statistic() < self.min_f_statistic {
            return Some(DropReason::WeakInstrument);
        }
        if let Some(p) = self.exposure_p_threshold
            && inst.pval_exposure >= p
        {
            return Some(DropReason::ExposurePvalue);
        }
        if let Some(p) = self.outcome_p_floor
            && inst.pval_outcome < p
        {
            return Some(DropReason::OutcomePvalue);
        }
        if let Some(f) = self.min_eaf
            && inst.eaf_exposure < f
        {
            return Some(DropReason::LowFrequency);
        }
        None
    }
}

pub fn select_instruments(set: &HarmonizedSet, config: &SelectionConfig) -> Result<HarmonizedSet> {
    config.validate()?;
    let mut instruments = Vec::with_capacity(set.instruments.len());
    let mut dropped = set.dropped.clone();
    for inst in &set.instruments {
        match config.reject(inst) {
            Some(reason) => dropped.push(DroppedInstrument {
                snp: inst.snp.clone(),
                reason,
            }),
            None => instruments.push(inst.clone()),
        }
    }
    let removed = set.instruments.len() - instruments.len();
    info!(
        "Instrument selection kept {} of {} instruments ({removed} removed)",
        instruments.len(),
        set.instruments.len()
    );
    if instruments.is_empty() {
        return Err(MrError::InsufficientData(
            "no instruments passed strength and relevance filters".into(),
        ));
    }
    Ok(HarmonizedSet {
        instruments,
        dropped,
    })
}
