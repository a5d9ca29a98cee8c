use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::error::{MrError, Result};
use crate::qc::check_range_f64;
use crate::types::{
    Alignment, AssociationPair, AssociationRecord, DropReason, DroppedInstrument,
    HarmonizedInstrument, HarmonizedSet,
};
use crate::utils::{complement, is_snp_allele, is_strand_ambiguous, normalize_allele};

#[derive(Debug, Clone)]
pub struct HarmonizeConfig {
    pub palindrome_tolerance: f64,
    pub drop_indels: bool,
}

impl Default for HarmonizeConfig {
    fn default() -> Self {
        Self {
            palindrome_tolerance: 0.08,
            drop_indels: true,
        }
    }
}

impl HarmonizeConfig {
    pub fn validate(&self) -> Result<()> {
        check_range_f64(self.palindrome_tolerance, 0.0, 0.5, true, "palindrome_tolerance")
    }
}

pub fn harmonize(
    exposure: &[AssociationRecord],
    outcome: &[AssociationRecord],
    config: &HarmonizeConfig,
) -> Result<HarmonizedSet> {
    config.validate()?;
    if exposure.is_empty() {
        return Err(MrError::InputValidation("exposure table is empty".into()));
    }
    if outcome.is_empty() {
        return Err(MrError::InputValidation("outcome table is empty".into()));
    }

    let mut outcome_by_id: HashMap<&str, &AssociationRecord> = HashMap::with_capacity(outcome.len());
    let mut outcome_dups = 0usize;
    for rec in outcome {
        if outcome_by_id.contains_key(rec.snp.as_str()) {
            outcome_dups += 1;
        } else {
            outcome_by_id.insert(rec.snp.as_str(), rec);
        }
    }
    if outcome_dups > 0 {
        warn!("{outcome_dups} duplicated identifier(s) in the outcome table; keeping the first record");
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(exposure.len());
    let mut set = HarmonizedSet::default();
    for exp in exposure {
        let reason = if !seen.insert(exp.snp.as_str()) {
            Some(DropReason::Duplicate)
        } else {
            match outcome_by_id.get(exp.snp.as_str()) {
                None => Some(DropReason::MissingInOutcome),
                Some(out) => {
                    let pair = AssociationPair {
                        exposure: exp.clone(),
                        outcome: (*out).clone(),
                    };
                    match harmonize_pair(&pair, config) {
                        Ok(inst) => {
                            set.instruments.push(inst);
                            None
                        }
                        Err(reason) => Some(reason),
                    }
                }
            }
        };
        if let Some(reason) = reason {
            debug!("Dropping {} during harmonization: {reason}", exp.snp);
            set.dropped.push(DroppedInstrument {
                snp: exp.snp.clone(),
                reason,
            });
        }
    }

    let flipped = set
        .instruments
        .iter()
        .filter(|i| i.alignment.sign_changed())
        .count();
    info!(
        "Harmonized {} of {} exposure instruments ({flipped} flipped, {} dropped)",
        set.instruments.len(),
        exposure.len(),
        set.dropped.len()
    );

    if set.is_empty() {
        return Err(MrError::InsufficientData(
            "harmonization left no instruments shared by exposure and outcome".into(),
        ));
    }
    Ok(set)
}

fn valid_statistics(rec: &AssociationRecord) -> bool {
    rec.beta.is_finite() && rec.se.is_finite() && rec.se > 0.0 && rec.eaf > 0.0 && rec.eaf < 1.0
}

pub fn harmonize_pair(
    pair: &AssociationPair,
    config: &HarmonizeConfig,
) -> std::result::Result<HarmonizedInstrument, DropReason> {
    let exp = &pair.exposure;
    let out = &pair.outcome;
    if !valid_statistics(exp) || !valid_statistics(out) {
        return Err(DropReason::InvalidStatistic);
    }

    let ea = normalize_allele(&exp.effect_allele);
    let eo = normalize_allele(&exp.other_allele);
    let oa = normalize_allele(&out.effect_allele);
    let oo = normalize_allele(&out.other_allele);

    let all_snp = [&ea, &eo, &oa, &oo].iter().all(|a| is_snp_allele(a));
    if config.drop_indels && !all_snp {
        return Err(DropReason::NonSnpAllele);
    }
    if ea == eo || oa == oo {
        return Err(DropReason::AlleleMismatch);
    }

    let palindromic = is_strand_ambiguous(&ea, &eo);
    if palindromic
        && ((exp.eaf - 0.5).abs() < config.palindrome_tolerance
            || (out.eaf - 0.5).abs() < config.palindrome_tolerance)
    {
        return Err(DropReason::AmbiguousPalindrome);
    }

    let mut alignment = if oa == ea && oo == eo {
        Alignment::Aligned
    } else if oa == eo && oo == ea {
        Alignment::Flipped
    } else if palindromic {
        return Err(DropReason::AlleleMismatch);
    } else {
        let (ca, co) = (complement(&oa), complement(&oo));
        match (ca.as_deref(), co.as_deref()) {
            (Some(ca), Some(co)) if ca == ea && co == eo => Alignment::StrandAligned,
            (Some(ca), Some(co)) if ca == eo && co == ea => Alignment::StrandFlipped,
            _ => return Err(DropReason::AlleleMismatch),
        }
    };

    let (mut beta_outcome, mut eaf_outcome) = if alignment.sign_changed() {
        (-out.beta, 1.0 - out.eaf)
    } else {
        (out.beta, out.eaf)
    };

    // Letters cannot tell the strand of an A/T or C/G variant; frequencies on opposite sides
    // of 0.5 mean the outcome was reported on the other strand.
    if palindromic && (exp.eaf > 0.5) != (eaf_outcome > 0.5) {
        beta_outcome = -beta_outcome;
        eaf_outcome = 1.0 - eaf_outcome;
        alignment = match alignment {
            Alignment::Aligned => Alignment::StrandFlipped,
            Alignment::Flipped => Alignment::StrandAligned,
            other => other,
        };
    }

    Ok(HarmonizedInstrument {
        snp: exp.snp.clone(),
        chr: exp.chr.or(out.chr),
        bp: exp.bp.or(out.bp),
        effect_allele: ea,
        other_allele: eo,
        beta_exposure: exp.beta,
        se_exposure: exp.se,
        pval_exposure: exp.pvalue,
        eaf_exposure: exp.eaf,
        beta_outcome,
        se_outcome: out.se,
        pval_outcome: out.pvalue,
        eaf_outcome,
        alignment,
    })
}
