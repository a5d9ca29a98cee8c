mod common;

use common::instrument;
use mrcope::error::MrError;
use mrcope::qc::{SelectionConfig, check_range_f64, select_instruments};
use mrcope::types::{DropReason, HarmonizedInstrument, HarmonizedSet};

fn set(instruments: Vec<HarmonizedInstrument>) -> HarmonizedSet {
    HarmonizedSet {
        instruments,
        dropped: Vec::new(),
    }
}

#[test]
fn weak_instruments_are_removed() {
    let strong = instrument("rs1", 0.10, 0.02, 0.03, 0.05);
    let weak = instrument("rs2", 0.03, 0.02, 0.01, 0.05);
    let selected = select_instruments(&set(vec![strong, weak]), &SelectionConfig::default())
        .expect("select");
    assert_eq!(selected.len(), 1);
    assert_eq!(selected.instruments[0].snp, "rs1");
    assert_eq!(selected.dropped_count(DropReason::WeakInstrument), 1);
}

#[test]
fn optional_filters_apply_in_order() {
    let mut exposure_ns = instrument("rs1", 0.10, 0.02, 0.03, 0.05);
    exposure_ns.pval_exposure = 1e-4;
    let mut outcome_hit = instrument("rs2", 0.10, 0.02, 0.03, 0.05);
    outcome_hit.pval_outcome = 1e-9;
    let mut rare = instrument("rs3", 0.10, 0.02, 0.03, 0.05);
    rare.eaf_exposure = 0.005;
    let kept = instrument("rs4", 0.10, 0.02, 0.03, 0.05);

    let config = SelectionConfig {
        exposure_p_threshold: Some(5e-8),
        outcome_p_floor: Some(5e-8),
        min_eaf: Some(0.01),
        ..SelectionConfig::default()
    };
    let selected = select_instruments(&set(vec![exposure_ns, outcome_hit, rare, kept]), &config)
        .expect("select");
    assert_eq!(selected.len(), 1);
    assert_eq!(selected.dropped_count(DropReason::ExposurePvalue), 1);
    assert_eq!(selected.dropped_count(DropReason::OutcomePvalue), 1);
    assert_eq!(selected.dropped_count(DropReason::LowFrequency), 1);
}

#[test]
fn empty_selection_is_insufficient_data() {
    let weak = instrument("rs1", 0.01, 0.02, 0.01, 0.05);
    let err = select_instruments(&set(vec![weak]), &SelectionConfig::default())
        .expect_err("nothing left");
    assert!(matches!(err, MrError::InsufficientData(_)));
}

#[test]
fn range_checks() {
    assert!(check_range_f64(0.5, 0.0, 1.0, false, "x").is_ok());
    assert!(check_range_f64(1.0, 0.0, 1.0, false, "x").is_err());
    assert!(check_range_f64(1.0, 0.0, 1.0, true, "x").is_ok());
    assert!(check_range_f64(f64::NAN, 0.0, 1.0, true, "x").is_err());
}
