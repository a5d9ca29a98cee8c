mod common;

use common::{pruned, scenario};
use mrcope::error::MrError;
use mrcope::estimators::ivw;
use mrcope::loo::{LooConfig, leave_one_out};

#[test]
fn one_entry_per_instrument_in_order() {
    let set = pruned(scenario());
    let series = leave_one_out(&set, &LooConfig::default()).expect("loo");
    assert_eq!(series.len(), set.len());
    let order: Vec<&str> = series.entries.iter().map(|e| e.excluded.as_str()).collect();
    assert_eq!(order, set.ids());
    assert!(series.entries.iter().all(|e| e.estimate.n_instruments == 4));
}

#[test]
fn removing_the_outlier_moves_the_estimate_most() {
    let set = pruned(scenario());
    let full = ivw(&set.instruments).expect("ivw").estimate;
    let series = leave_one_out(&set, &LooConfig { cores: Some(2) }).expect("loo");

    let without_outlier = series.get("rs5").expect("rs5 entry").estimate;
    assert!((without_outlier - 0.30).abs() < 1e-9);
    let outlier_shift = (full - without_outlier).abs();
    for snp in ["rs1", "rs2", "rs3", "rs4"] {
        let shift = (full - series.get(snp).expect("entry").estimate).abs();
        assert!(shift < outlier_shift, "{snp} shift {shift} vs {outlier_shift}");
    }
}

#[test]
fn needs_three_instruments() {
    let set = pruned(scenario()[..2].to_vec());
    assert!(matches!(
        leave_one_out(&set, &LooConfig::default()),
        Err(MrError::InsufficientInstruments { required: 3, .. })
    ));
}
