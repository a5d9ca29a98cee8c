mod common;

use common::record;
use mrcope::error::MrError;
use mrcope::estimators::ivw;
use mrcope::harmonize::{HarmonizeConfig, harmonize, harmonize_pair};
use mrcope::types::{Alignment, AssociationPair, AssociationRecord, DropReason};

fn pair(exposure: AssociationRecord, outcome: AssociationRecord) -> AssociationPair {
    AssociationPair::new(exposure, outcome).expect("matching identifiers")
}

fn recode(rec: &AssociationRecord) -> AssociationRecord {
    AssociationRecord {
        effect_allele: rec.other_allele.clone(),
        other_allele: rec.effect_allele.clone(),
        beta: -rec.beta,
        eaf: 1.0 - rec.eaf,
        ..rec.clone()
    }
}

#[test]
fn aligned_and_flipped_outcomes() {
    let config = HarmonizeConfig::default();
    let exp = record("rs1", "A", "G", 0.1, 0.02, 0.3);

    let aligned = harmonize_pair(&pair(exp.clone(), record("rs1", "A", "G", 0.05, 0.01, 0.3)), &config)
        .expect("aligned");
    assert_eq!(aligned.alignment, Alignment::Aligned);
    assert_eq!(aligned.beta_outcome, 0.05);

    let flipped = harmonize_pair(&pair(exp, record("rs1", "G", "A", 0.05, 0.01, 0.7)), &config)
        .expect("flipped");
    assert_eq!(flipped.alignment, Alignment::Flipped);
    assert_eq!(flipped.beta_outcome, -0.05);
    assert!((flipped.eaf_outcome - 0.3).abs() < 1e-12);
}

#[test]
fn strand_complement_is_resolved() {
    let config = HarmonizeConfig::default();
    let exp = record("rs1", "A", "G", 0.1, 0.02, 0.3);

    let same = harmonize_pair(&pair(exp.clone(), record("rs1", "T", "C", 0.05, 0.01, 0.3)), &config)
        .expect("strand aligned");
    assert_eq!(same.alignment, Alignment::StrandAligned);
    assert_eq!(same.beta_outcome, 0.05);

    let swapped = harmonize_pair(&pair(exp, record("rs1", "C", "T", 0.05, 0.01, 0.7)), &config)
        .expect("strand flipped");
    assert_eq!(swapped.alignment, Alignment::StrandFlipped);
    assert_eq!(swapped.beta_outcome, -0.05);
}

#[test]
fn palindromic_variants() {
    let config = HarmonizeConfig::default();

    let ambiguous = harmonize_pair(
        &pair(
            record("rs1", "A", "T", 0.1, 0.02, 0.45),
            record("rs1", "A", "T", 0.05, 0.01, 0.45),
        ),
        &config,
    );
    assert_eq!(ambiguous, Err(DropReason::AmbiguousPalindrome));

    // Frequencies on opposite sides of 0.5 reveal a reverse-strand report.
    let resolved = harmonize_pair(
        &pair(
            record("rs2", "A", "T", 0.1, 0.02, 0.2),
            record("rs2", "A", "T", 0.05, 0.01, 0.8),
        ),
        &config,
    )
    .expect("resolvable palindrome");
    assert_eq!(resolved.alignment, Alignment::StrandFlipped);
    assert_eq!(resolved.beta_outcome, -0.05);
    assert!((resolved.eaf_outcome - 0.2).abs() < 1e-12);
}

#[test]
fn incompatible_alleles_are_dropped() {
    let config = HarmonizeConfig::default();
    let mismatch = harmonize_pair(
        &pair(
            record("rs1", "A", "G", 0.1, 0.02, 0.3),
            record("rs1", "A", "C", 0.05, 0.01, 0.3),
        ),
        &config,
    );
    assert_eq!(mismatch, Err(DropReason::AlleleMismatch));

    let indel = harmonize_pair(
        &pair(
            record("rs2", "A", "AT", 0.1, 0.02, 0.3),
            record("rs2", "A", "AT", 0.05, 0.01, 0.3),
        ),
        &config,
    );
    assert_eq!(indel, Err(DropReason::NonSnpAllele));

    let bad_se = harmonize_pair(
        &pair(
            record("rs3", "A", "G", 0.1, 0.0, 0.3),
            record("rs3", "A", "G", 0.05, 0.01, 0.3),
        ),
        &config,
    );
    assert_eq!(bad_se, Err(DropReason::InvalidStatistic));
}

#[test]
fn drop_log_records_missing_and_duplicates() {
    let exposure = vec![
        record("rs1", "A", "G", 0.1, 0.02, 0.3),
        record("rs1", "A", "G", 0.1, 0.02, 0.3),
        record("rs2", "C", "T", 0.2, 0.02, 0.3),
        record("rs9", "C", "T", 0.2, 0.02, 0.3),
    ];
    let outcome = vec![
        record("rs1", "G", "A", 0.03, 0.01, 0.7),
        record("rs2", "C", "T", 0.06, 0.01, 0.3),
    ];
    let set = harmonize(&exposure, &outcome, &HarmonizeConfig::default()).expect("harmonize");
    assert_eq!(set.len(), 2);
    assert_eq!(set.instruments[0].snp, "rs1");
    assert_eq!(set.instruments[1].snp, "rs2");
    assert_eq!(set.dropped_count(DropReason::Duplicate), 1);
    assert_eq!(set.dropped_count(DropReason::MissingInOutcome), 1);
}

#[test]
fn nothing_shared_is_an_error() {
    let exposure = vec![record("rs1", "A", "G", 0.1, 0.02, 0.3)];
    let outcome = vec![record("rs2", "A", "G", 0.05, 0.01, 0.3)];
    let err = harmonize(&exposure, &outcome, &HarmonizeConfig::default()).expect_err("no overlap");
    assert!(matches!(err, MrError::InsufficientData(_)));

    let err = harmonize(&[], &outcome, &HarmonizeConfig::default()).expect_err("empty exposure");
    assert!(matches!(err, MrError::InputValidation(_)));
}

#[test]
fn estimates_do_not_depend_on_allele_coding() {
    let exposure = vec![
        record("rs1", "A", "G", 0.10, 0.02, 0.30),
        record("rs2", "C", "T", 0.20, 0.02, 0.25),
        record("rs3", "G", "T", -0.15, 0.02, 0.35),
        record("rs4", "A", "C", 0.12, 0.02, 0.20),
    ];
    let outcome = vec![
        record("rs1", "A", "G", 0.031, 0.01, 0.30),
        record("rs2", "T", "C", -0.058, 0.01, 0.75),
        record("rs3", "G", "T", -0.047, 0.01, 0.35),
        record("rs4", "A", "C", 0.035, 0.01, 0.20),
    ];
    let config = HarmonizeConfig::default();
    let base = harmonize(&exposure, &outcome, &config).expect("harmonize");

    let recoded_exposure: Vec<_> = exposure.iter().map(recode).collect();
    let recoded_outcome: Vec<_> = outcome.iter().map(recode).collect();
    let other = harmonize(&recoded_exposure, &recoded_outcome, &config).expect("harmonize recoded");
    let mixed = harmonize(&exposure, &recoded_outcome, &config).expect("harmonize mixed");

    let a = ivw(&base.instruments).expect("ivw");
    let b = ivw(&other.instruments).expect("ivw recoded");
    let c = ivw(&mixed.instruments).expect("ivw mixed");
    assert_eq!(base.len(), 4);
    assert!((a.estimate - b.estimate).abs() < 1e-12);
    assert!((a.estimate - c.estimate).abs() < 1e-12);
    assert!((a.se - b.se).abs() < 1e-12);
}
