use mrcope::simulate::{SimulateConfig, simulate};

#[test]
fn simulated_tables_are_consistent() {
    let config = SimulateConfig {
        n_instruments: 40,
        pleiotropic_fraction: 0.25,
        ..SimulateConfig::default()
    };
    let (exposure, outcome) = simulate(&config).expect("simulate");
    assert_eq!(exposure.len(), 40);
    assert_eq!(outcome.len(), 40);
    for (e, o) in exposure.iter().zip(&outcome) {
        assert_eq!(e.snp, o.snp);
        assert_ne!(e.effect_allele, e.other_allele);
        assert_eq!(e.effect_allele, o.effect_allele);
        assert!(e.eaf >= 0.05 && e.eaf < 0.5);
        assert!(e.se >= 0.01 && e.se < 0.03);
        assert!(e.pvalue > 0.0 && e.pvalue <= 1.0);
    }
}

#[test]
fn same_seed_same_tables() {
    let config = SimulateConfig::default();
    let a = simulate(&config).expect("simulate");
    let b = simulate(&config).expect("simulate");
    assert_eq!(a, b);

    let other = simulate(&SimulateConfig {
        seed: 43,
        ..SimulateConfig::default()
    })
    .expect("simulate");
    assert_ne!(a.0, other.0);
}

#[test]
fn invalid_fraction_is_rejected() {
    let config = SimulateConfig {
        pleiotropic_fraction: 1.5,
        ..SimulateConfig::default()
    };
    assert!(simulate(&config).is_err());
}
