use std::collections::{BTreeMap, HashMap, HashSet};

use ndarray::Array1;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Binomial, Distribution};
use tracing::{debug, info, warn};

use crate::error::{MrError, Result};
use crate::parallel::map_indexed;
use crate::qc::{check_min_usize, check_range_f64};
use crate::reference::{ClumpRequest, LdReference};
use crate::types::{HarmonizedInstrument, HarmonizedSet, PruneMethod, PrunedSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PruneOrder {
    // Ascending exposure p-value, ties kept in input order.
    #[default]
    Significance,
    Input,
}

#[derive(Debug, Clone)]
pub struct PruneConfig {
    pub r2_threshold: f64,
    pub window_kb: u64,
    pub sample_size: usize,
    pub seed: u64,
    pub order: PruneOrder,
    pub population: String,
    pub fallback: bool,
    pub cores: Option<usize>,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            r2_threshold: 0.001,
            window_kb: 10_000,
            sample_size: 20_000,
            seed: 42,
            order: PruneOrder::Significance,
            population: "EUR".to_string(),
            fallback: true,
            cores: None,
        }
    }
}

impl PruneConfig {
    pub fn validate(&self) -> Result<()> {
        check_range_f64(self.r2_threshold, 0.0, 1.0, true, "r2_threshold")?;
        if self.r2_threshold <= 0.0 {
            return Err(MrError::InputValidation(
                "r2_threshold must be greater than 0".into(),
            ));
        }
        check_min_usize(self.sample_size, 2, "sample_size")?;
        if self.window_kb == 0 {
            return Err(MrError::InputValidation("window_kb must be positive".into()));
        }
        if self.population.trim().is_empty() {
            return Err(MrError::InputValidation("population must not be empty".into()));
        }
        Ok(())
    }
}

pub fn simulate_genotypes(freq: f64, n: usize, seed: u64) -> Result<Array1<u8>> {
    let dist = Binomial::new(2, freq)
        .map_err(|e| MrError::InputValidation(format!("allele frequency {freq}: {e}")))?;
    let mut rng = StdRng::seed_from_u64(seed);
    Ok((0..n).map(|_| dist.sample(&mut rng) as u8).collect())
}

// Dosages are kept as bytes with their sum and centred sum of squares, so a pairwise r² needs
// one integer pass and no full genotype matrix.
#[derive(Debug, Clone)]
pub struct Dosages {
    values: Array1<u8>,
    sum: f64,
    centered_ss: f64,
}

impl Dosages {
    pub fn new(values: Array1<u8>) -> Self {
        let n = values.len().max(1) as f64;
        let sum: f64 = values.iter().map(|&v| f64::from(v)).sum();
        let sq: f64 = values.iter().map(|&v| f64::from(v) * f64::from(v)).sum();
        Self {
            values,
            sum,
            centered_ss: (sq - sum * sum / n).max(0.0),
        }
    }

    pub fn simulate(freq: f64, n: usize, seed: u64) -> Result<Self> {
        Ok(Self::new(simulate_genotypes(freq, n, seed)?))
    }

    pub fn values(&self) -> &Array1<u8> {
        &self.values
    }

    // Monomorphic vectors correlate with nothing.
    pub fn r2(&self, other: &Dosages) -> f64 {
        if self.centered_ss <= 0.0 || other.centered_ss <= 0.0 {
            return 0.0;
        }
        let n = self.values.len().min(other.values.len()).max(1) as f64;
        let cross: u64 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(&a, &b)| u64::from(a) * u64::from(b))
            .sum();
        let cov = cross as f64 - self.sum * other.sum / n;
        (cov * cov / (self.centered_ss * other.centered_ss)).min(1.0)
    }
}

// Keeps an index unless `linked` reports LD with one kept earlier; output is in visiting order.
pub fn greedy_select<F>(order: &[usize], mut linked: F) -> Result<Vec<usize>>
where
    F: FnMut(usize, &[usize]) -> Result<bool>,
{
    let mut kept: Vec<usize> = Vec::new();
    for &i in order {
        if !linked(i, &kept)? {
            kept.push(i);
        }
    }
    Ok(kept)
}

fn within_window(a: &HarmonizedInstrument, b: &HarmonizedInstrument, window_kb: u64) -> bool {
    match (a.chr, a.bp, b.chr, b.bp) {
        (Some(ca), Some(pa), Some(cb), Some(pb)) => {
            ca == cb && pa.abs_diff(pb) <= window_kb.saturating_mul(1000)
        }
        _ => true,
    }
}

fn visiting_order(instruments: &[HarmonizedInstrument], order: PruneOrder) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..instruments.len()).collect();
    if order == PruneOrder::Significance {
        idx.sort_by(|&a, &b| {
            instruments[a]
                .pval_exposure
                .total_cmp(&instruments[b].pval_exposure)
        });
    }
    idx
}

// Chromosomes never share a window, so each one is pruned on its own. An instrument without
// coordinates is compared with everything and forces a single group.
fn window_groups(instruments: &[HarmonizedInstrument], order: &[usize]) -> Vec<Vec<usize>> {
    if instruments.iter().any(|i| i.chr.is_none() || i.bp.is_none()) {
        return vec![order.to_vec()];
    }
    let mut groups: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for &i in order {
        if let Some(chr) = instruments[i].chr {
            groups.entry(chr).or_default().push(i);
        }
    }
    groups.into_values().collect()
}

fn select_group(
    instruments: &[HarmonizedInstrument],
    group: &[usize],
    config: &PruneConfig,
) -> Result<Vec<usize>> {
    let mut panel: HashMap<usize, Dosages> = HashMap::new();
    greedy_select(group, |i, kept| {
        let dosages = Dosages::simulate(
            instruments[i].eaf_exposure,
            config.sample_size,
            config.seed.wrapping_add(i as u64),
        )?;
        let linked = kept.iter().any(|j| {
            within_window(&instruments[i], &instruments[*j], config.window_kb)
                && panel
                    .get(j)
                    .is_some_and(|d| dosages.r2(d) >= config.r2_threshold)
        });
        if !linked {
            panel.insert(i, dosages);
        }
        Ok(linked)
    })
}

fn retained_set(
    instruments: &[HarmonizedInstrument],
    keep: &HashSet<&str>,
    method: PruneMethod,
) -> Result<PrunedSet> {
    let mut set = PrunedSet {
        instruments: Vec::with_capacity(keep.len()),
        removed: Vec::new(),
        method,
    };
    for inst in instruments {
        if keep.contains(inst.snp.as_str()) {
            set.instruments.push(inst.clone());
        } else {
            set.removed.push(inst.snp.clone());
        }
    }
    if set.is_empty() {
        return Err(MrError::InsufficientData(
            "pruning retained no instruments".into(),
        ));
    }
    info!(
        "Pruning ({}) kept {} of {} instruments",
        method.as_str(),
        set.len(),
        instruments.len()
    );
    Ok(set)
}

pub fn prune_by_simulation(
    instruments: &[HarmonizedInstrument],
    config: &PruneConfig,
    method: PruneMethod,
) -> Result<PrunedSet> {
    config.validate()?;
    if instruments.is_empty() {
        return Err(MrError::InsufficientData("no instruments to prune".into()));
    }
    let order = visiting_order(instruments, config.order);
    let groups = window_groups(instruments, &order);
    debug!("Pruning {} instruments in {} group(s)", instruments.len(), groups.len());
    let kept = map_indexed(config.cores, "build prune pool", groups.len(), |g| {
        select_group(instruments, &groups[g], config)
    })?;
    let keep: HashSet<&str> = kept
        .iter()
        .flatten()
        .map(|&i| instruments[i].snp.as_str())
        .collect();
    retained_set(instruments, &keep, method)
}

pub fn prune(
    set: &HarmonizedSet,
    config: &PruneConfig,
    reference: Option<&dyn LdReference>,
) -> Result<PrunedSet> {
    config.validate()?;
    if set.is_empty() {
        return Err(MrError::InsufficientData("no instruments to prune".into()));
    }
    let Some(service) = reference else {
        return prune_by_simulation(&set.instruments, config, PruneMethod::Simulation);
    };

    let order = visiting_order(&set.instruments, config.order);
    let request = ClumpRequest {
        snps: order.iter().map(|&i| set.instruments[i].snp.clone()).collect(),
        pvalues: order.iter().map(|&i| set.instruments[i].pval_exposure).collect(),
        r2: config.r2_threshold,
        window_kb: config.window_kb,
        population: config.population.clone(),
    };
    match service.clump(&request) {
        Ok(ids) => {
            let known: HashSet<&str> = set.instruments.iter().map(|i| i.snp.as_str()).collect();
            let keep: HashSet<&str> = ids
                .iter()
                .map(|s| s.as_str())
                .filter(|s| known.contains(s))
                .collect();
            if keep.len() < ids.len() {
                debug!(
                    "Reference returned {} identifier(s) outside the candidate set",
                    ids.len() - keep.len()
                );
            }
            retained_set(&set.instruments, &keep, PruneMethod::Reference)
        }
        Err(err) if config.fallback => {
            warn!("LD reference failed ({err}); falling back to simulated genotypes");
            prune_by_simulation(&set.instruments, config, PruneMethod::SimulationFallback)
        }
        Err(err) => Err(err),
    }
}
