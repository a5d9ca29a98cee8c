use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::error::{MrError, Result};

pub fn run_in_pool<T, F>(cores: Option<usize>, context: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> T + Send,
    T: Send,
{
    if let Some(cores) = cores {
        let pool = ThreadPoolBuilder::new()
            .num_threads(cores)
            .build()
            .map_err(|e| MrError::InputValidation(format!("{context}: {e}")))?;
        Ok(pool.install(f))
    } else {
        Ok(f())
    }
}

pub fn resolve_threads(cores: Option<usize>, tasks: usize) -> Option<usize> {
    if let Some(cores) = cores {
        let capped = cores.min(tasks.max(1));
        if cores > capped {
            tracing::debug!(
                "Provided cores ({cores}) greater than number of tasks ({tasks}); using {capped}"
            );
        }
        Some(capped.max(1))
    } else {
        None
    }
}

pub fn map_indexed<T, F>(cores: Option<usize>, context: &'static str, n: usize, f: F) -> Result<Vec<T>>
where
    F: Fn(usize) -> Result<T> + Sync + Send,
    T: Send,
{
    let threads = resolve_threads(cores, n);
    let results = run_in_pool(threads, context, || {
        (0..n).into_par_iter().map(&f).collect::<Vec<Result<T>>>()
    })?;
    results.into_iter().collect()
}

pub fn tally_indexed<F>(
    cores: Option<usize>,
    context: &'static str,
    n: usize,
    width: usize,
    f: F,
) -> Result<Vec<usize>>
where
    F: Fn(usize) -> Vec<usize> + Sync + Send,
{
    let threads = resolve_threads(cores, n);
    run_in_pool(threads, context, || {
        (0..n)
            .into_par_iter()
            .map(&f)
            .reduce(
                || vec![0usize; width],
                |mut acc, counts| {
                    for (a, c) in acc.iter_mut().zip(counts) {
                        *a += c;
                    }
                    acc
                },
            )
    })
}
