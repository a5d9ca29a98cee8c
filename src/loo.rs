use tracing::info;

use crate::error::{MrError, Result};
use crate::estimators::ivw;
use crate::parallel::map_indexed;
use crate::types::{LeaveOneOut, LeaveOneOutSeries, PrunedSet};

pub const LOO_MIN_INSTRUMENTS: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct LooConfig {
    pub cores: Option<usize>,
}

pub fn leave_one_out(set: &PrunedSet, config: &LooConfig) -> Result<LeaveOneOutSeries> {
    let n = set.len();
    if n < LOO_MIN_INSTRUMENTS {
        return Err(MrError::InsufficientInstruments {
            method: "Leave-one-out",
            required: LOO_MIN_INSTRUMENTS,
            found: n,
        });
    }
    let entries = map_indexed(config.cores, "build leave-one-out pool", n, |i| {
        let excluded = &set.instruments[i];
        let estimate = ivw(&set.without(&[excluded.snp.as_str()]))?;
        Ok(LeaveOneOut {
            excluded: excluded.snp.clone(),
            estimate,
        })
    })?;

    if let Some(most) = entries.iter().max_by(|a, b| {
        a.estimate
            .estimate
            .total_cmp(&b.estimate.estimate)
    }) && let Some(least) = entries
        .iter()
        .min_by(|a, b| a.estimate.estimate.total_cmp(&b.estimate.estimate))
    {
        info!(
            "Leave-one-out range {:.4} (without {}) to {:.4} (without {})",
            least.estimate.estimate, least.excluded, most.estimate.estimate, most.excluded
        );
    }
    Ok(LeaveOneOutSeries { entries })
}
