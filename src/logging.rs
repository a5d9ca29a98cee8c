use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::SkipReason;
use crate::types::DroppedInstrument;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn open_run_log(out_dir: &Path, name: &str) -> Result<File> {
    let path = out_dir.join(format!("{name}.log"));
    File::create(&path).with_context(|| format!("create {}", path.display()))
}

pub fn log_line(log: &mut File, message: &str, print: bool) -> Result<()> {
    if print {
        info!("{message}");
    }
    writeln!(log, "{message}")?;
    Ok(())
}

pub fn warn_line(log: &mut File, message: &str) -> Result<()> {
    warn!("{message}");
    writeln!(log, "WARNING: {message}")?;
    Ok(())
}

pub fn log_skip(log: &mut File, reason: &SkipReason) -> Result<()> {
    warn_line(log, &reason.to_string())
}

pub fn log_drop_summary(log: &mut File, stage: &str, dropped: &[DroppedInstrument]) -> Result<()> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for d in dropped {
        *counts.entry(d.reason.as_str()).or_default() += 1;
    }
    for (reason, count) in counts {
        log_line(
            log,
            &format!("{stage}: {count} instrument(s) removed ({reason})"),
            true,
        )?;
    }
    Ok(())
}
