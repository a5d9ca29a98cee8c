use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read};
use std::path::Path;

use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use polars::prelude::*;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::df_utils::{
    ensure_f64, ensure_utf8, f64_values, filter_missing, infer_se, string_values,
    uppercase_alleles,
};
use crate::error::MrError;
use crate::schema::{missing_required, resolve_column_map};
use crate::types::AssociationRecord;

pub fn read_table(path: &Path) -> Result<DataFrame> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    if ext == "gz" || ext == "bz2" {
        let tmp = decompress_to_temp(path, &ext)?;
        return read_table_plain(tmp.path());
    }

    read_table_plain(path)
}

fn read_table_plain(path: &Path) -> Result<DataFrame> {
    let delimiter = detect_delimiter(path)?;
    if delimiter == b' ' {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        return read_table_whitespace(BufReader::new(file));
    }

    CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(delimiter)
                .with_null_values(Some(NullValues::AllColumns(vec![
                    "".into(),
                    "NA".into(),
                    "NaN".into(),
                    ".".into(),
                ])))
                .with_missing_is_null(true),
        )
        .with_ignore_errors(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("read {}", path.display()))
}

fn read_table_whitespace<R: Read>(reader: R) -> Result<DataFrame> {
    let mut lines = BufReader::new(reader).lines();
    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(anyhow::anyhow!("empty file")),
    };
    let headers: Vec<String> = header.split_whitespace().map(|s| s.to_string()).collect();
    if headers.is_empty() {
        return Err(anyhow::anyhow!("empty header line"));
    }
    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        for col in columns.iter_mut() {
            let value = parts.next().and_then(|v| match v {
                "NA" | "NaN" | "." => None,
                other => Some(other.trim_matches('"').to_string()),
            });
            col.push(value);
        }
    }

    let height = columns.first().map(|c| c.len()).unwrap_or(0);
    let cols: Vec<Column> = headers
        .iter()
        .zip(columns)
        .map(|(name, values)| Series::new(name.trim_matches('"').into(), values).into())
        .collect();
    Ok(DataFrame::new_with_height(height, cols)?)
}

fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut first = String::new();
    reader.read_line(&mut first)?;
    if first.contains('\t') {
        return Ok(b'\t');
    }
    if first.contains(',') {
        return Ok(b',');
    }
    Ok(b' ')
}

fn decompress_to_temp(path: &Path, ext: &str) -> Result<NamedTempFile> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut decoder: Box<dyn Read> = match ext {
        "gz" => Box::new(GzDecoder::new(file)),
        "bz2" => Box::new(BzDecoder::new(file)),
        _ => Box::new(file),
    };
    let mut tmp = NamedTempFile::new()?;
    std::io::copy(&mut decoder, &mut tmp)?;
    Ok(tmp)
}

fn invalid(label: &str, err: impl std::fmt::Display) -> MrError {
    MrError::InputValidation(format!("{label}: {err}"))
}

pub fn records_from_frame(
    df: DataFrame,
    label: &str,
    user_columns: &HashMap<String, String>,
) -> std::result::Result<Vec<AssociationRecord>, MrError> {
    if df.height() == 0 {
        return Err(MrError::InputValidation(format!("{label} table is empty")));
    }
    let headers: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let map = resolve_column_map(&headers, user_columns, label)?;
    for msg in &map.info {
        info!("{msg}");
    }
    for msg in &map.warnings {
        warn!("{msg}");
    }
    let missing = missing_required(&map);
    if !missing.is_empty() {
        return Err(MrError::InputValidation(format!(
            "{label} is missing required column(s): {}",
            missing.join(", ")
        )));
    }

    let mut df = df;
    df.set_column_names(&map.headers)
        .map_err(|e| invalid(label, e))?;
    let df = normalize_frame(df, label, map.has("SE")).map_err(|e| invalid(label, e))?;
    let records = collect_records(&df, map.has("CHR"), map.has("BP"))
        .map_err(|e| invalid(label, e))?;
    if records.is_empty() {
        return Err(MrError::InputValidation(format!(
            "{label} has no complete rows after validation"
        )));
    }
    info!("{label}: {} usable association records", records.len());
    Ok(records)
}

fn normalize_frame(df: DataFrame, label: &str, has_se: bool) -> Result<DataFrame> {
    let mut df = ensure_utf8(df, &["SNP", "A1", "A2"])?;
    df = ensure_f64(df, &["BETA", "SE", "PVALUE", "EAF"])?;
    df = uppercase_alleles(df)?;
    if !has_se {
        info!("{label}: no SE column; inferring SE from BETA and PVALUE");
        df = infer_se(df, "BETA", "PVALUE")?;
    }
    for col in ["SNP", "A1", "A2", "BETA", "SE", "PVALUE", "EAF"] {
        let (next, removed) = filter_missing(df, col)?;
        df = next;
        if removed > 0 {
            warn!("{label}: {removed} row(s) removed due to missing values in {col}");
        }
    }
    Ok(df)
}

fn collect_records(df: &DataFrame, has_chr: bool, has_bp: bool) -> Result<Vec<AssociationRecord>> {
    let snp = string_values(df, "SNP")?;
    let a1 = string_values(df, "A1")?;
    let a2 = string_values(df, "A2")?;
    let beta = f64_values(df, "BETA")?;
    let se = f64_values(df, "SE")?;
    let pvalue = f64_values(df, "PVALUE")?;
    let eaf = f64_values(df, "EAF")?;
    let chr = if has_chr {
        string_values(df, "CHR")?
    } else {
        vec![None; df.height()]
    };
    let bp = if has_bp {
        f64_values(df, "BP")?
    } else {
        vec![None; df.height()]
    };

    let mut out = Vec::with_capacity(df.height());
    let mut bad_eaf = 0usize;
    for i in 0..df.height() {
        let (Some(snp), Some(a1), Some(a2), Some(beta), Some(se), Some(p), Some(f)) = (
            snp[i].clone(),
            a1[i].clone(),
            a2[i].clone(),
            beta[i],
            se[i],
            pvalue[i],
            eaf[i],
        ) else {
            continue;
        };
        if !(f > 0.0 && f < 1.0) {
            bad_eaf += 1;
            continue;
        }
        out.push(AssociationRecord {
            snp: snp.trim().to_string(),
            chr: chr[i].as_deref().and_then(parse_chromosome),
            bp: bp[i].filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64),
            effect_allele: a1,
            other_allele: a2,
            beta,
            se,
            pvalue: p,
            eaf: f,
        });
    }
    if bad_eaf > 0 {
        warn!("{bad_eaf} row(s) removed due to EAF outside (0, 1)");
    }
    Ok(out)
}

pub fn parse_chromosome(value: &str) -> Option<u8> {
    let trimmed = value.trim();
    let stripped = trimmed
        .strip_prefix("chr")
        .or_else(|| trimmed.strip_prefix("CHR"))
        .unwrap_or(trimmed);
    match stripped.to_ascii_uppercase().as_str() {
        "X" => Some(23),
        "Y" => Some(24),
        other => other
            .parse::<f64>()
            .ok()
            .filter(|v| v.fract() == 0.0 && *v >= 1.0 && *v <= 26.0)
            .map(|v| v as u8),
    }
}

pub fn read_association_table(
    path: &Path,
    label: &str,
    user_columns: &HashMap<String, String>,
) -> Result<Vec<AssociationRecord>> {
    let df = read_table(path).with_context(|| format!("read {label} table"))?;
    info!("Loaded {label} table {} ({} rows)", path.display(), df.height());
    Ok(records_from_frame(df, label, user_columns)?)
}

pub fn write_dataframe(df: &DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut csv = CsvWriter::new(&mut file).with_separator(b'\t');
    let mut df = df.clone();
    csv.finish(&mut df)?;
    Ok(())
}

pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
