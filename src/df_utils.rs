use std::borrow::Cow;

use anyhow::{Context, Result};
use polars::prelude::*;
use statrs::distribution::{ContinuousCDF, Normal};

pub fn ensure_utf8(mut df: DataFrame, cols: &[&str]) -> Result<DataFrame> {
    for col in cols {
        if let Ok(column) = df.column(col)
            && let Some(series) = column.as_series()
            && series.dtype() != &DataType::String
        {
            let mut casted = series.cast(&DataType::String)?;
            casted.rename((*col).into());
            df.with_column(casted.into_column())?;
        }
    }
    Ok(df)
}

pub fn ensure_f64(mut df: DataFrame, cols: &[&str]) -> Result<DataFrame> {
    for col in cols {
        if let Ok(column) = df.column(col)
            && let Some(series) = column.as_series()
            && series.dtype() != &DataType::Float64
        {
            let mut casted = series.cast(&DataType::Float64)?;
            casted.rename((*col).into());
            df.with_column(casted.into_column())?;
        }
    }
    Ok(df)
}

pub fn uppercase_alleles(mut df: DataFrame) -> Result<DataFrame> {
    for col in ["A1", "A2"] {
        if let Ok(column) = df.column(col)
            && let Some(series) = column.as_series()
            && let Ok(utf8) = series.str()
        {
            let upper = utf8
                .apply(|v| v.map(|s| Cow::Owned(s.trim().to_ascii_uppercase())))
                .into_series();
            let mut s = upper;
            s.rename(col.into());
            df.with_column(s.into_column())?;
        }
    }
    Ok(df)
}

pub fn filter_missing(mut df: DataFrame, col: &str) -> Result<(DataFrame, usize)> {
    if df.column(col).is_err() {
        return Ok((df, 0));
    }
    let before = df.height();
    let column = df.column(col)?;
    let series = column.as_series().context("series")?;
    let mask = match series.dtype() {
        DataType::Float64 => series.is_not_null() & series.f64()?.is_not_nan(),
        _ => series.is_not_null(),
    };
    df = df.filter(&mask)?;
    let removed = before.saturating_sub(df.height());
    Ok((df, removed))
}

// Adds an `SE` column recovered from the effect size and its two-sided p-value,
// `|beta / qnorm(p / 2)|`. Rows where that is undefined get a null.
pub fn infer_se(mut df: DataFrame, effect_col: &str, p_col: &str) -> Result<DataFrame> {
    let effect = df
        .column(effect_col)?
        .as_series()
        .context("BETA")?
        .f64()?
        .clone();
    let pvals = df.column(p_col)?.as_series().context("PVALUE")?.f64()?.clone();
    let normal = Normal::new(0.0, 1.0).context("normal distribution")?;

    let se: Float64Chunked = effect
        .into_iter()
        .zip(pvals.into_iter())
        .map(|(b, p)| match (b, p) {
            (Some(b), Some(p)) if p > 0.0 && p < 1.0 => {
                let z = normal.inverse_cdf(p / 2.0);
                let se = (b / z).abs();
                (se.is_finite() && se > 0.0).then_some(se)
            }
            _ => None,
        })
        .collect();

    let mut series = se.into_series();
    series.rename("SE".into());
    df.with_column(series.into_column())?;
    Ok(df)
}

pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .with_context(|| format!("column {name}"))?
        .as_series()
        .context("series")?
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df
        .column(name)
        .with_context(|| format!("column {name}"))?
        .as_series()
        .context("series")?
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}
