use std::collections::HashMap;

use crate::error::{MrError, Result};

pub const REQUIRED_COLUMNS: [&str; 6] = ["SNP", "BETA", "PVALUE", "EAF", "A1", "A2"];

const SYNONYMS: &[(&str, &[&str])] = &[
    (
        "SNP",
        &[
            "SNP", "RSID", "RSIDS", "MARKER", "MARKERNAME", "RS_NUMBER", "SNPID", "SNP_ID",
            "VARIANT_ID", "ID",
        ],
    ),
    ("CHR", &["CHR", "CHROMOSOME", "CHROM", "#CHROM"]),
    ("BP", &["BP", "POS", "POSITION", "BASE_PAIR_LOCATION"]),
    (
        "A1",
        &["A1", "EFFECT_ALLELE", "EA", "ALT", "ALLELE1", "INC_ALLELE"],
    ),
    (
        "A2",
        &[
            "A2", "OTHER_ALLELE", "OA", "REF", "ALLELE2", "NON_EFFECT_ALLELE", "NEA",
        ],
    ),
    ("BETA", &["BETA", "B", "EFFECT_SIZE", "EFFECT", "EST"]),
    (
        "SE",
        &["SE", "STDERR", "STANDARD_ERROR", "SEBETA", "STANDARDERROR"],
    ),
    (
        "PVALUE",
        &["PVALUE", "P", "PVAL", "P_VALUE", "P-VALUE", "P.VALUE", "P_VAL"],
    ),
    (
        "EAF",
        &[
            "EAF",
            "EFFECT_ALLELE_FREQ",
            "EFFECT_ALLELE_FREQUENCY",
            "FREQ",
            "FREQ1",
            "A1FREQ",
            "RISKFREQUENCY",
            "MAF",
        ],
    ),
];

#[derive(Debug, Clone)]
pub struct ColumnMap {
    pub headers: Vec<String>,
    pub warnings: Vec<String>,
    pub info: Vec<String>,
}

impl ColumnMap {
    pub fn has(&self, canonical: &str) -> bool {
        self.headers.iter().any(|h| h == canonical)
    }
}

pub fn normalize_headers(headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .map(|h| h.trim().to_ascii_uppercase())
        .collect()
}

pub fn resolve_column_map(
    headers: &[String],
    user_provided: &HashMap<String, String>,
    label: &str,
) -> Result<ColumnMap> {
    let mut warnings = Vec::new();
    let mut info = Vec::new();
    let mut headers = normalize_headers(headers);

    let user_map: HashMap<String, String> = user_provided
        .iter()
        .map(|(k, v)| (k.to_ascii_uppercase(), v.to_ascii_uppercase()))
        .collect();

    for (canonical, syns) in SYNONYMS {
        if let Some(user_col) = user_map.get(*canonical) {
            let Some(pos) = headers.iter().position(|h| h == user_col) else {
                return Err(MrError::InputValidation(format!(
                    "column {user_col} requested as {canonical} is not present in {label}"
                )));
            };
            headers[pos] = canonical.to_string();
            info.push(format!(
                "Interpreting the {user_col} column as the {canonical} column, as requested."
            ));
            continue;
        }

        if headers.iter().any(|h| h == *canonical) {
            continue;
        }

        // First synonym in priority order wins; later matches stay untouched.
        let hit = syns
            .iter()
            .find_map(|s| headers.iter().position(|h| h == s));
        if let Some(pos) = hit {
            info.push(format!(
                "Interpreting the {} column as the {canonical} column in {label}.",
                headers[pos]
            ));
            if headers[pos] == "MAF" {
                warnings.push(format!(
                    "{label} provides MAF rather than EAF; frequencies are assumed to refer to the effect allele."
                ));
            }
            headers[pos] = canonical.to_string();
        }
    }

    for col in REQUIRED_COLUMNS {
        let count = headers.iter().filter(|h| h.as_str() == col).count();
        if count > 1 {
            return Err(MrError::InputValidation(format!(
                "multiple columns in {label} were interpreted as {col}"
            )));
        }
    }

    Ok(ColumnMap {
        headers,
        warnings,
        info,
    })
}

pub fn missing_required(map: &ColumnMap) -> Vec<&'static str> {
    REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !map.has(c))
        .collect()
}
