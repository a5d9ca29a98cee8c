use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{MrError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.opengwas.io/api";
pub const TOKEN_ENV: &str = "OPENGWAS_JWT";

#[derive(Debug, Clone, PartialEq)]
pub struct ClumpRequest {
    pub snps: Vec<String>,
    pub pvalues: Vec<f64>,
    pub r2: f64,
    pub window_kb: u64,
    pub population: String,
}

pub trait LdReference: Send + Sync {
    fn clump(&self, request: &ClumpRequest) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct ReferenceConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

impl ReferenceConfig {
    pub fn with_env_token(mut self) -> Self {
        if self.token.is_none() {
            self.token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty());
        }
        self
    }
}

#[derive(Debug, Serialize)]
struct ClumpBody<'a> {
    rsid: &'a [String],
    pval: &'a [f64],
    pthresh: f64,
    r2: f64,
    kb: u64,
    pop: &'a str,
}

pub struct OpenGwasClumper {
    client: Client,
    config: ReferenceConfig,
}

impl OpenGwasClumper {
    pub fn new(config: ReferenceConfig) -> Result<Self> {
        if config.timeout_secs == 0 {
            return Err(MrError::InputValidation(
                "reference timeout must be positive".into(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MrError::ExternalService(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/ld/clump", self.config.base_url.trim_end_matches('/'))
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.config.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|e| MrError::InputValidation(format!("invalid access token: {e}")))?,
            );
        }
        Ok(headers)
    }
}

impl LdReference for OpenGwasClumper {
    fn clump(&self, request: &ClumpRequest) -> Result<Vec<String>> {
        if request.snps.len() != request.pvalues.len() {
            return Err(MrError::InputValidation(format!(
                "{} identifiers but {} p-values",
                request.snps.len(),
                request.pvalues.len()
            )));
        }
        let body = ClumpBody {
            rsid: &request.snps,
            pval: &request.pvalues,
            // every candidate is already an instrument
            pthresh: 1.0,
            r2: request.r2,
            kb: request.window_kb,
            pop: &request.population,
        };
        let url = self.endpoint();
        debug!("POST {url} with {} candidates", request.snps.len());

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .map_err(|e| MrError::ExternalService(format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().unwrap_or_default();
            return Err(MrError::ExternalService(format!(
                "LD reference returned {status}: {text}"
            )));
        }

        let kept: Vec<String> = response
            .json()
            .map_err(|e| MrError::ExternalService(format!("unreadable LD reference reply: {e}")))?;
        info!(
            "LD reference ({}) kept {} of {} candidates",
            request.population,
            kept.len(),
            request.snps.len()
        );
        Ok(kept)
    }
}
