use crate::config::config::EstimationConfig;
use crate::model::ModelClient;
use crate::services::image_codec::{ImageCodec, ImageCodecError};
use crate::services::prompt_builder::build_prompt;
use image::DynamicImage;
use regex::Regex;
use serde::Serialize;
use std::fmt::Display;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info, warn};

static PERCENTAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)%").expect("hard-coded regex should always compile"));

#[derive(Debug, Error)]
pub enum EstimateError {
    #[error(transparent)]
    Image(#[from] ImageCodecError),
}

/// Outcome of a single model invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunResult {
    Success { text: String },
    Failure { run: usize, description: String },
}

impl Display for RunResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunResult::Success { text } => write!(f, "{}", text),
            RunResult::Failure { run, description } => {
                write!(f, "Error in run {}: {}", run, description)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimationResult {
    /// Mean of `parsed_percentages`, rounded to two decimals.
    pub average: Option<f64>,
    /// One entry per run, in run order.
    pub runs: Vec<RunResult>,
    pub parsed_percentages: Vec<u64>,
}

impl EstimationResult {
    /// Per-run text as shown to users, failures rendered as error messages.
    pub fn raw_outputs(&self) -> Vec<String> {
        self.runs.iter().map(ToString::to_string).collect()
    }

    pub fn failed_runs(&self) -> usize {
        self.runs
            .iter()
            .filter(|run| matches!(run, RunResult::Failure { .. }))
            .count()
    }
}

/// Asks the model the same question several times and averages the answers.
pub struct SamplingEstimator<C: ModelClient> {
    client: C,
    codec: ImageCodec,
    default_runs: usize,
    max_runs: usize,
}

impl<C: ModelClient> SamplingEstimator<C> {
    pub fn new(client: C, config: &EstimationConfig) -> Self {
        let max_runs = config.max_runs().max(1);
        let default_runs = config.runs().clamp(1, max_runs);
        if default_runs != config.runs() {
            warn!(
                "Configured run count {} is outside 1..={}, using {}",
                config.runs(),
                max_runs,
                default_runs
            );
        }
        Self {
            client,
            codec: ImageCodec::new(config.jpeg_quality()),
            default_runs,
            max_runs,
        }
    }

    pub fn default_runs(&self) -> usize {
        self.default_runs
    }

    pub fn max_runs(&self) -> usize {
        self.max_runs
    }

    /// Whether a caller-supplied run count lies within `1..=max_runs`.
    pub fn accepts_run_count(&self, run_count: usize) -> bool {
        (1..=self.max_runs).contains(&run_count)
    }

    /// Runs `run_count` sequential queries with one shared payload.
    ///
    /// Only image encoding can fail the whole estimation. Model failures are
    /// recorded in place of that run's output and the loop carries on.
    pub async fn run(
        &self,
        current: &DynamicImage,
        complete: &DynamicImage,
        run_count: usize,
    ) -> Result<EstimationResult, EstimateError> {
        debug!("Encoding images as JPEG at quality {}", self.codec.quality());
        let current = self.codec.encode(current)?;
        let complete = self.codec.encode(complete)?;
        let payload = build_prompt(current, complete);

        let mut runs = Vec::new();
        let mut parsed_percentages = Vec::new();

        for run in 1..=run_count {
            match self.client.generate(&payload).await {
                Ok(text) => {
                    match extract_first_percentage(&text) {
                        Some(percentage) => {
                            info!("Run {}/{}: {}%", run, run_count, percentage);
                            parsed_percentages.push(percentage);
                        }
                        None => debug!("Run {}/{}: no percentage in response", run, run_count),
                    }
                    runs.push(RunResult::Success { text });
                }
                Err(err) => {
                    warn!("Run {}/{} failed: {}", run, run_count, err);
                    runs.push(RunResult::Failure {
                        run,
                        description: err.to_string(),
                    });
                }
            }
        }

        let average = average_percentage(&parsed_percentages);
        match average {
            Some(average) => info!(
                "Estimated completion {}% from {} of {} runs",
                average,
                parsed_percentages.len(),
                run_count
            ),
            None => warn!("No run out of {} produced a percentage", run_count),
        }

        Ok(EstimationResult {
            average,
            runs,
            parsed_percentages,
        })
    }
}

/// First `digits%` occurrence in `text`, ASCII digits only. Values are not
/// range-checked.
pub fn extract_first_percentage(text: &str) -> Option<u64> {
    PERCENTAGE
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Arithmetic mean rounded half away from zero to two decimals.
pub fn average_percentage(percentages: &[u64]) -> Option<f64> {
    if percentages.is_empty() {
        return None;
    }
    let sum: f64 = percentages.iter().map(|&p| p as f64).sum();
    let mean = sum / percentages.len() as f64;
    Some((mean * 100.0).round() / 100.0)
}
