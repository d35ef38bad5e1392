//! Token estimation seam.
//!
//! Placement decisions only compare estimates against thresholds, so an
//! approximate count is enough. Exact tokenizers can be plugged in through
//! [`TokenEstimator`].

use thiserror::Error;

use crate::config::EstimatorConfig;

#[derive(Error, Debug)]
pub enum EstimateError {
    #[error("Estimator unavailable: {0}")]
    Unavailable(String),

    #[error("Content of {len} bytes exceeds estimator limit of {limit} bytes")]
    ContentTooLarge { len: usize, limit: usize },
}

/// Approximate token counter for one piece of prompt content.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, content: &str) -> Result<usize, EstimateError>;
}

/// Characters-per-token heuristic with a fixed per-segment overhead.
#[derive(Debug, Clone)]
pub struct CharRatioEstimator {
    chars_per_token: usize,
    segment_overhead: usize,
    max_content_bytes: Option<usize>,
}

impl CharRatioEstimator {
    pub fn new(chars_per_token: usize, segment_overhead: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
            segment_overhead,
            max_content_bytes: None,
        }
    }

    /// Builder: refuse content above `limit` bytes.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.max_content_bytes = Some(limit);
        self
    }

    pub fn from_config(config: &EstimatorConfig) -> Self {
        let estimator = Self::new(config.chars_per_token, config.segment_overhead);
        match config.max_content_bytes {
            0 => estimator,
            limit => estimator.with_limit(limit),
        }
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::from_config(&EstimatorConfig::default())
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, content: &str) -> Result<usize, EstimateError> {
        if content.is_empty() {
            return Ok(0);
        }
        if let Some(limit) = self.max_content_bytes {
            if content.len() > limit {
                return Err(EstimateError::ContentTooLarge {
                    len: content.len(),
                    limit,
                });
            }
        }
        let chars = content.chars().count();
        Ok(chars.div_ceil(self.chars_per_token) + self.segment_overhead)
    }
}
