//! Configuration loading from environment variables.

use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConsignError;

/// Which classifier protocol submissions go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisProtocol {
    /// One request per image, stopping at the first fake.
    PerImage,
    /// All images in a single request.
    Batch,
}

impl FromStr for AnalysisProtocol {
    type Err = ConsignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_image" | "per-image" => Ok(AnalysisProtocol::PerImage),
            "batch" => Ok(AnalysisProtocol::Batch),
            other => Err(ConsignError::InvalidValue(format!(
                "unknown analysis protocol '{}'",
                other
            ))),
        }
    }
}

/// How classifier labels are compared against the fake sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMatch {
    Exact,
    CaseInsensitive,
}

impl LabelMatch {
    pub fn matches(&self, label: &str, sentinel: &str) -> bool {
        match self {
            LabelMatch::Exact => label == sentinel,
            LabelMatch::CaseInsensitive => label.to_lowercase() == sentinel.to_lowercase(),
        }
    }
}

impl FromStr for LabelMatch {
    type Err = ConsignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(LabelMatch::Exact),
            "case_insensitive" | "case-insensitive" => Ok(LabelMatch::CaseInsensitive),
            other => Err(ConsignError::InvalidValue(format!(
                "unknown label match mode '{}'",
                other
            ))),
        }
    }
}

/// Classifier connection and verdict settings.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub base_url: String,
    pub protocol: AnalysisProtocol,
    pub label_match: LabelMatch,
    /// Sentinel category for the per-image protocol.
    pub fake_category: String,
    /// Result label for the batch protocol.
    pub fake_label: String,
    pub timeout: Option<Duration>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://api.quazar.co.kr".to_string(),
            protocol: AnalysisProtocol::PerImage,
            label_match: LabelMatch::Exact,
            fake_category: "fake".to_string(),
            fake_label: "Fake".to_string(),
            timeout: None,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub classifier: ClassifierConfig,
    /// How long the success notification stays up.
    pub notification: Duration,
    /// Uploads larger than this per side are downscaled.
    pub max_image_dimension: u32,
    pub seed_demo_items: bool,
}

impl Config {
    /// Loads configuration from environment variables, reading `.env` first if present.
    ///
    /// Every key is optional:
    /// - `CONSIGN_BIND_ADDR`
    /// - `CLASSIFIER_BASE_URL`
    /// - `ANALYSIS_PROTOCOL` (`per_image` or `batch`)
    /// - `FAKE_LABEL_MATCH` (`exact` or `case_insensitive`)
    /// - `FAKE_CATEGORY`, `FAKE_LABEL`
    /// - `CLASSIFIER_TIMEOUT_SECS`
    /// - `NOTIFICATION_MS`
    /// - `MAX_IMAGE_DIMENSION`
    /// - `SEED_DEMO_ITEMS`
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparsable value.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ClassifierConfig::default();

        let protocol = match lookup("ANALYSIS_PROTOCOL") {
            Some(v) => v.parse().context("ANALYSIS_PROTOCOL is invalid")?,
            None => defaults.protocol,
        };

        let label_match = match lookup("FAKE_LABEL_MATCH") {
            Some(v) => v.parse().context("FAKE_LABEL_MATCH is invalid")?,
            None => defaults.label_match,
        };

        let timeout = lookup("CLASSIFIER_TIMEOUT_SECS")
            .map(|v| v.trim().parse::<u64>())
            .transpose()
            .context("CLASSIFIER_TIMEOUT_SECS must be a whole number of seconds")?
            .map(Duration::from_secs);

        let notification_ms = lookup("NOTIFICATION_MS")
            .map(|v| v.trim().parse::<u64>())
            .transpose()
            .context("NOTIFICATION_MS must be a whole number of milliseconds")?
            .unwrap_or(2000);

        let max_image_dimension = lookup("MAX_IMAGE_DIMENSION")
            .map(|v| v.trim().parse::<u32>())
            .transpose()
            .context("MAX_IMAGE_DIMENSION must be a positive integer")?
            .unwrap_or(2048);
        if max_image_dimension == 0 {
            anyhow::bail!("MAX_IMAGE_DIMENSION must be a positive integer");
        }

        let seed_demo_items = lookup("SEED_DEMO_ITEMS")
            .map(|v| v.trim().parse::<bool>())
            .transpose()
            .context("SEED_DEMO_ITEMS must be true or false")?
            .unwrap_or(true);

        Ok(Self {
            bind_addr: lookup("CONSIGN_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            classifier: ClassifierConfig {
                base_url: lookup("CLASSIFIER_BASE_URL")
                    .map(|u| u.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.base_url),
                protocol,
                label_match,
                fake_category: lookup("FAKE_CATEGORY").unwrap_or(defaults.fake_category),
                fake_label: lookup("FAKE_LABEL").unwrap_or(defaults.fake_label),
                timeout,
            },
            notification: Duration::from_millis(notification_ms),
            max_image_dimension,
            seed_demo_items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.classifier.protocol, AnalysisProtocol::PerImage);
        assert_eq!(config.classifier.label_match, LabelMatch::Exact);
        assert_eq!(config.classifier.fake_category, "fake");
        assert_eq!(config.classifier.fake_label, "Fake");
        assert_eq!(config.classifier.timeout, None);
        assert_eq!(config.notification, Duration::from_secs(2));
        assert!(config.seed_demo_items);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("ANALYSIS_PROTOCOL", "batch"),
            ("FAKE_LABEL_MATCH", "case_insensitive"),
            ("CLASSIFIER_BASE_URL", "http://localhost:5000/"),
            ("CLASSIFIER_TIMEOUT_SECS", "15"),
            ("SEED_DEMO_ITEMS", "false"),
        ])
        .unwrap();
        assert_eq!(config.classifier.protocol, AnalysisProtocol::Batch);
        assert_eq!(config.classifier.label_match, LabelMatch::CaseInsensitive);
        assert_eq!(config.classifier.base_url, "http://localhost:5000");
        assert_eq!(config.classifier.timeout, Some(Duration::from_secs(15)));
        assert!(!config.seed_demo_items);
    }

    #[test]
    fn test_invalid_values() {
        assert!(load(&[("ANALYSIS_PROTOCOL", "parallel")]).is_err());
        assert!(load(&[("NOTIFICATION_MS", "soon")]).is_err());
        assert!(load(&[("MAX_IMAGE_DIMENSION", "0")]).is_err());
    }

    #[test]
    fn test_label_match() {
        assert!(LabelMatch::Exact.matches("Fake", "Fake"));
        assert!(!LabelMatch::Exact.matches("fake", "Fake"));
        assert!(LabelMatch::CaseInsensitive.matches("FAKE", "Fake"));
        assert!(!LabelMatch::CaseInsensitive.matches("Genuine", "Fake"));
    }
}
