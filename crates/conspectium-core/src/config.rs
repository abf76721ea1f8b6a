//! Pipeline configuration.

use std::fmt;
use std::str::FromStr;

use crate::defaults;

/// Deployment environment.
///
/// Only `Production` disables the offline fallback generators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Environment {
    Production,
    #[default]
    Development,
    Test,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Development => "development",
            Environment::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    /// Anything that is not recognizably production or test is development.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" | "testing" => Environment::Test,
            _ => Environment::Development,
        })
    }
}

/// Configuration consumed by the generation pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub environment: Environment,
    /// Question count used when a quiz request does not name one.
    pub default_question_count: u32,
    pub summary_max_length: usize,
    /// Store a fixed placeholder transcript when transcription fails outside
    /// production, instead of failing the job.
    pub transcription_placeholder: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            default_question_count: defaults::DEFAULT_QUESTION_COUNT,
            summary_max_length: defaults::SUMMARY_MAX_LENGTH,
            transcription_placeholder: false,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ENVIRONMENT` | `development` | `production` disables offline fallbacks |
    /// | `QUIZ_QUESTION_COUNT` | `10` | Default questions per quiz (1..=50) |
    /// | `TRANSCRIPTION_PLACEHOLDER` | `false` | Placeholder transcript on failure (ignored in production) |
    pub fn from_env() -> Self {
        let environment = std::env::var("ENVIRONMENT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        let default_question_count = std::env::var("QUIZ_QUESTION_COUNT")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults::DEFAULT_QUESTION_COUNT)
            .clamp(1, defaults::MAX_QUESTION_COUNT);

        let transcription_placeholder = std::env::var("TRANSCRIPTION_PLACEHOLDER")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Self {
            environment,
            default_question_count,
            summary_max_length: defaults::SUMMARY_MAX_LENGTH,
            transcription_placeholder,
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_default_question_count(mut self, count: u32) -> Self {
        self.default_question_count = count.clamp(1, defaults::MAX_QUESTION_COUNT);
        self
    }

    pub fn with_transcription_placeholder(mut self, enabled: bool) -> Self {
        self.transcription_placeholder = enabled;
        self
    }

    /// Whether the placeholder transcript may be used. Never in production.
    pub fn placeholder_enabled(&self) -> bool {
        self.transcription_placeholder && !self.environment.is_production()
    }
}
