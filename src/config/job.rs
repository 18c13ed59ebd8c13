use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{
    AggregateArgs, Command, CopyOutputsArgs, CumulativeDamageArgs, DiscountArgs,
    DiscountBatchArgs, StageFrequencyArgs, StageVolumeArgs, SummarizeArgs,
};
use crate::utils::error::{PostError, Result};
use crate::utils::validation::Validate;

/// A TOML job file: a named sequence of post-processing steps run in order.
///
/// ```toml
/// [job]
/// name = "fwop-econ-appendix"
/// description = "Collect, discount, and summarize the FWOP runs"
/// on_error = "continue"
///
/// [[steps]]
/// kind = "discount-batch"
/// input_folder = "runs/fwop"
/// output_folder = "discounted"
/// discount_rate = 2.5
/// base_date = "20300101"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub job: JobMeta,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMeta {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub on_error: ErrorPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    #[default]
    Abort,
    Continue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Step {
    Aggregate(AggregateArgs),
    Discount(DiscountArgs),
    DiscountBatch(DiscountBatchArgs),
    Summarize(SummarizeArgs),
    CumulativeDamage(CumulativeDamageArgs),
    StageFrequency(StageFrequencyArgs),
    StageVolume(StageVolumeArgs),
    CopyOutputs(CopyOutputsArgs),
}

impl Step {
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Aggregate(_) => "aggregate",
            Step::Discount(_) => "discount",
            Step::DiscountBatch(_) => "discount-batch",
            Step::Summarize(_) => "summarize",
            Step::CumulativeDamage(_) => "cumulative-damage",
            Step::StageFrequency(_) => "stage-frequency",
            Step::StageVolume(_) => "stage-volume",
            Step::CopyOutputs(_) => "copy-outputs",
        }
    }
}

impl From<Step> for Command {
    fn from(step: Step) -> Self {
        match step {
            Step::Aggregate(args) => Command::Aggregate(args),
            Step::Discount(args) => Command::Discount(args),
            Step::DiscountBatch(args) => Command::DiscountBatch(args),
            Step::Summarize(args) => Command::Summarize(args),
            Step::CumulativeDamage(args) => Command::CumulativeDamage(args),
            Step::StageFrequency(args) => Command::StageFrequency(args),
            Step::StageVolume(args) => Command::StageVolume(args),
            Step::CopyOutputs(args) => Command::CopyOutputs(args),
        }
    }
}

impl Validate for Step {
    fn validate(&self) -> Result<()> {
        match self {
            Step::Aggregate(args) => args.validate(),
            Step::Discount(args) => args.validate(),
            Step::DiscountBatch(args) => args.validate(),
            Step::Summarize(args) => args.validate(),
            Step::CumulativeDamage(args) => args.validate(),
            Step::StageFrequency(args) => args.validate(),
            Step::StageVolume(args) => args.validate(),
            Step::CopyOutputs(args) => args.validate(),
        }
    }
}

impl JobConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: JobConfig = toml::from_str(&content)?;
        config.validate_structure()?;
        Ok(config)
    }

    fn validate_structure(&self) -> Result<()> {
        if self.job.name.trim().is_empty() {
            return Err(PostError::MissingConfigError {
                field: "job.name".to_string(),
            });
        }
        if self.steps.is_empty() {
            return Err(PostError::ConfigError {
                message: "Job file defines no steps".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_config_parses_steps() {
        let toml_text = r#"
            [job]
            name = "nightly"
            on_error = "continue"

            [[steps]]
            kind = "aggregate"
            input_folder = "data"
            output_file = "out/combined.csv"
            contains = ["FWOP"]

            [[steps]]
            kind = "discount-batch"
            input_folder = "data"
            output_folder = "out"
            discount_rate = 2.5
            base_date = "20300101"
        "#;

        let config: JobConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(config.job.name, "nightly");
        assert_eq!(config.job.on_error, ErrorPolicy::Continue);
        assert_eq!(config.steps.len(), 2);
        assert_eq!(config.steps[0].kind(), "aggregate");
        match &config.steps[1] {
            Step::DiscountBatch(args) => {
                assert_eq!(args.discount_rate, 2.5);
                assert!(!args.keep_iterations);
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_job_config_rejects_empty_steps() {
        let toml_text = r#"
            steps = []

            [job]
            name = "empty"
        "#;
        let config: JobConfig = toml::from_str(toml_text).unwrap();
        assert!(config.validate_structure().is_err());
    }

    #[test]
    fn test_default_error_policy_is_abort() {
        let toml_text = r#"
            [job]
            name = "n"

            [[steps]]
            kind = "copy-outputs"
            input_folder = "in"
            output_folder = "out"
            extension = "csv"
        "#;
        let config: JobConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(config.job.on_error, ErrorPolicy::Abort);
    }
}
