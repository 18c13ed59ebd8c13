pub mod job;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::utils::error::{PostError, Result};
use crate::utils::validation::{
    validate_existing_dir, validate_existing_file, validate_non_empty_string,
    validate_positive_number, validate_range, Validate,
};

#[derive(Debug, Parser)]
#[command(name = "g2post")]
#[command(about = "Post-processing toolkit for G2CRM simulation outputs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Append log output to this file")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Concatenate per-model-area CSV exports into one file
    Aggregate(AggregateArgs),
    /// Recompute present value of damages from an AssetDamageDetail export
    Discount(DiscountArgs),
    /// Discount every AssetDamageDetail export under a folder
    DiscountBatch(DiscountBatchArgs),
    /// Summarize finished G2CRM runs found via their .prn report files
    Summarize(SummarizeArgs),
    /// Mean cumulative damages by storm-stage threshold
    CumulativeDamage(CumulativeDamageArgs),
    /// Empirical stage-frequency curves from a storm detail export
    StageFrequency(StageFrequencyArgs),
    /// Stage-volume tables from per-model-area DEM rasters
    StageVolume(StageVolumeArgs),
    /// Collect matching output files into a flat folder
    CopyOutputs(CopyOutputsArgs),
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct AggregateArgs {
    #[arg(short, long, help = "Folder containing the csv exports")]
    pub input_folder: PathBuf,

    #[arg(short, long, help = "Path to the aggregated output csv")]
    pub output_file: PathBuf,

    #[arg(
        short,
        long,
        value_delimiter = ',',
        help = "Substrings the file names must contain, e.g. FWOP"
    )]
    #[serde(default)]
    pub contains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct DiscountArgs {
    #[arg(short, long, help = "Path to an AssetDamageDetail csv export")]
    pub input_file: PathBuf,

    #[arg(short, long, help = "Path to the output csv")]
    pub output_file: PathBuf,

    #[arg(short = 'r', long, help = "Annual discount rate in percent, e.g. 2.5")]
    pub discount_rate: f64,

    #[arg(short, long, help = "Base date for discounting, YYYYMMDD")]
    pub base_date: String,

    #[arg(long, help = "Report damages per iteration instead of per-asset means")]
    #[serde(default)]
    pub keep_iterations: bool,

    #[arg(long, help = "Skip the intermediate WorkingCalculations_ csv")]
    #[serde(default)]
    pub no_working_calcs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct DiscountBatchArgs {
    #[arg(short, long, help = "Folder containing AssetDamageDetail csv exports")]
    pub input_folder: PathBuf,

    #[arg(short, long, help = "Folder for the DiscountedDamages_ outputs")]
    pub output_folder: PathBuf,

    #[arg(short = 'r', long, help = "Annual discount rate in percent, e.g. 2.5")]
    pub discount_rate: f64,

    #[arg(short, long, help = "Base date for discounting, YYYYMMDD")]
    pub base_date: String,

    #[arg(long, help = "Report damages per iteration instead of per-asset means")]
    #[serde(default)]
    pub keep_iterations: bool,

    #[arg(long, help = "Skip the intermediate WorkingCalculations_ csvs")]
    #[serde(default)]
    pub no_working_calcs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct SummarizeArgs {
    #[arg(short, long, help = "Master folder containing run output folders")]
    pub input_folder: PathBuf,

    #[arg(short, long, help = "Path to the summary output csv")]
    pub output_file: PathBuf,

    #[arg(
        short,
        long,
        value_delimiter = ',',
        help = "Substrings the .prn file names must contain"
    )]
    #[serde(default)]
    pub contains: Vec<String>,

    #[arg(long, help = "Also write the summary as JSON next to the csv")]
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct CumulativeDamageArgs {
    #[arg(short, long, help = "Csv with Iteration, MaxStormStage, TotalLossPV columns")]
    pub input_file: PathBuf,

    #[arg(short, long, help = "Path to the output csv")]
    pub output_file: PathBuf,

    #[arg(
        short = 'l',
        long,
        conflicts_with = "integer",
        help = "Number of evenly spaced stage thresholds"
    )]
    #[serde(default)]
    pub steps: Option<usize>,

    #[arg(long, help = "Whole-valued stage thresholds only")]
    #[serde(default)]
    pub integer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct StageFrequencyArgs {
    #[arg(short, long, help = "Path to a ModeledAreaStormDetail csv export")]
    pub input_file: PathBuf,

    #[arg(short, long, help = "Path to the mean/median curve output csv")]
    pub output_file: PathBuf,

    #[arg(long, help = "Also write every iteration's ranked curve to this csv")]
    #[serde(default)]
    pub per_iteration_output: Option<PathBuf>,

    #[arg(
        long,
        default_value = "Iteration",
        help = "Iteration column, by header name or 0-based index"
    )]
    #[serde(default = "default_iteration_column")]
    pub iteration_column: String,

    #[arg(
        long,
        default_value = "SimulatedDay",
        help = "Days-from-iteration-start column, by header name or 0-based index"
    )]
    #[serde(default = "default_day_column")]
    pub day_column: String,

    #[arg(
        long,
        default_value = "StormSurge",
        help = "Storm surge column, by header name or 0-based index"
    )]
    #[serde(default = "default_surge_column")]
    pub surge_column: String,

    #[arg(
        long,
        default_value = "Tide",
        help = "Tide column, by header name or 0-based index"
    )]
    #[serde(default = "default_tide_column")]
    pub tide_column: String,

    #[arg(
        long,
        default_value = "90",
        help = "Tide percentile substituted for storm-free years"
    )]
    #[serde(default = "default_tide_percentile")]
    pub tide_percentile: f64,
}

fn default_iteration_column() -> String {
    "Iteration".to_string()
}

fn default_day_column() -> String {
    "SimulatedDay".to_string()
}

fn default_surge_column() -> String {
    "StormSurge".to_string()
}

fn default_tide_column() -> String {
    "Tide".to_string()
}

fn default_tide_percentile() -> f64 {
    90.0
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct StageVolumeArgs {
    #[arg(short, long, help = "Folder containing per-model-area DEM GeoTIFFs")]
    pub input_folder: PathBuf,

    #[arg(short, long, help = "Folder for the VolumeStageFunction_ outputs")]
    pub output_folder: PathBuf,

    #[arg(
        short,
        long,
        value_delimiter = ',',
        help = "Substrings the raster file names must contain"
    )]
    #[serde(default)]
    pub contains: Vec<String>,

    #[arg(short, long, help = "Deepest stage to tabulate, in raster units")]
    pub max_depth: u32,

    #[arg(long, default_value = "1", help = "Shallowest stage to tabulate")]
    #[serde(default = "default_start_depth")]
    pub start_depth: u32,

    #[arg(long, help = "Raster cell edge length, in raster units")]
    pub cell_size: f64,

    #[arg(long, help = "Elevation value marking cells outside the model area")]
    #[serde(default)]
    pub nodata: Option<f64>,
}

fn default_start_depth() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct CopyOutputsArgs {
    #[arg(short, long, help = "Master folder containing run output folders")]
    pub input_folder: PathBuf,

    #[arg(short, long, help = "Flat folder to copy matching files into")]
    pub output_folder: PathBuf,

    #[arg(short = 'x', long, help = "File extension to match, e.g. csv, sqlite")]
    pub extension: String,

    #[arg(
        short,
        long,
        value_delimiter = ',',
        help = "Substrings the file names must contain"
    )]
    #[serde(default)]
    pub contains: Vec<String>,
}

impl Validate for AggregateArgs {
    fn validate(&self) -> Result<()> {
        validate_existing_dir("input_folder", &self.input_folder)
    }
}

fn validate_discount_params(rate: f64, base_date: &str) -> Result<()> {
    validate_range("discount_rate", rate, 0.0, 100.0)?;
    validate_non_empty_string("base_date", base_date)
}

impl Validate for DiscountArgs {
    fn validate(&self) -> Result<()> {
        validate_existing_file("input_file", &self.input_file)?;
        validate_discount_params(self.discount_rate, &self.base_date)
    }
}

impl Validate for DiscountBatchArgs {
    fn validate(&self) -> Result<()> {
        validate_existing_dir("input_folder", &self.input_folder)?;
        validate_discount_params(self.discount_rate, &self.base_date)
    }
}

impl Validate for SummarizeArgs {
    fn validate(&self) -> Result<()> {
        validate_existing_dir("input_folder", &self.input_folder)
    }
}

impl Validate for CumulativeDamageArgs {
    fn validate(&self) -> Result<()> {
        validate_existing_file("input_file", &self.input_file)?;
        if let Some(steps) = self.steps {
            if self.integer {
                return Err(PostError::ConfigError {
                    message: "--steps and --integer are mutually exclusive".to_string(),
                });
            }
            validate_positive_number("steps", steps, 2)?;
        }
        Ok(())
    }
}

impl Validate for StageFrequencyArgs {
    fn validate(&self) -> Result<()> {
        validate_existing_file("input_file", &self.input_file)?;
        validate_range("tide_percentile", self.tide_percentile, 0.0, 100.0)
    }
}

impl Validate for StageVolumeArgs {
    fn validate(&self) -> Result<()> {
        validate_existing_dir("input_folder", &self.input_folder)?;
        if self.max_depth < self.start_depth {
            return Err(PostError::InvalidConfigValueError {
                field: "max_depth".to_string(),
                value: self.max_depth.to_string(),
                reason: format!("Must be at least start_depth ({})", self.start_depth),
            });
        }
        if !(self.cell_size > 0.0) {
            return Err(PostError::InvalidConfigValueError {
                field: "cell_size".to_string(),
                value: self.cell_size.to_string(),
                reason: "Cell size must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl Validate for CopyOutputsArgs {
    fn validate(&self) -> Result<()> {
        validate_existing_dir("input_folder", &self.input_folder)?;
        validate_non_empty_string("extension", &self.extension)
    }
}

impl Validate for Command {
    fn validate(&self) -> Result<()> {
        match self {
            Command::Aggregate(args) => args.validate(),
            Command::Discount(args) => args.validate(),
            Command::DiscountBatch(args) => args.validate(),
            Command::Summarize(args) => args.validate(),
            Command::CumulativeDamage(args) => args.validate(),
            Command::StageFrequency(args) => args.validate(),
            Command::StageVolume(args) => args.validate(),
            Command::CopyOutputs(args) => args.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cumulative_args_reject_conflicting_grid_modes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("damages.csv");
        std::fs::write(&input, "Iteration,MaxStormStage,TotalLossPV\n").unwrap();

        let args = CumulativeDamageArgs {
            input_file: input,
            output_file: dir.path().join("out.csv"),
            steps: Some(10),
            integer: true,
        };
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_discount_args_reject_out_of_range_rate() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("AssetDamageDetail_MA01.csv");
        std::fs::write(&input, "Iteration\n").unwrap();

        let args = DiscountArgs {
            input_file: input,
            output_file: dir.path().join("out.csv"),
            discount_rate: 250.0,
            base_date: "20300101".to_string(),
            keep_iterations: false,
            no_working_calcs: false,
        };
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_stage_volume_args_depth_ordering() {
        let dir = tempfile::tempdir().unwrap();
        let args = StageVolumeArgs {
            input_folder: dir.path().to_path_buf(),
            output_folder: dir.path().join("out"),
            contains: vec![],
            max_depth: 2,
            start_depth: 5,
            cell_size: 10.0,
            nodata: None,
        };
        assert!(args.validate().is_err());
    }
}
