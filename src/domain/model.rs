use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What a tool produced: the files it wrote and how many records went
/// through the transform.
#[derive(Debug, Clone, Default)]
pub struct ToolReport {
    pub outputs: Vec<PathBuf>,
    pub records: usize,
}

impl ToolReport {
    pub fn single(output: PathBuf, records: usize) -> Self {
        Self {
            outputs: vec![output],
            records,
        }
    }
}

/// Mean present-value damages per asset, the default discount output.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DiscountedAsset {
    #[serde(rename = "AssetExternalReference")]
    pub asset: String,
    #[serde(rename = "ValueLossStructurePV")]
    pub value_loss_structure_pv: f64,
    #[serde(rename = "ValueLossContentsPV")]
    pub value_loss_contents_pv: f64,
    #[serde(rename = "TotalLossPV")]
    pub total_loss_pv: f64,
}

/// Present-value damages per asset and iteration (`--keep-iterations`).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DiscountedIteration {
    #[serde(rename = "AssetExternalReference")]
    pub asset: String,
    #[serde(rename = "Iteration")]
    pub iteration: u32,
    #[serde(rename = "ValueLossStructurePV")]
    pub value_loss_structure_pv: f64,
    #[serde(rename = "ValueLossContentsPV")]
    pub value_loss_contents_pv: f64,
    #[serde(rename = "TotalLossPV")]
    pub total_loss_pv: f64,
}

/// One storm event from a `ModeledAreaStormDetail` export, with the
/// simulated day already bucketed into a year.
#[derive(Debug, Clone, Copy)]
pub struct StormEvent {
    pub iteration: u32,
    pub year: u32,
    pub surge: f64,
    pub tide: f64,
}

impl StormEvent {
    pub fn surge_tide(&self) -> f64 {
        self.surge + self.tide
    }
}

/// One rank of the averaged stage-frequency table.
#[derive(Debug, Clone, Serialize)]
pub struct StageFrequencyRow {
    #[serde(rename = "RecurrenceInterval")]
    pub recurrence_interval: f64,
    #[serde(rename = "MeanSurgeTide")]
    pub mean_surge_tide: f64,
    #[serde(rename = "MedianSurgeTide")]
    pub median_surge_tide: f64,
    #[serde(rename = "MeanSurge")]
    pub mean_surge: f64,
    #[serde(rename = "MedianSurge")]
    pub median_surge: f64,
    #[serde(rename = "MeanTide")]
    pub mean_tide: f64,
    #[serde(rename = "MedianTide")]
    pub median_tide: f64,
}

/// One rank of a single iteration's stage-frequency curve
/// (`--per-iteration-output`).
#[derive(Debug, Clone, Serialize)]
pub struct IterationCurvePoint {
    #[serde(rename = "Iteration")]
    pub iteration: u32,
    #[serde(rename = "Rank")]
    pub rank: u32,
    #[serde(rename = "RecurrenceInterval")]
    pub recurrence_interval: f64,
    #[serde(rename = "SurgeTide")]
    pub surge_tide: f64,
    #[serde(rename = "Surge")]
    pub surge: f64,
}

/// Mean cumulative damages at one storm-stage threshold.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StormStageDamage {
    #[serde(rename = "MaxStormStage")]
    pub max_storm_stage: f64,
    #[serde(rename = "CumulativeTotalLossPV")]
    pub cumulative_total_loss_pv: f64,
}

/// One row of a G2CRM `VolumeStageFunction` table: flooded volume `X` at
/// stage `Y`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VolumeStagePoint {
    #[serde(rename = "X")]
    pub volume: f64,
    #[serde(rename = "Y")]
    pub stage: u32,
}

/// One summarized G2CRM run. All cells are strings because any of them can
/// degrade to a sentinel ("Script Error", "Unfinished Run", ...) when the
/// run folder is incomplete; the external spreadsheets consuming this file
/// expect those literals. Field order is the output column order.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunSummary {
    pub file_name: String,
    pub file_path: String,
    pub folder_path: String,
    #[serde(rename = "MA")]
    pub ma: String,
    pub simulation_name: String,
    pub g2_version: String,
    pub g2_start_time: String,
    pub run_time: String,
    pub run_time_hrs: String,
    pub slc: String,
    pub plan_alt: String,
    pub iters: String,
    pub g2_assets: String,
    pub number_of_storms: String,
    pub total_life_loss: String,
    pub total_life_loss_std: String,
    pub upland_pvdamage: String,
    pub upland_pvdamage_std: String,
    pub assets_elevated: String,
    pub assets_removed: String,
    pub damaged_structures: String,
    pub run_condition: String,
    pub seed: String,
    pub interest_rate: String,
    pub duration: String,
    pub basis_time: String,
    pub start_time: String,
    pub slc_basis_year: String,
    pub cum_damage_removal: String,
    pub depreciation: String,
    pub asset_raising: String,
    pub calculate_life_loss: String,
}
