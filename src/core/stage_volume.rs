use std::fs::File;
use std::path::{Path, PathBuf};

use tiff::decoder::{Decoder, DecodingResult};

use crate::config::StageVolumeArgs;
use crate::core::{Tool, ToolReport};
use crate::domain::model::VolumeStagePoint;
use crate::utils::error::{PostError, Result};
use crate::utils::paths;

fn to_f64(samples: DecodingResult) -> Vec<f64> {
    match samples {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|s| s as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|s| s as f64).collect(),
        DecodingResult::F16(v) => v.into_iter().map(|s| s.to_f64()).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
    }
}

/// Ground elevations from a model-area DEM, with NaN and nodata cells
/// already dropped.
fn read_elevations(path: &Path, nodata: Option<f64>) -> Result<Vec<f64>> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(std::io::BufReader::new(file))?;
    let samples = to_f64(decoder.read_image()?);
    Ok(samples
        .into_iter()
        .filter(|e| !e.is_nan() && Some(*e) != nodata)
        .collect())
}

/// Water volume held below `stage` over the cells of the model area.
fn volume_at_stage(elevations: &[f64], stage: f64, cell_area: f64) -> f64 {
    elevations
        .iter()
        .map(|elevation| (stage - elevation).max(0.0) * cell_area)
        .sum()
}

/// Builds per-model-area stage-volume tables from pre-clipped DEM rasters.
/// Each raster yields a `VolumeStageFunction_<MA>.csv` with one row per
/// whole-valued stage.
pub struct StageVolumeTool {
    args: StageVolumeArgs,
}

impl StageVolumeTool {
    pub fn new(args: StageVolumeArgs) -> Self {
        Self { args }
    }

    fn output_name(&self, raster: &Path) -> String {
        let area = paths::derive_ma_code(raster)
            .unwrap_or_else(|| paths::strip_meta(raster));
        format!("VolumeStageFunction_{}.csv", area)
    }
}

impl Tool for StageVolumeTool {
    fn name(&self) -> &'static str {
        "stage-volume"
    }

    fn run(&self) -> Result<ToolReport> {
        let mut rasters = paths::paths_by_type(&self.args.input_folder, "tif", &self.args.contains)?;
        rasters.extend(paths::paths_by_type(
            &self.args.input_folder,
            "tiff",
            &self.args.contains,
        )?);
        rasters.sort();
        if rasters.is_empty() {
            return Err(PostError::ProcessingError {
                message: format!(
                    "No DEM rasters (.tif/.tiff) under {}",
                    self.args.input_folder.display()
                ),
            });
        }

        std::fs::create_dir_all(&self.args.output_folder)?;
        let cell_area = self.args.cell_size * self.args.cell_size;

        let mut outputs: Vec<PathBuf> = Vec::with_capacity(rasters.len());
        let mut records = 0usize;
        for (i, raster) in rasters.iter().enumerate() {
            tracing::info!(
                "{:02}/{} - Tabulating volumes for {}",
                i + 1,
                rasters.len(),
                raster.display()
            );
            let elevations = read_elevations(raster, self.args.nodata)?;
            if elevations.is_empty() {
                tracing::warn!("{} holds no usable cells, skipping", raster.display());
                continue;
            }

            let output = self.args.output_folder.join(self.output_name(raster));
            let mut writer = csv::Writer::from_path(&output)?;
            for stage in self.args.start_depth..=self.args.max_depth {
                writer.serialize(VolumeStagePoint {
                    volume: volume_at_stage(&elevations, f64::from(stage), cell_area),
                    stage,
                })?;
                records += 1;
            }
            writer.flush()?;
            outputs.push(output);
        }

        tracing::info!(
            "Saved {} stage-volume tables to {}",
            outputs.len(),
            self.args.output_folder.display()
        );
        Ok(ToolReport { outputs, records })
    }
}
