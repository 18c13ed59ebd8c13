use std::collections::BTreeMap;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::{DiscountArgs, DiscountBatchArgs};
use crate::core::{Tool, ToolReport};
use crate::domain::model::{DiscountedAsset, DiscountedIteration};
use crate::utils::error::{PostError, Result};
use crate::utils::paths;

/// Columns the discount transform multiplies by the per-row factor. G2CRM
/// exports may already carry their own PV columns, so the intermediate file
/// suffixes the recalculated ones with `_Script`.
const DISCOUNT_COLUMNS: [&str; 3] = ["ValueLossStructure", "ValueLossContents", "TotalLoss"];

/// `1 / (1 + r)^(days / 365)`, where `days` may be negative for damages
/// before the base date.
pub fn discount_factor(time: NaiveDateTime, base: NaiveDateTime, rate: f64) -> f64 {
    let days = (time - base).num_days() as f64;
    1.0 / (1.0 + rate).powf(days / 365.0)
}

/// Base dates arrive as `YYYYMMDD` on the command line, but job files tend
/// to use ISO dates; accept both.
pub fn parse_base_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|_| PostError::InvalidConfigValueError {
            field: "base_date".to_string(),
            value: value.to_string(),
            reason: "Expected YYYYMMDD or YYYY-MM-DD".to_string(),
        })
}

/// The Time column format depends on the G2CRM version that wrote the file.
fn parse_time(value: &str) -> Result<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
    ];
    for format in FORMATS {
        if let Ok(time) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(time);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%m/%d/%Y"))
        .map(|date| date.and_hms_opt(0, 0, 0).expect("midnight is valid"))
        .map_err(|_| PostError::ProcessingError {
            message: format!("Unparseable Time value '{}'", value),
        })
}

fn parse_number(value: &str) -> f64 {
    value.trim().replace(',', "").parse().unwrap_or(0.0)
}

fn column_index(headers: &csv::StringRecord, name: &str, file: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| PostError::ProcessingError {
            message: format!("Column '{}' not found in {}", name, file.display()),
        })
}

/// Runs the discount transform for one AssetDamageDetail export.
pub fn discount_file(args: &DiscountArgs) -> Result<ToolReport> {
    let rate = args.discount_rate / 100.0;
    let base = parse_base_date(&args.base_date)?
        .and_hms_opt(0, 0, 0)
        .expect("midnight is valid");

    let mut reader = csv::Reader::from_path(&args.input_file)?;
    let headers = reader.headers()?.clone();

    let time_col = column_index(&headers, "Time", &args.input_file)?;
    let iter_col = column_index(&headers, "Iteration", &args.input_file)?;
    let asset_col = column_index(&headers, "AssetExternalReference", &args.input_file)?;
    let value_cols: Vec<usize> = DISCOUNT_COLUMNS
        .iter()
        .map(|name| column_index(&headers, name, &args.input_file))
        .collect::<Result<_>>()?;

    let output_folder = args
        .output_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    if !output_folder.as_os_str().is_empty() {
        std::fs::create_dir_all(&output_folder)?;
    }

    let mut working_writer = if args.no_working_calcs {
        None
    } else {
        let working_path = output_folder.join(format!(
            "WorkingCalculations_{}.csv",
            paths::strip_meta(&args.input_file)
        ));
        let mut writer = csv::Writer::from_path(&working_path)?;
        let mut working_headers = headers.clone();
        working_headers.push_field("DiscountFactor_Script");
        for name in DISCOUNT_COLUMNS {
            working_headers.push_field(&format!("{}PV_Script", name));
        }
        writer.write_record(&working_headers)?;
        tracing::debug!("Writing working calculations to {}", working_path.display());
        Some((writer, working_path))
    };

    // (asset, iteration) → summed PV damages for structure/contents/total
    let mut pv_sums: BTreeMap<(String, u32), [f64; 3]> = BTreeMap::new();
    let mut max_iteration = 0u32;
    let mut records = 0usize;

    for record in reader.records() {
        let record = record?;
        let time = parse_time(&record[time_col])?;
        let iteration: u32 = record[iter_col]
            .trim()
            .parse()
            .map_err(|_| PostError::ProcessingError {
                message: format!("Unparseable Iteration value '{}'", &record[iter_col]),
            })?;
        let asset = record[asset_col].to_string();
        let factor = discount_factor(time, base, rate);

        let mut pv = [0.0f64; 3];
        for (slot, col) in value_cols.iter().enumerate() {
            pv[slot] = factor * parse_number(&record[*col]);
        }

        if let Some((writer, _)) = working_writer.as_mut() {
            let mut out = record.clone();
            out.push_field(&factor.to_string());
            for value in pv {
                out.push_field(&value.to_string());
            }
            writer.write_record(&out)?;
        }

        let sums = pv_sums.entry((asset, iteration)).or_default();
        for slot in 0..3 {
            sums[slot] += pv[slot];
        }
        max_iteration = max_iteration.max(iteration);
        records += 1;
    }

    if records == 0 {
        return Err(PostError::ProcessingError {
            message: format!("No damage rows in {}", args.input_file.display()),
        });
    }

    let mut outputs = Vec::new();
    if let Some((mut writer, working_path)) = working_writer {
        writer.flush()?;
        outputs.push(working_path);
    }

    let mut writer = csv::Writer::from_path(&args.output_file)?;
    if args.keep_iterations {
        for ((asset, iteration), sums) in &pv_sums {
            writer.serialize(DiscountedIteration {
                asset: asset.clone(),
                iteration: *iteration,
                value_loss_structure_pv: sums[0],
                value_loss_contents_pv: sums[1],
                total_loss_pv: sums[2],
            })?;
        }
    } else {
        // Mean over all iterations, including those without damage rows
        let mut per_asset: BTreeMap<String, [f64; 3]> = BTreeMap::new();
        for ((asset, _), sums) in &pv_sums {
            let totals = per_asset.entry(asset.clone()).or_default();
            for slot in 0..3 {
                totals[slot] += sums[slot];
            }
        }
        let iterations = max_iteration as f64;
        for (asset, totals) in &per_asset {
            writer.serialize(DiscountedAsset {
                asset: asset.clone(),
                value_loss_structure_pv: totals[0] / iterations,
                value_loss_contents_pv: totals[1] / iterations,
                total_loss_pv: totals[2] / iterations,
            })?;
        }
    }
    writer.flush()?;

    tracing::info!("Saved data to {}", args.output_file.display());
    outputs.push(args.output_file.clone());
    Ok(ToolReport { outputs, records })
}

pub struct DiscountTool {
    args: DiscountArgs,
}

impl DiscountTool {
    pub fn new(args: DiscountArgs) -> Self {
        Self { args }
    }
}

impl Tool for DiscountTool {
    fn name(&self) -> &'static str {
        "discount"
    }

    fn run(&self) -> Result<ToolReport> {
        discount_file(&self.args)
    }
}

/// Discounts every AssetDamageDetail export under a folder, writing one
/// `DiscountedDamages_` csv per input.
pub struct DiscountBatchTool {
    args: DiscountBatchArgs,
}

impl DiscountBatchTool {
    pub fn new(args: DiscountBatchArgs) -> Self {
        Self { args }
    }

    fn output_name(input: &Path) -> String {
        let mut stem = paths::strip_meta(input);
        if let Some(prefix) = paths::derive_prefix(input) {
            stem = stem.replacen(&format!("{}_", prefix), "", 1);
        }
        format!("DiscountedDamages_{}.csv", stem)
    }
}

impl Tool for DiscountBatchTool {
    fn name(&self) -> &'static str {
        "discount-batch"
    }

    fn run(&self) -> Result<ToolReport> {
        let files = paths::paths_by_type(
            &self.args.input_folder,
            "csv",
            &["AssetDamageDetail".to_string()],
        )?;
        if files.is_empty() {
            return Err(PostError::ProcessingError {
                message: format!(
                    "No AssetDamageDetail csv files under {}",
                    self.args.input_folder.display()
                ),
            });
        }
        std::fs::create_dir_all(&self.args.output_folder)?;

        let mut report = ToolReport::default();
        for (i, file) in files.iter().enumerate() {
            tracing::info!(
                "{:02}/{} - Discounting {}",
                i + 1,
                files.len(),
                paths::file_name(file)
            );
            let file_args = DiscountArgs {
                input_file: file.clone(),
                output_file: self.args.output_folder.join(Self::output_name(file)),
                discount_rate: self.args.discount_rate,
                base_date: self.args.base_date.clone(),
                keep_iterations: self.args.keep_iterations,
                no_working_calcs: self.args.no_working_calcs,
            };
            let file_report = discount_file(&file_args)?;
            report.outputs.extend(file_report.outputs);
            report.records += file_report.records;
        }
        Ok(report)
    }
}
