use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

use crate::config::SummarizeArgs;
use crate::core::prn::{PrnParseError, PrnReport};
use crate::core::{Tool, ToolReport};
use crate::domain::model::RunSummary;
use crate::utils::error::{PostError, Result};
use crate::utils::paths;

/// Sentinels written into summary cells instead of propagating failures;
/// the downstream spreadsheets expect these literals.
const SCRIPT_ERROR: &str = "Script Error";
const UNFINISHED_RUN: &str = "Unfinished Run";
const ELEVATION_ERROR: &str = "Error reading from AssetRaising csv file";
const REMOVAL_ERROR: &str = "Error reading from RemovedAssets csv file";
const MAPOUTPUTS_ERROR: &str = "Error reading from MapOutputs sqlite file";
const MAPOUTPUTS_TOO_LARGE: &str = "MapOutputs sqlite file is too large";

/// Reading statistics out of an arbitrarily large MapOutputs database is
/// not worth the wait; 50 MB is the cutoff.
const MAPOUTPUTS_SIZE_THRESHOLD: u64 = 50 * 1_000_000;

/// Flooded structures: PV damage above 5% of structure+contents value, and
/// no dash in the reference (debris and automobile assets carry dashes).
const DAMAGED_STRUCTURES_SQL: &str = "\
    SELECT COUNT(AssetID) FROM
    (
        SELECT
            AssetID,
            AssetExternalReference,
            (MeanValue / Value) AS DamageRatio
        FROM
        (
            SELECT
                AssetID,
                (StructureValue + ContentsValue) AS Value,
                MeanValue,
                AssetExternalReference
            FROM AssetsAllStatistics
            WHERE StatisticsTypeName = 'PVDamage'
        )
        WHERE
            DamageRatio > 0.05 AND
            AssetExternalReference NOT LIKE '%-%'
    )";

fn csv_row_count(path: &Path) -> Result<usize> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut count = 0usize;
    for record in reader.records() {
        record?;
        count += 1;
    }
    Ok(count)
}

/// Mean number of raised assets per iteration, from the AssetRaising csv.
fn expected_elevations(run_folder: &Path, iterations: Option<u32>) -> String {
    expected_rate(run_folder, "AssetRaising", iterations, ELEVATION_ERROR)
}

/// Mean number of removed assets per iteration, from the RemovedAssets csv.
fn expected_removals(run_folder: &Path, iterations: Option<u32>) -> String {
    expected_rate(run_folder, "RemovedAssets", iterations, REMOVAL_ERROR)
}

fn expected_rate(
    run_folder: &Path,
    file_kind: &str,
    iterations: Option<u32>,
    sentinel: &str,
) -> String {
    let result = (|| -> Result<f64> {
        let iterations = iterations.ok_or_else(|| PostError::ProcessingError {
            message: "Iteration count unavailable".to_string(),
        })?;
        let files = paths::paths_by_type(run_folder, "csv", &[file_kind.to_string()])?;
        let file = files.first().ok_or_else(|| PostError::ProcessingError {
            message: format!("No {} csv in {}", file_kind, run_folder.display()),
        })?;
        Ok(csv_row_count(file)? as f64 / f64::from(iterations))
    })();
    match result {
        Ok(rate) => rate.to_string(),
        Err(e) => {
            tracing::debug!("{}: {}", sentinel, e);
            sentinel.to_string()
        }
    }
}

fn damaged_structures(run_folder: &Path) -> String {
    let result = (|| -> Result<Option<i64>> {
        let files = paths::paths_by_type(run_folder, "sqlite", &["MapOutputs".to_string()])?;
        let file = files.first().ok_or_else(|| PostError::ProcessingError {
            message: format!("No MapOutputs sqlite in {}", run_folder.display()),
        })?;

        if std::fs::metadata(file)?.len() > MAPOUTPUTS_SIZE_THRESHOLD {
            return Ok(None);
        }

        let conn = Connection::open_with_flags(file, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let count: i64 = conn.query_row(DAMAGED_STRUCTURES_SQL, [], |row| row.get(0))?;
        Ok(Some(count))
    })();
    match result {
        Ok(Some(count)) => count.to_string(),
        Ok(None) => MAPOUTPUTS_TOO_LARGE.to_string(),
        Err(e) => {
            tracing::debug!("{}: {}", MAPOUTPUTS_ERROR, e);
            MAPOUTPUTS_ERROR.to_string()
        }
    }
}

enum PrnOutcome {
    Parsed(Box<PrnReport>),
    Unfinished,
    Failed,
}

fn summarize_run(prn_path: &Path) -> RunSummary {
    let run_folder = prn_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let outcome = match std::fs::read_to_string(prn_path) {
        Ok(text) => match PrnReport::parse(&text) {
            Ok(report) => PrnOutcome::Parsed(Box::new(report)),
            Err(PrnParseError::Unfinished) => PrnOutcome::Unfinished,
            Err(e) => {
                tracing::warn!("Error encountered while parsing {}: {}", prn_path.display(), e);
                PrnOutcome::Failed
            }
        },
        Err(e) => {
            tracing::warn!("Error encountered while reading {}: {}", prn_path.display(), e);
            PrnOutcome::Failed
        }
    };

    let (report, sentinel) = match &outcome {
        PrnOutcome::Parsed(report) => (Some(report.as_ref()), ""),
        PrnOutcome::Unfinished => (None, UNFINISHED_RUN),
        PrnOutcome::Failed => (None, SCRIPT_ERROR),
    };
    let cell = |extract: &dyn Fn(&PrnReport) -> String| -> String {
        match report {
            Some(report) => extract(report),
            None => sentinel.to_string(),
        }
    };

    let run_time = cell(&|r| r.run_time_secs.to_string());
    let run_time_hrs = run_time
        .parse::<f64>()
        .map(|secs| (secs / 3600.0).to_string())
        .unwrap_or_else(|_| run_time.clone());

    // Companion files are still examined when the report is unfinished;
    // a failed parse poisons the whole row instead.
    let (assets_elevated, assets_removed, damaged) = match &outcome {
        PrnOutcome::Failed => (
            SCRIPT_ERROR.to_string(),
            SCRIPT_ERROR.to_string(),
            SCRIPT_ERROR.to_string(),
        ),
        _ => {
            let iterations = report.map(|r| r.iterations);
            (
                expected_elevations(&run_folder, iterations),
                expected_removals(&run_folder, iterations),
                damaged_structures(&run_folder),
            )
        }
    };

    RunSummary {
        file_name: paths::file_name(prn_path),
        file_path: prn_path.display().to_string(),
        folder_path: run_folder.display().to_string(),
        ma: paths::derive_ma_code(prn_path).unwrap_or_else(|| "NoData".to_string()),
        simulation_name: cell(&|r| r.simulation_name.clone()),
        g2_version: cell(&|r| r.g2_version.clone()),
        g2_start_time: cell(&|r| r.g2_start_time.clone()),
        run_time,
        run_time_hrs,
        slc: cell(&|r| r.slc.clone()),
        plan_alt: cell(&|r| r.plan_alt.clone()),
        iters: cell(&|r| r.iterations.to_string()),
        g2_assets: cell(&|r| r.asset_count.to_string()),
        number_of_storms: cell(&|r| r.storm_count.to_string()),
        total_life_loss: cell(&|r| r.total_life_loss.mean.to_string()),
        total_life_loss_std: cell(&|r| r.total_life_loss.std.to_string()),
        upland_pvdamage: cell(&|r| r.upland_pv_damage.mean.to_string()),
        upland_pvdamage_std: cell(&|r| r.upland_pv_damage.std.to_string()),
        assets_elevated,
        assets_removed,
        damaged_structures: damaged,
        run_condition: cell(&|r| r.run_condition.clone()),
        seed: cell(&|r| r.seed.to_string()),
        interest_rate: cell(&|r| r.interest_rate.to_string()),
        duration: cell(&|r| r.duration.to_string()),
        basis_time: cell(&|r| r.basis_time.clone()),
        start_time: cell(&|r| r.start_time.clone()),
        slc_basis_year: cell(&|r| r.slc_basis_year.to_string()),
        cum_damage_removal: cell(&|r| r.cum_damage_removal.to_string()),
        depreciation: cell(&|r| r.depreciation.to_string()),
        asset_raising: cell(&|r| r.asset_raising.to_string()),
        calculate_life_loss: cell(&|r| r.calculate_life_loss.to_string()),
    }
}

/// Summarizes every finished run found below the input folder. A folder
/// counts as a run when it holds a `.prn` report file.
pub struct SummarizeTool {
    args: SummarizeArgs,
}

impl SummarizeTool {
    pub fn new(args: SummarizeArgs) -> Self {
        Self { args }
    }
}

impl Tool for SummarizeTool {
    fn name(&self) -> &'static str {
        "summarize"
    }

    fn run(&self) -> Result<ToolReport> {
        tracing::info!(
            "Retrieving .prn file list containing {:?} from {}",
            self.args.contains,
            self.args.input_folder.display()
        );
        let files = paths::paths_by_type(&self.args.input_folder, "prn", &self.args.contains)?;
        if files.is_empty() {
            return Err(PostError::ProcessingError {
                message: format!(
                    "No .prn report files under {}",
                    self.args.input_folder.display()
                ),
            });
        }
        tracing::info!("File list generated. Parsing data...");

        let mut summaries: Vec<RunSummary> = Vec::with_capacity(files.len());
        for (i, file) in files.iter().enumerate() {
            tracing::info!("{}/{} - Reading from {}", i + 1, files.len(), file.display());
            summaries.push(summarize_run(file));
        }

        if let Some(parent) = self.args.output_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut writer = csv::Writer::from_path(&self.args.output_file)?;
        for summary in &summaries {
            writer.serialize(summary)?;
        }
        writer.flush()?;

        let mut outputs = vec![self.args.output_file.clone()];
        if self.args.json {
            let json_path: PathBuf = self.args.output_file.with_extension("json");
            let file = std::fs::File::create(&json_path)?;
            serde_json::to_writer_pretty(file, &summaries)?;
            outputs.push(json_path);
        }

        tracing::info!("Saved run summary to {}", self.args.output_file.display());
        Ok(ToolReport {
            outputs,
            records: summaries.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::prn::SAMPLE_PRN;

    fn write_run_folder(root: &Path) -> PathBuf {
        let run = root.join("Intermediate_MA01_FWOP");
        std::fs::create_dir_all(&run).unwrap();
        std::fs::write(run.join("FoxPoint_Int_MA01_FWOP.prn"), SAMPLE_PRN).unwrap();
        // 50 raised assets over 100 iterations
        let mut raising = String::from("AssetID,Time\n");
        for i in 0..50 {
            raising.push_str(&format!("{},2040-01-01\n", i));
        }
        std::fs::write(run.join("AssetRaising_Int_MA01.csv"), raising).unwrap();
        run
    }

    fn write_mapoutputs(run: &Path) {
        let conn = Connection::open(run.join("MapOutputs_Int_MA01.sqlite")).unwrap();
        conn.execute_batch(
            "CREATE TABLE AssetsAllStatistics (
                AssetID INTEGER,
                AssetExternalReference TEXT,
                StatisticsTypeName TEXT,
                StructureValue REAL,
                ContentsValue REAL,
                MeanValue REAL
            );
            INSERT INTO AssetsAllStatistics VALUES
                (1, 'S001', 'PVDamage', 100.0, 100.0, 50.0),   -- 25% damaged
                (2, 'S002', 'PVDamage', 100.0, 100.0, 1.0),    -- below threshold
                (3, 'S-03', 'PVDamage', 100.0, 100.0, 50.0),   -- dash: excluded
                (4, 'S004', 'AAEQDamage', 100.0, 100.0, 50.0); -- wrong statistic
            ",
        )
        .unwrap();
    }

    #[test]
    fn test_summarize_run_with_companions() {
        let dir = tempfile::tempdir().unwrap();
        let run = write_run_folder(dir.path());
        write_mapoutputs(&run);

        let summary = summarize_run(&run.join("FoxPoint_Int_MA01_FWOP.prn"));
        assert_eq!(summary.simulation_name, "FoxPoint_Int_MA01_FWOP");
        assert_eq!(summary.iters, "100");
        assert_eq!(summary.assets_elevated, "0.5");
        assert_eq!(summary.assets_removed, REMOVAL_ERROR);
        assert_eq!(summary.damaged_structures, "1");
        assert_eq!(summary.run_time_hrs, (3600.5 / 3600.0).to_string());
        assert_eq!(summary.ma, "MA01");
    }

    #[test]
    fn test_summarize_unfinished_run_keeps_companions() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("run");
        std::fs::create_dir_all(&run).unwrap();
        std::fs::write(run.join("report.prn"), "G2CRM Run on x\n\n").unwrap();

        let summary = summarize_run(&run.join("report.prn"));
        assert_eq!(summary.simulation_name, UNFINISHED_RUN);
        assert_eq!(summary.run_time_hrs, UNFINISHED_RUN);
        // No iteration count, so the per-iteration companions degrade too
        assert_eq!(summary.assets_elevated, ELEVATION_ERROR);
        assert_eq!(summary.damaged_structures, MAPOUTPUTS_ERROR);
    }

    #[test]
    fn test_summarize_tool_writes_csv_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let run = write_run_folder(dir.path());
        write_mapoutputs(&run);
        let output = dir.path().join("out").join("summary.csv");

        let tool = SummarizeTool::new(SummarizeArgs {
            input_folder: dir.path().to_path_buf(),
            output_file: output.clone(),
            contains: vec![],
            json: true,
        });
        let report = tool.run().unwrap();
        assert_eq!(report.records, 1);
        assert_eq!(report.outputs.len(), 2);

        let content = std::fs::read_to_string(&output).unwrap();
        let header = content.lines().next().unwrap();
        assert!(header.starts_with("file_name,file_path,folder_path,MA,simulation_name"));

        let json: Vec<RunSummary> =
            serde_json::from_str(&std::fs::read_to_string(&report.outputs[1]).unwrap()).unwrap();
        assert_eq!(json[0].g2_version, "0.4.564.3");
    }

    #[test]
    fn test_corrupt_mapoutputs_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("run");
        std::fs::create_dir_all(&run).unwrap();
        std::fs::write(run.join("MapOutputs_bad.sqlite"), vec![0u8; 1024]).unwrap();
        assert_eq!(damaged_structures(&run), MAPOUTPUTS_ERROR);
    }
}
