use anyhow::Result;
use g2post::config::{Command, SummarizeArgs};
use g2post::run_command;
use rusqlite::Connection;
use std::path::Path;
use tempfile::TempDir;

const FINISHED_PRN: &str = "\
G2CRM Run on 06/07/2021 10:02:11 Model Version: 0.4.564.3
Simulation Name: FoxPoint_Int_MA01_FWOP

Run Parameters:
Number of Iterations: 100
Seed: 12345
Sea Level Change: Intermediate
RunConditions: FWOP
Interest Rate: 2.75
Duration: 50
Basis Time: 01JAN2030 00:00
Start Time: 01JAN2030 00:00
GlobalSLCBasisYear: 1992
Do Cumulative Damage Removal: True
Do Depreciation: False
Do Asset Raising: True
Calculate Life Loss: True
Plan Alternative: Without Project

Assets:
  Count: 250

Number of Distinct Storms: 22

Statistics:

  Total Life Loss  0.120  0.100  0.000  0.050
  Upland PV Damage  1,234,567.89  1,200,000.00  0.00  23,456.78

Computation Time: 3,600.5 sec

";

fn write_finished_run(root: &Path) -> Result<()> {
    let run = root.join("Intermediate_MA01_FWOP");
    std::fs::create_dir_all(&run)?;
    std::fs::write(run.join("FoxPoint_Int_MA01_FWOP.prn"), FINISHED_PRN)?;

    let mut raising = String::from("AssetID,Time\n");
    for i in 0..50 {
        raising.push_str(&format!("{},2040-01-01\n", i));
    }
    std::fs::write(run.join("AssetRaising_Int_MA01.csv"), raising)?;
    std::fs::write(run.join("RemovedAssets_Int_MA01.csv"), "AssetID\n7\n8\n")?;

    let conn = Connection::open(run.join("MapOutputs_Int_MA01.sqlite"))?;
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
            (1, 'S001', 'PVDamage', 100.0, 100.0, 50.0),
            (2, 'S002', 'PVDamage', 100.0, 100.0, 1.0),
            (3, 'S-03', 'PVDamage', 100.0, 100.0, 50.0);
        ",
    )?;
    Ok(())
}

fn write_unfinished_run(root: &Path) -> Result<()> {
    let run = root.join("Intermediate_MA02_FWOP");
    std::fs::create_dir_all(&run)?;
    std::fs::write(
        run.join("FoxPoint_Int_MA02_FWOP.prn"),
        "G2CRM Run on 06/08/2021 09:00:00 Model Version: 0.4.564.3\n\
         Simulation Name: FoxPoint_Int_MA02_FWOP\n\n",
    )?;
    Ok(())
}

/// One summary row per run folder, finished or not, with sentinel cells
/// where a companion file is missing or the report was cut short.
#[test]
fn test_summary_covers_finished_and_unfinished_runs() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_finished_run(temp_dir.path())?;
    write_unfinished_run(temp_dir.path())?;

    let output = temp_dir.path().join("summary.csv");
    let report = run_command(Command::Summarize(SummarizeArgs {
        input_folder: temp_dir.path().to_path_buf(),
        output_file: output.clone(),
        contains: vec![],
        json: false,
    }))?;
    assert_eq!(report.records, 2);

    let mut reader = csv::Reader::from_path(&output)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().collect::<std::result::Result<_, _>>()?;
    assert_eq!(rows.len(), 2);

    let finished = &rows[0];
    assert_eq!(&finished[column("MA")], "MA01");
    assert_eq!(&finished[column("simulation_name")], "FoxPoint_Int_MA01_FWOP");
    assert_eq!(&finished[column("iters")], "100");
    assert_eq!(&finished[column("g2_assets")], "250");
    assert_eq!(&finished[column("upland_pvdamage")], "1234567.89");
    assert_eq!(&finished[column("assets_elevated")], "0.5");
    assert_eq!(&finished[column("assets_removed")], "0.02");
    assert_eq!(&finished[column("damaged_structures")], "1");
    assert_eq!(&finished[column("run_time")], "3600.5");

    let unfinished = &rows[1];
    assert_eq!(&unfinished[column("MA")], "MA02");
    assert_eq!(&unfinished[column("simulation_name")], "Unfinished Run");
    assert_eq!(&unfinished[column("run_time_hrs")], "Unfinished Run");
    assert_eq!(
        &unfinished[column("assets_elevated")],
        "Error reading from AssetRaising csv file"
    );
    assert_eq!(
        &unfinished[column("damaged_structures")],
        "Error reading from MapOutputs sqlite file"
    );
    Ok(())
}
