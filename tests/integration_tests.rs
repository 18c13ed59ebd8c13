use anyhow::Result;
use g2post::config::{AggregateArgs, Command, CumulativeDamageArgs};
use g2post::run_command;
use tempfile::TempDir;

/// 聚合後直接串接累積損害計算
#[test]
fn test_aggregate_then_cumulative_damage() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let runs = temp_dir.path().join("runs");
    std::fs::create_dir_all(&runs)?;
    std::fs::write(
        runs.join("AssetDamageDetail_High_MA01_FWOP.csv"),
        "Iteration,MaxStormStage,TotalLossPV\n1,2.0,100\n1,3.2,50\n",
    )?;
    std::fs::write(
        runs.join("AssetDamageDetail_High_MA02_FWOP.csv"),
        "Iteration,MaxStormStage,TotalLossPV\n2,2.5,80\n",
    )?;

    let combined = temp_dir.path().join("combined.csv");
    let report = run_command(Command::Aggregate(AggregateArgs {
        input_folder: runs,
        output_file: combined.clone(),
        contains: vec!["AssetDamageDetail".to_string(), "FWOP".to_string()],
    }))?;
    assert_eq!(report.records, 3);

    let content = std::fs::read_to_string(&combined)?;
    let header = content.lines().next().unwrap();
    assert_eq!(
        header,
        "Iteration,MaxStormStage,TotalLossPV,ModelArea,SLC,Alternative"
    );
    assert!(content.contains("1,2.0,100,MA01,High,FWOP"));
    assert!(content.contains("2,2.5,80,MA02,High,FWOP"));

    let damages = temp_dir.path().join("damages_by_stage.csv");
    run_command(Command::CumulativeDamage(CumulativeDamageArgs {
        input_file: combined,
        output_file: damages.clone(),
        steps: None,
        integer: true,
    }))?;

    let content = std::fs::read_to_string(&damages)?;
    let rows: Vec<&str> = content.lines().collect();
    assert_eq!(rows[0], "MaxStormStage,CumulativeTotalLossPV");
    // round(2.0)-1 = 1 up to (exclusive) ceil(3.2)+1 = 5, whole stages
    assert_eq!(rows.len(), 5);
    // Stage 4 covers everything: (150 + 80) / 2 iterations
    assert_eq!(rows[4], "4.0,115.0");
    Ok(())
}
