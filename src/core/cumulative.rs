use std::collections::BTreeMap;

use crate::config::CumulativeDamageArgs;
use crate::core::{Tool, ToolReport};
use crate::domain::model::StormStageDamage;
use crate::utils::error::{PostError, Result};

/// Stage thresholds run from `round(min) - 1` up to (exclusive)
/// `ceil(max) + 1`.
fn threshold_grid(min_stage: f64, max_stage: f64, steps: Option<usize>, integer: bool) -> Vec<f64> {
    let start = min_stage.round() - 1.0;
    let stop = max_stage.ceil() + 1.0;

    if let Some(steps) = steps {
        // Evenly spaced, endpoints inclusive
        let span = stop - start;
        return (0..steps)
            .map(|i| start + span * i as f64 / (steps - 1) as f64)
            .collect();
    }

    let step = if integer { 1.0 } else { 0.5 };
    let mut grid = Vec::new();
    let mut k = 0u32;
    loop {
        let value = start + f64::from(k) * step;
        if value >= stop {
            break;
        }
        grid.push(value);
        k += 1;
    }
    grid
}

/// Mean (across iterations) of the total PV damages from storms whose
/// maximum stage stayed at or below each threshold.
pub struct CumulativeDamageTool {
    args: CumulativeDamageArgs,
}

impl CumulativeDamageTool {
    pub fn new(args: CumulativeDamageArgs) -> Self {
        Self { args }
    }
}

impl Tool for CumulativeDamageTool {
    fn name(&self) -> &'static str {
        "cumulative-damage"
    }

    fn run(&self) -> Result<ToolReport> {
        tracing::info!(
            "Calculating damages using data from {}",
            self.args.input_file.display()
        );

        let mut reader = csv::Reader::from_path(&self.args.input_file)?;
        let headers = reader.headers()?.clone();
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| PostError::ProcessingError {
                    message: format!(
                        "Column '{}' not found in {}",
                        name,
                        self.args.input_file.display()
                    ),
                })
        };
        let iter_col = find("Iteration")?;
        let stage_col = find("MaxStormStage")?;
        let loss_col = find("TotalLossPV")?;

        // iteration → (max storm stage, loss) pairs
        let mut by_iteration: BTreeMap<u32, Vec<(f64, f64)>> = BTreeMap::new();
        let mut min_stage = f64::INFINITY;
        let mut max_stage = f64::NEG_INFINITY;
        let mut max_iteration = 0u32;
        let mut records = 0usize;

        for record in reader.records() {
            let record = record?;
            let iteration: u32 =
                record[iter_col]
                    .trim()
                    .parse()
                    .map_err(|_| PostError::ProcessingError {
                        message: format!("Unparseable Iteration value '{}'", &record[iter_col]),
                    })?;
            let stage: f64 = record[stage_col].trim().parse().unwrap_or(f64::NAN);
            let loss: f64 = record[loss_col].trim().replace(',', "").parse().unwrap_or(0.0);
            if stage.is_nan() {
                tracing::warn!("Skipping row with unparseable MaxStormStage");
                continue;
            }
            min_stage = min_stage.min(stage);
            max_stage = max_stage.max(stage);
            max_iteration = max_iteration.max(iteration);
            by_iteration.entry(iteration).or_default().push((stage, loss));
            records += 1;
        }

        if records == 0 {
            return Err(PostError::ProcessingError {
                message: format!("No damage rows in {}", self.args.input_file.display()),
            });
        }

        let grid = threshold_grid(min_stage, max_stage, self.args.steps, self.args.integer);
        let mut writer = csv::Writer::from_path(&self.args.output_file)?;

        for (j, threshold) in grid.iter().enumerate() {
            tracing::info!(
                "{:02}/{} - Calculating damages for MaxStormStage = {}",
                j + 1,
                grid.len(),
                threshold
            );
            // Iterations without qualifying storms still count toward the mean
            let total: f64 = (1..=max_iteration)
                .map(|iteration| {
                    by_iteration
                        .get(&iteration)
                        .map(|rows| {
                            rows.iter()
                                .filter(|(stage, _)| *stage <= *threshold)
                                .map(|(_, loss)| *loss)
                                .sum::<f64>()
                        })
                        .unwrap_or(0.0)
                })
                .sum();
            writer.serialize(StormStageDamage {
                max_storm_stage: *threshold,
                cumulative_total_loss_pv: total / f64::from(max_iteration),
            })?;
        }
        writer.flush()?;

        tracing::info!("Saving outputs to {}", self.args.output_file.display());
        Ok(ToolReport::single(self.args.output_file.clone(), records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_grid_default_half_steps() {
        let grid = threshold_grid(2.0, 3.2, None, false);
        // round(2.0)-1 = 1, ceil(3.2)+1 = 5, exclusive
        assert_eq!(grid, vec![1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5]);
    }

    #[test]
    fn test_threshold_grid_integer_steps() {
        let grid = threshold_grid(2.0, 3.2, None, true);
        assert_eq!(grid, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_threshold_grid_linspace() {
        let grid = threshold_grid(2.0, 3.2, Some(5), false);
        assert_eq!(grid, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_cumulative_damage_means_over_all_iterations() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("damages.csv");
        std::fs::write(
            &input,
            "Iteration,MaxStormStage,TotalLossPV\n\
             1,2.0,100\n\
             1,3.2,50\n\
             2,2.5,80\n",
        )
        .unwrap();
        let output = dir.path().join("out.csv");

        let tool = CumulativeDamageTool::new(CumulativeDamageArgs {
            input_file: input,
            output_file: output.clone(),
            steps: None,
            integer: true,
        });
        tool.run().unwrap();

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let rows: Vec<(f64, f64)> = reader
            .records()
            .map(|r| {
                let r = r.unwrap();
                (r[0].parse().unwrap(), r[1].parse().unwrap())
            })
            .collect();
        assert_eq!(
            rows,
            vec![(1.0, 0.0), (2.0, 50.0), (3.0, 90.0), (4.0, 115.0)]
        );
    }
}
