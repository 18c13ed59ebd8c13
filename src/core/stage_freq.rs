use crate::config::StageFrequencyArgs;
use crate::core::{Tool, ToolReport};
use crate::domain::model::{IterationCurvePoint, StageFrequencyRow, StormEvent};
use crate::utils::error::{PostError, Result};

/// Linear-interpolated percentile over unsorted values, numpy-style.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("no NaN stages"));
    if sorted.is_empty() {
        return f64::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let weight = rank - lo as f64;
    sorted[lo] + weight * (sorted[hi] - sorted[lo])
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("no NaN stages"));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Column specs are header names, with a plain integer accepted as a
/// 0-based index for headerless exports.
fn resolve_column(headers: &csv::StringRecord, spec: &str, field: &str) -> Result<usize> {
    if let Some(index) = headers.iter().position(|h| h == spec) {
        return Ok(index);
    }
    if let Ok(index) = spec.parse::<usize>() {
        if index < headers.len() {
            return Ok(index);
        }
    }
    Err(PostError::InvalidConfigValueError {
        field: field.to_string(),
        value: spec.to_string(),
        reason: format!("No such column; headers are {:?}", headers),
    })
}

/// Empirical stage-frequency curves: per iteration, rank the annual maxima
/// of surge+tide and surge descending; the recurrence interval of rank k is
/// `(years + 1) / k`. Mean and median stages across iterations give the
/// final curves. Years without a storm use the configured tide percentile
/// for surge+tide and zero surge.
pub struct StageFrequencyTool {
    args: StageFrequencyArgs,
}

impl StageFrequencyTool {
    pub fn new(args: StageFrequencyArgs) -> Self {
        Self { args }
    }

    fn read_events(&self) -> Result<Vec<StormEvent>> {
        let mut reader = csv::Reader::from_path(&self.args.input_file)?;
        let headers = reader.headers()?.clone();
        let iter_col = resolve_column(&headers, &self.args.iteration_column, "iteration_column")?;
        let day_col = resolve_column(&headers, &self.args.day_column, "day_column")?;
        let surge_col = resolve_column(&headers, &self.args.surge_column, "surge_column")?;
        let tide_col = resolve_column(&headers, &self.args.tide_column, "tide_column")?;

        let mut events = Vec::new();
        for record in reader.records() {
            let record = record?;
            let iteration: Option<u32> = record[iter_col].trim().parse().ok();
            let day: Option<f64> = record[day_col].trim().parse().ok();
            let surge: Option<f64> = record[surge_col].trim().parse().ok();
            let tide: Option<f64> = record[tide_col].trim().parse().ok();
            match (iteration, day, surge, tide) {
                (Some(iteration), Some(day), Some(surge), Some(tide)) => {
                    events.push(StormEvent {
                        iteration,
                        // Simulated days bucket into years, rounding up
                        year: (day / 365.0).ceil() as u32,
                        surge,
                        tide,
                    });
                }
                _ => tracing::warn!("Skipping storm row with unparseable values"),
            }
        }
        Ok(events)
    }
}

impl Tool for StageFrequencyTool {
    fn name(&self) -> &'static str {
        "stage-frequency"
    }

    fn run(&self) -> Result<ToolReport> {
        let events = self.read_events()?;
        if events.is_empty() {
            return Err(PostError::ProcessingError {
                message: format!("No storm events in {}", self.args.input_file.display()),
            });
        }

        let num_iterations = events.iter().map(|e| e.iteration).max().unwrap_or(0);
        let n_ranks = events.iter().map(|e| e.year).max().unwrap_or(0) as usize;
        if num_iterations == 0 || n_ranks == 0 {
            return Err(PostError::ProcessingError {
                message: "Storm data covers no iterations or years".to_string(),
            });
        }

        let all_tides: Vec<f64> = events.iter().map(|e| e.tide).collect();
        let tide_fill = percentile(&all_tides, self.args.tide_percentile);
        tracing::debug!(
            "{} iterations over {} years; storm-free years use stage {}",
            num_iterations,
            n_ranks,
            tide_fill
        );

        // rank → stages across iterations
        let mut surge_tide_ranks: Vec<Vec<f64>> = vec![Vec::new(); n_ranks];
        let mut surge_ranks: Vec<Vec<f64>> = vec![Vec::new(); n_ranks];
        let mut per_iteration_rows: Vec<IterationCurvePoint> = Vec::new();

        for iteration in 1..=num_iterations {
            let mut surge_tide_by_year = vec![f64::NAN; n_ranks];
            let mut surge_by_year = vec![f64::NAN; n_ranks];
            for year in 1..=n_ranks {
                let in_year = events
                    .iter()
                    .filter(|e| e.iteration == iteration && e.year == year as u32);
                let mut max_surge_tide = f64::NEG_INFINITY;
                let mut max_surge = f64::NEG_INFINITY;
                let mut any = false;
                for event in in_year {
                    max_surge_tide = max_surge_tide.max(event.surge_tide());
                    max_surge = max_surge.max(event.surge);
                    any = true;
                }
                if any {
                    surge_tide_by_year[year - 1] = max_surge_tide;
                    surge_by_year[year - 1] = max_surge;
                } else {
                    surge_tide_by_year[year - 1] = tide_fill;
                    surge_by_year[year - 1] = 0.0;
                }
            }

            surge_tide_by_year.sort_by(|a, b| b.partial_cmp(a).expect("no NaN stages"));
            surge_by_year.sort_by(|a, b| b.partial_cmp(a).expect("no NaN stages"));

            for rank in 1..=n_ranks {
                surge_tide_ranks[rank - 1].push(surge_tide_by_year[rank - 1]);
                surge_ranks[rank - 1].push(surge_by_year[rank - 1]);
                if self.args.per_iteration_output.is_some() {
                    per_iteration_rows.push(IterationCurvePoint {
                        iteration,
                        rank: rank as u32,
                        recurrence_interval: n_ranks as f64 / rank as f64,
                        surge_tide: surge_tide_by_year[rank - 1],
                        surge: surge_by_year[rank - 1],
                    });
                }
            }
        }

        let mut writer = csv::Writer::from_path(&self.args.output_file)?;
        for rank in 1..=n_ranks {
            let mean_surge_tide = mean(&surge_tide_ranks[rank - 1]);
            let median_surge_tide = median(&surge_tide_ranks[rank - 1]);
            let mean_surge = mean(&surge_ranks[rank - 1]);
            let median_surge = median(&surge_ranks[rank - 1]);
            writer.serialize(StageFrequencyRow {
                recurrence_interval: n_ranks as f64 / rank as f64,
                mean_surge_tide,
                median_surge_tide,
                mean_surge,
                median_surge,
                mean_tide: mean_surge_tide - mean_surge,
                median_tide: median_surge_tide - median_surge,
            })?;
        }
        writer.flush()?;

        let mut outputs = vec![self.args.output_file.clone()];
        if let Some(per_iteration_path) = &self.args.per_iteration_output {
            let mut writer = csv::Writer::from_path(per_iteration_path)?;
            for row in &per_iteration_rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
            outputs.push(per_iteration_path.clone());
        }

        tracing::info!(
            "Saved stage-frequency curves to {}",
            self.args.output_file.display()
        );
        Ok(ToolReport {
            outputs,
            records: events.len(),
        })
    }
}
