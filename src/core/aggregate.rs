use crate::config::AggregateArgs;
use crate::core::{Tool, ToolReport};
use crate::utils::error::{PostError, Result};
use crate::utils::paths;

/// Vertically concatenates same-format csv exports, tagging every row with
/// the model area, SLC curve, and alternative derived from its file name.
pub struct AggregateTool {
    args: AggregateArgs,
}

impl AggregateTool {
    pub fn new(args: AggregateArgs) -> Self {
        Self { args }
    }
}

impl Tool for AggregateTool {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    fn run(&self) -> Result<ToolReport> {
        let files = paths::paths_by_type(&self.args.input_folder, "csv", &self.args.contains)?;
        if files.is_empty() {
            return Err(PostError::ProcessingError {
                message: format!(
                    "No csv files containing {:?} under {}",
                    self.args.contains,
                    self.args.input_folder.display()
                ),
            });
        }

        if let Some(parent) = self.args.output_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        // Ragged layouts still get appended, so the writer cannot be strict
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&self.args.output_file)?;

        let mut expected_headers: Option<csv::StringRecord> = None;
        let mut records = 0usize;

        for (i, file) in files.iter().enumerate() {
            tracing::info!(
                "{:02}/{} - Loading {}",
                i + 1,
                files.len(),
                paths::file_name(file)
            );

            let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(file)?;
            let headers = reader.headers()?.clone();

            match &expected_headers {
                None => {
                    let mut out = headers.clone();
                    out.push_field("ModelArea");
                    out.push_field("SLC");
                    out.push_field("Alternative");
                    writer.write_record(&out)?;
                    expected_headers = Some(headers);
                }
                Some(expected) if *expected != headers => {
                    tracing::warn!(
                        "Column layout of {} differs from the first file; appending anyway",
                        paths::file_name(file)
                    );
                }
                Some(_) => {}
            }

            let ma = derived_or_nodata(paths::derive_ma_code(file));
            let slc = paths::derive_slc(file)
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| "NoData".to_string());
            let alt = derived_or_nodata(paths::derive_alt(file));

            for record in reader.records() {
                let mut out = record?;
                out.push_field(&ma);
                out.push_field(&slc);
                out.push_field(&alt);
                writer.write_record(&out)?;
                records += 1;
            }
        }

        writer.flush()?;
        tracing::info!(
            "Saved aggregated data to {}",
            self.args.output_file.display()
        );
        Ok(ToolReport::single(self.args.output_file.clone(), records))
    }
}

fn derived_or_nodata(value: Option<String>) -> String {
    value.unwrap_or_else(|| "NoData".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AggregateArgs;

    #[test]
    fn test_aggregate_appends_filename_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("IterationYear_High_MA01a_FWOP.csv"),
            "Iteration,Value\n1,10\n2,20\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("IterationYear_High_MA02_S1.csv"),
            "Iteration,Value\n1,30\n",
        )
        .unwrap();
        let output = dir.path().join("combined.csv");

        let tool = AggregateTool::new(AggregateArgs {
            input_folder: dir.path().to_path_buf(),
            output_file: output.clone(),
            contains: vec!["IterationYear".to_string()],
        });
        let report = tool.run().unwrap();
        assert_eq!(report.records, 3);

        let content = std::fs::read_to_string(&output).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("Iteration,Value,ModelArea,SLC,Alternative"));
        assert_eq!(lines.next(), Some("1,10,MA01a,High,FWOP"));
        assert_eq!(lines.next(), Some("2,20,MA01a,High,FWOP"));
        assert_eq!(lines.next(), Some("1,30,MA02,High,S1"));
    }

    #[test]
    fn test_aggregate_tolerates_mismatched_layouts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("IterationYear_High_MA01_FWOP.csv"),
            "Iteration,Value\n1,10\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("IterationYear_High_MA02_FWOP.csv"),
            "Iteration,Value,Extra\n1,30,99\n",
        )
        .unwrap();
        let output = dir.path().join("combined.csv");

        let tool = AggregateTool::new(AggregateArgs {
            input_folder: dir.path().to_path_buf(),
            output_file: output.clone(),
            contains: vec!["IterationYear".to_string()],
        });
        let report = tool.run().unwrap();
        assert_eq!(report.records, 2);

        let content = std::fs::read_to_string(&output).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("Iteration,Value,ModelArea,SLC,Alternative"));
        assert_eq!(lines.next(), Some("1,10,MA01,High,FWOP"));
        // The wider row keeps its extra column ahead of the appended metadata
        assert_eq!(lines.next(), Some("1,30,99,MA02,High,FWOP"));
    }

    #[test]
    fn test_aggregate_errors_when_nothing_matches() {
        let dir = tempfile::tempdir().unwrap();
        let tool = AggregateTool::new(AggregateArgs {
            input_folder: dir.path().to_path_buf(),
            output_file: dir.path().join("combined.csv"),
            contains: vec!["FWOP".to_string()],
        });
        assert!(tool.run().is_err());
    }
}
