use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::CopyOutputsArgs;
use crate::core::{Tool, ToolReport};
use crate::utils::error::{PostError, Result};
use crate::utils::paths;

/// Collects matching run outputs into one flat folder. Files whose name
/// carries no run timestamp get one appended so reruns never collide, and
/// files already present in the destination (by stripped name) are skipped.
pub struct CopyOutputsTool {
    args: CopyOutputsArgs,
}

impl CopyOutputsTool {
    pub fn new(args: CopyOutputsArgs) -> Self {
        Self { args }
    }
}

impl Tool for CopyOutputsTool {
    fn name(&self) -> &'static str {
        "copy-outputs"
    }

    fn run(&self) -> Result<ToolReport> {
        tracing::info!(
            "Retrieving .{} file list containing {:?} from {}",
            self.args.extension,
            self.args.contains,
            self.args.input_folder.display()
        );
        let files = paths::paths_by_type(
            &self.args.input_folder,
            &self.args.extension,
            &self.args.contains,
        )?;
        if files.is_empty() {
            return Err(PostError::ProcessingError {
                message: format!(
                    "No .{} files under {}",
                    self.args.extension, self.args.input_folder.display()
                ),
            });
        }

        std::fs::create_dir_all(&self.args.output_folder)?;
        let existing: HashSet<String> = paths::paths_by_type(
            &self.args.output_folder,
            &self.args.extension,
            &[],
        )?
        .iter()
        .map(|p| paths::strip_meta(p))
        .collect();

        let mut outputs: Vec<PathBuf> = Vec::new();
        let mut skipped = 0usize;
        for (i, file) in files.iter().enumerate() {
            let name = paths::file_name(file);

            // Combined/aggregated products are themselves built from these
            // outputs; collecting them again would double-count.
            if name.contains("ombined") || name.contains("ggregate") {
                tracing::debug!("{:02}/{} - Skipping derived file {}", i + 1, files.len(), name);
                skipped += 1;
                continue;
            }
            if existing.contains(&paths::strip_meta(file)) {
                tracing::debug!("{:02}/{} - Already collected, skipping {}", i + 1, files.len(), name);
                skipped += 1;
                continue;
            }

            let destination_name = if paths::timestamp_in_name(&name) {
                name.clone()
            } else {
                let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
                match name.rsplit_once('.') {
                    Some((stem, extension)) => format!("{}_{}.{}", stem, stamp, extension),
                    None => format!("{}_{}", name, stamp),
                }
            };
            let destination = self.args.output_folder.join(destination_name);
            tracing::info!("{:02}/{} - Copying {}", i + 1, files.len(), name);
            std::fs::copy(file, &destination)?;
            outputs.push(destination);
        }

        tracing::info!(
            "Copied {} of {} files to {} ({} skipped)",
            outputs.len(),
            files.len(),
            self.args.output_folder.display(),
            skipped
        );
        let records = outputs.len();
        Ok(ToolReport { outputs, records })
    }
}
