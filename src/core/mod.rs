pub mod aggregate;
pub mod copy;
pub mod cumulative;
pub mod discount;
pub mod prn;
pub mod stage_freq;
pub mod stage_volume;
pub mod summarize;

pub use crate::domain::model::ToolReport;
pub use crate::domain::ports::Tool;

use crate::config::Command;
use crate::utils::error::Result;

/// Runs one already-validated subcommand.
pub fn run_command(command: Command) -> Result<ToolReport> {
    let tool: Box<dyn Tool> = match command {
        Command::Aggregate(args) => Box::new(aggregate::AggregateTool::new(args)),
        Command::Discount(args) => Box::new(discount::DiscountTool::new(args)),
        Command::DiscountBatch(args) => Box::new(discount::DiscountBatchTool::new(args)),
        Command::Summarize(args) => Box::new(summarize::SummarizeTool::new(args)),
        Command::CumulativeDamage(args) => Box::new(cumulative::CumulativeDamageTool::new(args)),
        Command::StageFrequency(args) => Box::new(stage_freq::StageFrequencyTool::new(args)),
        Command::StageVolume(args) => Box::new(stage_volume::StageVolumeTool::new(args)),
        Command::CopyOutputs(args) => Box::new(copy::CopyOutputsTool::new(args)),
    };
    tracing::debug!("Running tool '{}'", tool.name());
    tool.run()
}
