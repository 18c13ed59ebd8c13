use crate::domain::model::ToolReport;
use crate::utils::error::Result;

/// Common seam for every post-processing tool: load inputs, apply the
/// transform, write outputs, report what was written.
pub trait Tool {
    fn name(&self) -> &'static str;

    fn run(&self) -> Result<ToolReport>;
}
