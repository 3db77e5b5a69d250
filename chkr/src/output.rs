use std::path::Path;

use crate::cli::OutputFormat;

mod human;
mod json;

pub(crate) use json::render_json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, config_path: &Path, endpoints: &[chkr_core::EndpointSpec]);
    fn print_summary(&self, summary: &chkr_core::RunSummary) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
