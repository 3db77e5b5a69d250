mod format;
mod summary;

use summary::render;

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput;

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, config_path: &std::path::Path, endpoints: &[chkr_core::EndpointSpec]) {
        println!("config: {}", config_path.display());
        for e in endpoints {
            let c = &e.concurrency;
            if c.is_concurrent() {
                println!(
                    "endpoint: {} {} {} users={} total={} retries={}",
                    e.name, e.method, e.url, c.users, c.total, e.retry.count
                );
            } else {
                println!(
                    "endpoint: {} {} {} retries={}",
                    e.name, e.method, e.url, e.retry.count
                );
            }
        }
        if !endpoints.is_empty() {
            println!();
        }
    }

    fn print_summary(&self, summary: &chkr_core::RunSummary) -> anyhow::Result<()> {
        print!("{}", render(summary));
        Ok(())
    }
}
