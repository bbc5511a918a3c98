use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use eventcast_sdk::mock::run_generator;
use eventcast_stream::DEFAULT_STREAM;

use crate::client::EndpointArgs;

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct MockCommand {
    /// Stream to post trials to
    #[arg(long, short = 's', default_value = DEFAULT_STREAM)]
    pub stream: String,

    /// Number of trials to send (default: run until interrupted)
    #[arg(long, short = 'n')]
    pub count: Option<u64>,

    /// Fixed delay between trials in milliseconds (default: each trial's duration)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    #[command(flatten)]
    pub endpoint: EndpointArgs,
}

impl MockCommand {
    pub async fn execute(&self) -> Result<()> {
        let publisher = self.endpoint.publisher()?;
        let interval = self.interval_ms.map(Duration::from_millis);

        println!(
            "{} {}",
            style("Sending mock trials to").dim(),
            style(&self.stream).bold()
        );

        let stats = tokio::select! {
            stats = run_generator(&publisher, &self.stream, self.count, interval) => {
                stats.with_context(|| format!("mock producer for {} failed", self.stream))?
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        };

        println!("{} {}", style("✓").green(), stats);
        Ok(())
    }
}
