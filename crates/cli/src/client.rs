use std::time::Duration;

use anyhow::{Context, Result, bail};
use console::style;
use eventcast_sdk::{ClientConfig, ConnectionState, DEFAULT_ENDPOINT, EventReader, Publisher};

/// Server address shared by every client command.
#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct EndpointArgs {
    /// Base URL of the eventcast server
    #[arg(long, short = 'e', env = "EVENTCAST_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

impl EndpointArgs {
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.endpoint.clone())
    }

    pub fn publisher(&self) -> Result<Publisher> {
        Publisher::new(self.config()).context("failed to build HTTP client")
    }
}

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct CreateCommand {
    /// Name of the stream to create
    pub name: String,

    #[command(flatten)]
    pub endpoint: EndpointArgs,
}

impl CreateCommand {
    pub async fn execute(&self) -> Result<()> {
        self.endpoint
            .publisher()?
            .create_stream(&self.name)
            .await
            .with_context(|| format!("failed to create stream {}", self.name))?;
        println!("{} Created stream {}", style("✓").green(), self.name);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct PostCommand {
    /// Target stream
    pub name: String,

    /// JSON object to post
    pub data: String,

    #[command(flatten)]
    pub endpoint: EndpointArgs,
}

impl PostCommand {
    pub async fn execute(&self) -> Result<()> {
        let payload: serde_json::Value =
            serde_json::from_str(&self.data).context("payload is not valid JSON")?;

        let seq = self
            .endpoint
            .publisher()?
            .post(&self.name, &payload)
            .await
            .with_context(|| format!("failed to post to {}", self.name))?;
        println!("{} Posted to {} as #{}", style("✓").green(), self.name, seq);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct ListCommand {
    #[command(flatten)]
    pub endpoint: EndpointArgs,
}

impl ListCommand {
    pub async fn execute(&self) -> Result<()> {
        let streams = self
            .endpoint
            .publisher()?
            .list()
            .await
            .context("failed to list streams")?;

        for stream in streams {
            println!(
                "{}  {} {}  {} {}",
                style(&stream.name).bold(),
                style("messages").dim(),
                stream.messages,
                style("subscribers").dim(),
                stream.subscribers
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct SubscribeCommand {
    /// Stream to follow
    pub name: String,

    #[command(flatten)]
    pub endpoint: EndpointArgs,
}

impl SubscribeCommand {
    /// Print each payload as a JSON line until Ctrl-C.
    pub async fn execute(&self) -> Result<()> {
        let mut reader = EventReader::new(self.name.clone(), self.endpoint.config());
        let mut rx = reader.subscribe();
        reader.connect().await?;

        let mut state_check = tokio::time::interval(Duration::from_millis(500));
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = rx.recv() => match event {
                    Some(event) => println!("{}", event.payload),
                    None => break,
                },
                _ = state_check.tick() => {
                    if reader.state() == ConnectionState::Disconnected {
                        bail!("subscription to {} ended", self.name);
                    }
                }
            }
        }

        reader.disconnect().await;
        Ok(())
    }
}
