use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;
use eventcast_stream::{ServerOptions, start_server};

use crate::config;

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct ServeCommand {
    /// Host to bind to
    #[arg(long, env = "EVENTCAST_HOST")]
    pub host: Option<String>,

    /// Port to run the server on
    #[arg(long, short = 'p', env = "EVENTCAST_PORT")]
    pub port: Option<u16>,

    /// Path to a config file (default: ~/.config/eventcast/config.toml)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Name of the stream that exists from startup
    #[arg(long)]
    pub default_stream: Option<String>,
}

impl ServeCommand {
    /// Resolve options: defaults, then the config file, then env/flags.
    pub fn options(&self) -> Result<ServerOptions> {
        let options = config::load(self.config.as_deref())?;
        Ok(self.apply(options))
    }

    fn apply(&self, mut options: ServerOptions) -> ServerOptions {
        if let Some(host) = &self.host {
            options.host = host.clone();
        }
        if let Some(port) = self.port {
            options.port = port;
        }
        if let Some(default_stream) = &self.default_stream {
            options.default_stream = default_stream.clone();
        }
        options
    }

    pub async fn execute(&self) -> Result<()> {
        let options = self.options()?;

        println!();
        println!("{}{}", style("event").white(), style("cast").green());
        println!("{}", style("Starting stream server").dim());
        println!();
        println!("{} {}", style("Listen").dim(), options.bind_addr());
        println!("{} {}", style("Default stream").dim(), options.default_stream);
        println!();
        println!("{}", style("Endpoints").dim());
        let base = format!("http://{}", options.bind_addr());
        println!("  GET  {}/health", base);
        println!("  GET  {}/", base);
        println!("  POST {}/create/{{name}}", base);
        println!("  POST {}/{{name}}", base);
        println!("  GET  {}/{{name}}  (SSE)", base);
        println!();

        start_server(options).await.context("server failed")
    }
}
