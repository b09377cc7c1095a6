use crate::config::Config;
use crate::core::{MediaType, Operation};
use crate::server;
use crate::service::{FetchResponse, ResolutionService, ResolveResponse, SearchResponse};
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "media-resolver")]
#[command(about = "Resolve a search term or video URL into download links")]
#[command(version)]
pub struct Cli {
    /// Config file with the provider registry
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Per-provider timeout in seconds (overrides the config file)
    #[arg(short, long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Search for videos
    Search {
        #[arg(value_name = "TERM", num_args = 1.., required = true)]
        term: Vec<String>,
    },

    /// Resolve a video URL or id into download links
    Resolve {
        #[arg(value_name = "URL_OR_ID")]
        target: String,

        /// Only ask providers serving this media type (audio or video)
        #[arg(long = "type", value_name = "TYPE")]
        media_type: Option<MediaType>,
    },

    /// Search, then resolve the first video found
    Fetch {
        #[arg(value_name = "TERM", num_args = 1.., required = true)]
        term: Vec<String>,

        /// Only ask providers serving this media type (audio or video)
        #[arg(long = "type", value_name = "TYPE")]
        media_type: Option<MediaType>,
    },

    /// Serve the HTTP API
    Serve {
        #[arg(short, long, default_value = "127.0.0.1:5000")]
        bind: SocketAddr,
    },

    /// List the configured providers
    Providers,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        self.apply_overrides(Config::load(self.config.as_deref())?)
    }

    /// Layers command line flags over a loaded config.
    pub fn apply_overrides(&self, mut config: Config) -> Result<Config> {
        if let Some(secs) = self.timeout {
            config.probe_timeout_secs = secs;
        }
        config.validate()?;
        Ok(config)
    }

    pub async fn run(&self) -> Result<()> {
        let config = self.load_config()?;
        let service = ResolutionService::from_config(&config)?;

        match &self.command {
            Command::Search { term } => {
                let results = service.search(&term.join(" ")).await?;
                print_json(&SearchResponse { results })?;
            }
            Command::Resolve { target, media_type } => {
                let response = match service.resolve(target, *media_type).await {
                    Ok(outcome) => ResolveResponse::from(outcome),
                    Err(err) => ResolveResponse::from_error(&err),
                };
                print_json(&response)?;
                if !response.success {
                    anyhow::bail!(
                        "{}",
                        response.error.as_deref().unwrap_or("resolve failed")
                    );
                }
            }
            Command::Fetch { term, media_type } => {
                let resolution = service.search_and_resolve(&term.join(" "), *media_type).await?;
                let response = FetchResponse {
                    video: resolution.video,
                    resolution: ResolveResponse::from(resolution.outcome),
                };
                print_json(&response)?;
                if !response.resolution.success {
                    anyhow::bail!(
                        "{}",
                        response.resolution.error.as_deref().unwrap_or("resolve failed")
                    );
                }
            }
            Command::Serve { bind } => {
                server::serve(Arc::new(service), *bind).await?;
            }
            Command::Providers => {
                for (label, operation) in [("search", Operation::Search), ("resolve", Operation::Resolve)] {
                    println!("{} providers:", label);
                    for spec in service.registry().providers(operation) {
                        let media_type = spec.media_type.map(|t| t.as_str()).unwrap_or("any");
                        println!(
                            "  {} [{:?}, {}] {}",
                            spec.name, spec.dialect, media_type, spec.url_template
                        );
                    }
                }
            }
        }

        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
