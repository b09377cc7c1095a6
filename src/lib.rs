pub mod cli;
pub mod config;
pub mod core;
pub mod server;
pub mod service;
pub mod utils;

pub use config::Config;
pub use crate::core::{
    AggregateOutcome, MediaResult, MediaType, ProbeExecutor, ProviderRegistry, ProviderSpec,
    ResolveError,
};
pub use service::ResolutionService;
