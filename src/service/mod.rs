//! Request-level entry points: search, resolve, and search-then-resolve.

pub mod response;

use crate::config::Config;
use crate::core::{
    aggregate, extract_candidates, AggregateOutcome, MediaType, Operation, ProbeExecutor,
    ProviderRegistry, ReqwestTransport, ResolveError, SearchCandidate,
};
use crate::utils::canonical_target;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use response::{ErrorResponse, FetchResponse, ResolveResponse, SearchResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Searching,
    Resolving,
    Aggregating,
    Succeeded,
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Succeeded | RequestState::Failed)
    }

    fn can_advance_to(self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Idle, Searching)
                | (Idle, Resolving)
                | (Searching, Resolving)
                | (Searching, Succeeded)
                | (Resolving, Aggregating)
                | (Aggregating, Succeeded)
                | (_, Failed)
        ) && !self.is_terminal()
    }
}

/// Tracks where a single request is; nothing survives the request.
#[derive(Debug)]
struct RequestTracker<'a> {
    input: &'a str,
    state: RequestState,
}

impl<'a> RequestTracker<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            state: RequestState::Idle,
        }
    }

    fn advance(&mut self, next: RequestState) {
        if !self.state.can_advance_to(next) {
            warn!(from = ?self.state, to = ?next, input = self.input, "unexpected request transition");
        }
        debug!(from = ?self.state, to = ?next, input = self.input, "request state");
        self.state = next;
    }

    fn fail(&mut self, err: ResolveError) -> ResolveError {
        self.advance(RequestState::Failed);
        err
    }
}

/// A search hit together with what resolving it produced.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub video: SearchCandidate,
    pub outcome: AggregateOutcome,
}

#[derive(Clone)]
pub struct ResolutionService {
    registry: Arc<ProviderRegistry>,
    executor: ProbeExecutor,
}

impl ResolutionService {
    pub fn new(registry: Arc<ProviderRegistry>, executor: ProbeExecutor) -> Self {
        Self { registry, executor }
    }

    /// Wires the service to the real network using `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config.user_agent)?;
        let executor = ProbeExecutor::new(Arc::new(transport), config.probe_timeout());
        Ok(Self::new(Arc::new(config.registry.clone()), executor))
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Asks the search providers in order; the first non-empty list wins.
    ///
    /// An empty list is a valid answer. Only when no provider returned a
    /// recognizable list at all is this an `UpstreamSearchFailure`.
    pub async fn search(&self, term: &str) -> Result<Vec<SearchCandidate>, ResolveError> {
        let mut tracker = RequestTracker::new(term);
        let candidates = self.search_stage(term, &mut tracker).await?;
        tracker.advance(RequestState::Succeeded);
        Ok(candidates)
    }

    /// Fans `target` out to every eligible resolve provider.
    ///
    /// Provider failures end up in the outcome's diagnostics; only bad input
    /// is returned as `Err`.
    pub async fn resolve(
        &self,
        target: &str,
        wanted: Option<MediaType>,
    ) -> Result<AggregateOutcome, ResolveError> {
        let mut tracker = RequestTracker::new(target);
        self.resolve_stage(target, wanted, &mut tracker).await
    }

    /// Searches for `term`, then resolves the first video found.
    pub async fn search_and_resolve(
        &self,
        term: &str,
        wanted: Option<MediaType>,
    ) -> Result<Resolution, ResolveError> {
        let mut tracker = RequestTracker::new(term);

        let candidates = self.search_stage(term, &mut tracker).await?;
        let video = match candidates.into_iter().next() {
            Some(video) => video,
            None => {
                return Err(tracker.fail(ResolveError::UpstreamSearchFailure(format!(
                    "no results for '{}'",
                    term.trim()
                ))))
            }
        };

        info!("Resolving first search result: {} ({})", video.title, video.url);
        let outcome = self.resolve_stage(&video.url, wanted, &mut tracker).await?;

        Ok(Resolution { video, outcome })
    }

    async fn search_stage(
        &self,
        term: &str,
        tracker: &mut RequestTracker<'_>,
    ) -> Result<Vec<SearchCandidate>, ResolveError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(tracker.fail(ResolveError::InvalidInput(
                "search term must not be empty".to_string(),
            )));
        }

        let providers = self.registry.providers(Operation::Search);
        if providers.is_empty() {
            return Err(tracker.fail(ResolveError::UpstreamSearchFailure(
                "no search providers configured".to_string(),
            )));
        }

        tracker.advance(RequestState::Searching);
        info!("Searching for '{}' across {} providers", term, providers.len());

        let mut answered_empty = false;
        let mut problems = Vec::new();

        for spec in providers {
            let probe = self.executor.probe(term, spec).await;
            if let Some(fault) = probe.fault() {
                problems.push(fault.to_string());
                continue;
            }

            match probe.usable_body().and_then(extract_candidates) {
                Some(candidates) if !candidates.is_empty() => {
                    info!("{} returned {} candidates", spec.name, candidates.len());
                    return Ok(candidates);
                }
                Some(_) => {
                    debug!(provider = %spec.name, "search returned no candidates");
                    answered_empty = true;
                }
                None => {
                    let excerpt = probe
                        .raw_body
                        .as_ref()
                        .map(|body| body.excerpt())
                        .unwrap_or_default();
                    problems.push(format!(
                        "provider '{}' returned an unrecognized search response: {}",
                        spec.name, excerpt
                    ));
                }
            }
        }

        if answered_empty {
            return Ok(Vec::new());
        }

        Err(tracker.fail(ResolveError::UpstreamSearchFailure(problems.join("; "))))
    }

    async fn resolve_stage(
        &self,
        target: &str,
        wanted: Option<MediaType>,
        tracker: &mut RequestTracker<'_>,
    ) -> Result<AggregateOutcome, ResolveError> {
        let target = canonical_target(target).map_err(|e| tracker.fail(e))?;

        let providers = self.registry.resolvers_for(wanted);
        if providers.is_empty() {
            let label = wanted.map(|t| t.as_str()).unwrap_or("any");
            return Err(tracker.fail(ResolveError::InvalidInput(format!(
                "no resolve providers serve media type '{}'",
                label
            ))));
        }

        tracker.advance(RequestState::Resolving);
        info!("Resolving {} across {} providers", target, providers.len());
        let probes = self.executor.probe_all(&target, &providers).await;

        tracker.advance(RequestState::Aggregating);
        let outcome = aggregate(&providers, &probes);

        match outcome.failure() {
            None => {
                tracker.advance(RequestState::Succeeded);
                info!("Resolved {} link(s) for {}", outcome.results.len(), target);
            }
            Some(reason) => {
                tracker.advance(RequestState::Failed);
                warn!("Could not resolve {}: {}", target, reason);
            }
        }

        Ok(outcome)
    }
}
