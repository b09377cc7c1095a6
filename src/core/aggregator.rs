use crate::core::normalizer::normalize;
use crate::core::{MediaResult, ProbeOutcome, ProbeResult, ProviderSpec, ResolveError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Operator-facing summary of one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSummary {
    pub provider: String,
    pub status: String,
    pub timed_out: bool,
    /// The provider itself misbehaved (timeout, HTTP error, unreachable, empty body).
    pub faulted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub elapsed_ms: u64,
    pub produced_result: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Start of the body when it could not be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_excerpt: Option<String>,
}

impl ProbeSummary {
    fn new(probe: &ProbeResult, produced_result: bool) -> Self {
        let (status, http_status) = match &probe.outcome {
            ProbeOutcome::Success => ("ok", None),
            ProbeOutcome::HttpError(code) => ("http_error", Some(*code)),
            ProbeOutcome::NetworkError(_) => ("network_error", None),
            ProbeOutcome::Timeout => ("timeout", None),
        };

        let fault = probe.fault();
        let error = match &fault {
            Some(fault) => Some(fault.to_string()),
            None if !produced_result => Some("response held no usable link".to_string()),
            None => None,
        };

        let body_excerpt = if produced_result {
            None
        } else {
            probe.raw_body.as_ref().map(|body| body.excerpt())
        };

        Self {
            provider: probe.provider.clone(),
            status: status.to_string(),
            timed_out: probe.outcome == ProbeOutcome::Timeout,
            faulted: fault.is_some(),
            http_status,
            elapsed_ms: probe.elapsed.as_millis() as u64,
            produced_result,
            error,
            body_excerpt,
        }
    }
}

/// The verdict for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateOutcome {
    pub success: bool,
    pub results: Vec<MediaResult>,
    pub diagnostics: Vec<ProbeSummary>,
}

impl AggregateOutcome {
    pub fn probed(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn faulted(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.faulted).count()
    }

    /// Why the request failed, `None` on success.
    pub fn failure(&self) -> Option<ResolveError> {
        if self.success {
            return None;
        }
        Some(ResolveError::NoUsableResult {
            probed: self.probed(),
            faulted: self.faulted(),
        })
    }
}

/// Normalizes every answered probe and keeps the first result per URL.
///
/// `providers` is the registry slice the probes were issued against; results
/// are ordered by it, so the earliest declared provider owns a shared link.
pub fn aggregate(providers: &[ProviderSpec], probes: &[ProbeResult]) -> AggregateOutcome {
    let mut ordered: Vec<&ProbeResult> = probes.iter().collect();
    ordered.sort_by_key(|probe| {
        providers
            .iter()
            .position(|spec| spec.name == probe.provider)
            .unwrap_or(usize::MAX)
    });

    let mut seen = HashSet::new();
    let mut results = Vec::new();
    let mut diagnostics = Vec::with_capacity(ordered.len());

    for probe in ordered {
        let spec = providers.iter().find(|spec| spec.name == probe.provider);
        let dialect = spec.map(|s| s.dialect).unwrap_or_default();

        let normalized = probe
            .usable_body()
            .and_then(|body| normalize(body, dialect));

        if let Some(media) = &normalized {
            if seen.insert(media.url.clone()) {
                let mut result = MediaResult::from_normalized(media.clone(), &probe.provider);
                if result.media_type.is_none() {
                    result.media_type = spec.and_then(|s| s.media_type);
                }
                results.push(result);
            } else {
                debug!(provider = %probe.provider, url = %media.url, "dropping duplicate link");
            }
        }

        diagnostics.push(ProbeSummary::new(probe, normalized.is_some()));
    }

    AggregateOutcome {
        success: !results.is_empty(),
        results,
        diagnostics,
    }
}
