use crate::core::{ProviderSpec, ResolveError};
use crate::utils::excerpt;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Bytes of an unusable body kept for diagnostics.
const EXCERPT_LEN: usize = 160;

/// A provider body: parsed JSON when possible, the raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBody {
    Json(Value),
    Text(String),
}

impl RawBody {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => RawBody::Json(value),
            Err(_) => RawBody::Text(text.to_string()),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            RawBody::Json(Value::Null) => true,
            RawBody::Json(_) => false,
            RawBody::Text(text) => text.trim().is_empty(),
        }
    }

    pub fn excerpt(&self) -> String {
        match self {
            RawBody::Json(value) => excerpt(&value.to_string(), EXCERPT_LEN),
            RawBody::Text(text) => excerpt(text, EXCERPT_LEN),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success,
    HttpError(u16),
    NetworkError(String),
    Timeout,
}

/// What happened when one provider was asked about one target.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub provider: String,
    pub outcome: ProbeOutcome,
    pub raw_body: Option<RawBody>,
    pub elapsed: Duration,
    pub timeout: Duration,
}

impl ProbeResult {
    /// Only 2xx responses with a non-empty body are handed to the normalizer.
    pub fn usable_body(&self) -> Option<&RawBody> {
        match (&self.outcome, &self.raw_body) {
            (ProbeOutcome::Success, Some(body)) if !body.is_blank() => Some(body),
            _ => None,
        }
    }

    /// The provider fault this probe represents, if any.
    pub fn fault(&self) -> Option<ResolveError> {
        let provider = self.provider.clone();
        match &self.outcome {
            ProbeOutcome::Success if self.usable_body().is_none() => {
                Some(ResolveError::ProviderMalformedResponse { provider })
            }
            ProbeOutcome::Success => None,
            ProbeOutcome::HttpError(status) => Some(ResolveError::ProviderHttp {
                provider,
                status: *status,
            }),
            ProbeOutcome::NetworkError(message) => Some(ResolveError::ProviderNetwork {
                provider,
                message: message.clone(),
            }),
            ProbeOutcome::Timeout => Some(ResolveError::ProviderTimeout {
                provider,
                after: self.timeout,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// The HTTP GET the executor needs from its client.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json, text/plain;q=0.9, */*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}

/// Issues one GET per provider, all at once, each under its own deadline.
#[derive(Clone)]
pub struct ProbeExecutor {
    transport: Arc<dyn Transport>,
    default_timeout: Duration,
}

impl ProbeExecutor {
    pub fn new(transport: Arc<dyn Transport>, default_timeout: Duration) -> Self {
        Self {
            transport,
            default_timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Probes every provider concurrently and waits for all of them.
    ///
    /// Results come back in the order of `providers`, whatever order they
    /// finished in.
    pub async fn probe_all(&self, target: &str, providers: &[ProviderSpec]) -> Vec<ProbeResult> {
        join_all(providers.iter().map(|spec| self.probe(target, spec))).await
    }

    pub async fn probe(&self, target: &str, spec: &ProviderSpec) -> ProbeResult {
        let url = spec.build_url(target);
        let timeout = spec.timeout().unwrap_or(self.default_timeout);
        let started = Instant::now();

        debug!(provider = %spec.name, %url, "probing provider");

        let (outcome, raw_body) =
            match tokio::time::timeout(timeout, self.transport.get(&url)).await {
                Err(_) => (ProbeOutcome::Timeout, None),
                Ok(Err(e)) => (ProbeOutcome::NetworkError(format!("{:#}", e)), None),
                Ok(Ok(response)) => {
                    let body = RawBody::parse(&response.body);
                    if (200..300).contains(&response.status) {
                        (ProbeOutcome::Success, Some(body))
                    } else {
                        (ProbeOutcome::HttpError(response.status), Some(body))
                    }
                }
            };

        let result = ProbeResult {
            provider: spec.name.clone(),
            outcome,
            raw_body,
            elapsed: started.elapsed(),
            timeout,
        };

        match result.fault() {
            Some(fault) => warn!(elapsed_ms = result.elapsed.as_millis() as u64, "{}", fault),
            None => debug!(
                provider = %spec.name,
                elapsed_ms = result.elapsed.as_millis() as u64,
                "provider answered"
            ),
        }

        result
    }
}
