pub mod aggregator;
pub mod error;
pub mod metadata;
pub mod normalizer;
pub mod probe;
pub mod registry;

pub use aggregator::{aggregate, AggregateOutcome, ProbeSummary};
pub use error::ResolveError;
pub use metadata::{MediaResult, MediaType, NormalizedMedia, SearchCandidate};
pub use normalizer::{extract_candidates, normalize, UrlStrategy};
pub use probe::{
    HttpResponse, ProbeExecutor, ProbeOutcome, ProbeResult, RawBody, ReqwestTransport, Transport,
    DEFAULT_PROBE_TIMEOUT,
};
pub use registry::{Dialect, Operation, ProviderRegistry, ProviderSpec};
