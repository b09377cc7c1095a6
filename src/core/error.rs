use std::time::Duration;
use thiserror::Error;

/// Everything that can go wrong while resolving a single request.
///
/// Provider faults (`ProviderTimeout`, `ProviderHttp`, `ProviderNetwork`,
/// `ProviderMalformedResponse`) are recorded as diagnostics and only surface
/// through `NoUsableResult` when no provider produced a link.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("provider '{provider}' timed out after {}ms", .after.as_millis())]
    ProviderTimeout { provider: String, after: Duration },

    #[error("provider '{provider}' returned HTTP {status}")]
    ProviderHttp { provider: String, status: u16 },

    #[error("provider '{provider}' is unreachable: {message}")]
    ProviderNetwork { provider: String, message: String },

    #[error("provider '{provider}' returned an unusable response")]
    ProviderMalformedResponse { provider: String },

    #[error("{}", no_usable_message(.probed, .faulted))]
    NoUsableResult { probed: usize, faulted: usize },

    #[error("search failed: {0}")]
    UpstreamSearchFailure(String),

    #[error("configuration error: {0}")]
    Config(String),
}

fn no_usable_message(probed: &usize, faulted: &usize) -> String {
    if faulted == probed {
        format!("all {} providers failed", probed)
    } else if *faulted == 0 {
        format!(
            "all {} providers responded but none returned a usable link",
            probed
        )
    } else {
        format!(
            "no usable link: {} of {} providers failed, the rest returned nothing usable",
            faulted, probed
        )
    }
}

impl ResolveError {
    /// True for errors caused by the caller rather than by a provider.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ResolveError::InvalidInput(_))
    }
}
