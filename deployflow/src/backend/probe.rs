//! HTTP health probing.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::backend::HealthProber;
use crate::errors::BackendError;
use crate::poller::PollOutcome;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probes health endpoints with plain HTTP GETs.
///
/// Only the status class matters: 2xx is healthy, anything else (including
/// a transport error) is "not ready yet". A service that is still warming
/// up is indistinguishable from one that is briefly unreachable, so the
/// prober never reports a hard failure.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProber {
    /// Creates a prober with the default 5-second timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthProber for HttpProber {
    async fn probe(&self, url: &str) -> PollOutcome<(), BackendError> {
        match self.client.get(url).timeout(self.timeout).send().await {
            Ok(response) if response.status().is_success() => PollOutcome::Ready(()),
            Ok(response) => {
                debug!(%url, status = %response.status(), "Health probe not ready");
                PollOutcome::NotReadyYet
            }
            Err(err) => {
                debug!(%url, error = %err, "Health probe transport error");
                PollOutcome::NotReadyYet
            }
        }
    }
}
