//! Bounded, cancellation-aware polling loop.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::generation::{GenerationProvider, PollOutcome};

/// Polling parameters.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Wait between poll attempts.
    pub interval: Duration,
    /// Maximum poll attempts before the horizon is exceeded.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 120,
        }
    }
}

/// Poll a prediction until it reaches a terminal state.
///
/// Every wait interval is a suspension point that observes the cancel
/// signal; cancellation surfaces as `ProviderError::Canceled`, distinct
/// from provider failures. Exhausting `max_attempts` yields
/// `PollTimeout`.
pub async fn poll_until_complete(
    provider: &dyn GenerationProvider,
    prediction_id: &str,
    config: &PollConfig,
    cancel_rx: &mut watch::Receiver<bool>,
) -> ProviderResult<String> {
    for attempt in 1..=config.max_attempts {
        if *cancel_rx.borrow() {
            return Err(ProviderError::Canceled);
        }

        match provider.poll(prediction_id).await? {
            PollOutcome::Completed { media_url } => {
                debug!(
                    provider = provider.name(),
                    prediction_id, attempt, "Prediction completed"
                );
                return Ok(media_url);
            }
            PollOutcome::Failed { message } => {
                warn!(
                    provider = provider.name(),
                    prediction_id, "Prediction failed: {}", message
                );
                return Err(ProviderError::GenerationFailed(message));
            }
            PollOutcome::Processing => {}
        }

        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    return Err(ProviderError::Canceled);
                }
            }
        }
    }

    Err(ProviderError::PollTimeout {
        attempts: config.max_attempts,
    })
}
