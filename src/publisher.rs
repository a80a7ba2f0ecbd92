//! Outbound domain events over NATS.

use crate::domain::events::DomainEvent;

/// Publishes domain events when a broker is configured and logs them otherwise.
#[derive(Clone, Default)]
pub struct EventPublisher {
    client: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(client: Option<async_nats::Client>) -> Self { Self { client } }

    /// Connects to `url` when given; a failed connection leaves events log-only.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else { return Self::default() };
        match async_nats::connect(url).await {
            Ok(client) => {
                tracing::info!(%url, "Connected to NATS");
                Self::new(Some(client))
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "NATS unavailable; events will only be logged");
                Self::default()
            }
        }
    }

    pub async fn publish(&self, event: DomainEvent) {
        let Some(client) = &self.client else {
            tracing::debug!(?event, "Domain event");
            return;
        };
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, ?event, "Could not encode domain event");
                return;
            }
        };
        if let Err(e) = client.publish(event.subject().to_string(), payload.into()).await {
            tracing::warn!(error = %e, subject = event.subject(), "Failed to publish domain event");
        }
    }
}
