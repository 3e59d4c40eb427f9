//! The forwarder orchestrating the shipping pipeline
//!
//! filter (level governor) → encode → chunk into payloads → deliver in
//! order → feed the server's level directive back into the governor.

use crate::batch::{BatchEncoder, EncodedPayload};
use crate::config::Config;
use crate::encoder::encode_event;
use crate::errors::{Result, SinkError};
use crate::events::LogEvent;
use crate::levels::{Level, LevelGovernor};
use crate::transport::SeqTransport;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// Per-event delivery outcome, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event reached the server
    Delivered,

    /// Dropped client-side: below the server's minimum accepted level
    Suppressed,

    /// Dropped individually: the encoded event exceeded a size limit
    Rejected(String),

    /// The delivery carrying this event failed
    Failed(String),
}

/// The result of one `ship` call. Failures are reported here per event;
/// `ship` itself does not error.
#[derive(Debug)]
pub struct ShipReport {
    pub outcomes: Vec<EventOutcome>,
    pub payloads_sent: usize,
    pub minimum_level: Option<Level>,
}

impl ShipReport {
    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, EventOutcome::Delivered))
            .count()
    }

    /// True when no event failed or was rejected (suppression is not a
    /// failure).
    pub fn is_complete(&self) -> bool {
        !self.outcomes.iter().any(|outcome| {
            matches!(outcome, EventOutcome::Rejected(_) | EventOutcome::Failed(_))
        })
    }
}

/// Ships structured log events to a Seq server as compact JSON batches.
pub struct SeqForwarder {
    config: Config,
    transport: SeqTransport,
    batch_encoder: BatchEncoder,
    governor: Arc<LevelGovernor>,
}

impl SeqForwarder {
    /// Create a new forwarder
    pub fn new(config: Config) -> Result<Self> {
        config.validate().map_err(SinkError::Config)?;

        let transport = SeqTransport::new(&config)?;
        let batch_encoder = BatchEncoder::new(config.max_payload_bytes, config.max_event_bytes);

        Ok(Self {
            config,
            transport,
            batch_encoder,
            governor: Arc::new(LevelGovernor::new()),
        })
    }

    /// The shared level governor; useful for wiring several forwarders to
    /// one process-wide minimum.
    pub fn governor(&self) -> Arc<LevelGovernor> {
        Arc::clone(&self.governor)
    }

    /// The last minimum level the server communicated, if any.
    pub fn minimum_level(&self) -> Option<Level> {
        self.governor.minimum()
    }

    /// Encodes and delivers `events`, splitting into multiple payloads
    /// when the batch size limit requires it.
    #[instrument(skip(self, events))]
    pub async fn ship(&self, events: &[LogEvent]) -> ShipReport {
        if events.is_empty() {
            return ShipReport {
                outcomes: Vec::new(),
                payloads_sent: 0,
                minimum_level: self.governor.minimum(),
            };
        }

        let batch_id = Uuid::new_v4();
        let mut outcomes = vec![EventOutcome::Suppressed; events.len()];

        let mut lines = Vec::with_capacity(events.len());
        for (index, event) in events.iter().enumerate() {
            if !self.governor.accepts(event.level) {
                continue;
            }
            lines.push((
                index,
                encode_event(event, &self.config.properties, self.config.max_structure_depth),
            ));
        }

        let everything_suppressed = lines.is_empty();
        let mut plan = self.batch_encoder.build(lines);

        for (index, reason) in plan.rejected.drain(..) {
            outcomes[index] = EventOutcome::Rejected(reason);
        }

        // An input that was filtered down to nothing still performs one
        // empty delivery, so the server's level directive stays fresh
        if everything_suppressed {
            debug!(
                "All events in batch {} suppressed below {:?}; refreshing level directive",
                batch_id,
                self.governor.minimum()
            );
            plan.payloads.push(EncodedPayload {
                body: String::new(),
                event_indexes: Vec::new(),
            });
        }

        let mut payloads_sent = 0;
        let mut position = 0;

        while position < plan.payloads.len() {
            let payload = &plan.payloads[position];

            match self.transport.send(payload.body.clone()).await {
                Ok(directive) => {
                    debug!(
                        "Delivered payload {}/{} of batch {} ({} events, {} bytes)",
                        position + 1,
                        plan.payloads.len(),
                        batch_id,
                        payload.event_indexes.len(),
                        payload.body.len()
                    );
                    self.governor.observe(directive);
                    for &index in &payload.event_indexes {
                        outcomes[index] = EventOutcome::Delivered;
                    }
                    payloads_sent += 1;
                    position += 1;
                }
                Err(err) => {
                    // Batch-fatal: this payload and everything queued
                    // behind it fails; retry policy belongs to the caller
                    let text = err.to_string();
                    error!("Failed to deliver batch {}: {}", batch_id, text);
                    for payload in &plan.payloads[position..] {
                        for &index in &payload.event_indexes {
                            outcomes[index] = EventOutcome::Failed(text.clone());
                        }
                    }
                    break;
                }
            }
        }

        ShipReport {
            outcomes,
            payloads_sent,
            minimum_level: self.governor.minimum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn forwarder_for(server: &MockServer) -> SeqForwarder {
        SeqForwarder::new(Config {
            server_url: server.uri(),
            ..Config::default()
        })
        .unwrap()
    }

    async fn mount_ok(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/events/raw"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
    }

    fn received_bodies(requests: &[wiremock::Request]) -> Vec<String> {
        requests
            .iter()
            .map(|request| String::from_utf8(request.body.clone()).unwrap())
            .collect()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = SeqForwarder::new(Config {
            server_url: String::new(),
            ..Config::default()
        });
        assert!(matches!(result, Err(SinkError::Config(_))));
    }

    #[tokio::test]
    async fn test_events_ship_in_one_newline_delimited_payload() {
        let server = MockServer::start().await;
        mount_ok(&server).await;

        let forwarder = forwarder_for(&server);
        let events = vec![
            LogEvent::new(Level::Info, "first"),
            LogEvent::new(Level::Info, "second"),
        ];
        let report = forwarder.ship(&events).await;

        assert_eq!(report.outcomes, vec![EventOutcome::Delivered, EventOutcome::Delivered]);
        assert_eq!(report.payloads_sent, 1);
        assert!(report.is_complete());

        let requests = server.received_requests().await.unwrap();
        let bodies = received_bodies(&requests);
        assert_eq!(bodies.len(), 1);

        let lines: Vec<&str> = bodies[0].lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"@mt\":\"first\""));
        assert!(lines[1].contains("\"@mt\":\"second\""));
        assert!(bodies[0].ends_with('\n'));
    }

    #[tokio::test]
    async fn test_empty_input_sends_nothing() {
        let server = MockServer::start().await;
        mount_ok(&server).await;

        let forwarder = forwarder_for(&server);
        let report = forwarder.ship(&[]).await;

        assert!(report.outcomes.is_empty());
        assert_eq!(report.payloads_sent, 0);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_splits_when_the_payload_limit_is_reached() {
        let server = MockServer::start().await;
        mount_ok(&server).await;

        let forwarder = SeqForwarder::new(Config {
            server_url: server.uri(),
            max_payload_bytes: 160,
            ..Config::default()
        })
        .unwrap();

        // Each encoded event is ~100 bytes, so two cannot share a payload
        let events = vec![
            LogEvent::new(Level::Info, "a".repeat(40)),
            LogEvent::new(Level::Info, "b".repeat(40)),
        ];
        let report = forwarder.ship(&events).await;

        assert_eq!(report.outcomes, vec![EventOutcome::Delivered, EventOutcome::Delivered]);
        assert_eq!(report.payloads_sent, 2);

        let bodies = received_bodies(&server.received_requests().await.unwrap());
        assert_eq!(bodies.len(), 2);
        assert!(bodies[0].contains(&"a".repeat(40)));
        assert!(bodies[1].contains(&"b".repeat(40)));
    }

    #[tokio::test]
    async fn test_oversized_event_is_rejected_and_siblings_ship() {
        let server = MockServer::start().await;
        mount_ok(&server).await;

        let forwarder = SeqForwarder::new(Config {
            server_url: server.uri(),
            max_event_bytes: 200,
            ..Config::default()
        })
        .unwrap();

        let events = vec![
            LogEvent::new(Level::Info, "small"),
            LogEvent::new(Level::Info, "x".repeat(500)),
        ];
        let report = forwarder.ship(&events).await;

        assert_eq!(report.outcomes[0], EventOutcome::Delivered);
        assert!(matches!(report.outcomes[1], EventOutcome::Rejected(_)));
        assert!(!report.is_complete());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_fails_the_whole_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("storage offline"))
            .mount(&server)
            .await;

        let forwarder = SeqForwarder::new(Config {
            server_url: server.uri(),
            max_payload_bytes: 160,
            ..Config::default()
        })
        .unwrap();

        let events = vec![
            LogEvent::new(Level::Info, "a".repeat(40)),
            LogEvent::new(Level::Info, "b".repeat(40)),
        ];
        let report = forwarder.ship(&events).await;

        // The first payload failed, so the held-back continuation is
        // never attempted and fails with the same diagnostic
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
        assert_eq!(report.payloads_sent, 0);
        for outcome in &report.outcomes {
            match outcome {
                EventOutcome::Failed(text) => assert!(text.contains("storage offline")),
                other => panic!("unexpected outcome: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_level_directive_filters_subsequent_batches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_string(r#"{"MinimumLevelAccepted":"Warning"}"#),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_ok(&server).await;

        let forwarder = forwarder_for(&server);

        let report = forwarder.ship(&[LogEvent::new(Level::Info, "before")]).await;
        assert_eq!(report.outcomes, vec![EventOutcome::Delivered]);
        assert_eq!(report.minimum_level, Some(Level::Warn));

        let events = vec![
            LogEvent::new(Level::Info, "filtered"),
            LogEvent::new(Level::Error, "kept"),
        ];
        let report = forwarder.ship(&events).await;

        assert_eq!(report.outcomes[0], EventOutcome::Suppressed);
        assert_eq!(report.outcomes[1], EventOutcome::Delivered);

        let bodies = received_bodies(&server.received_requests().await.unwrap());
        assert_eq!(bodies.len(), 2);
        assert!(!bodies[1].contains("filtered"));
        assert!(bodies[1].contains("kept"));
    }

    #[tokio::test]
    async fn test_fully_suppressed_batch_still_refreshes_the_directive() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_string(r#"{"MinimumLevelAccepted":"Debug"}"#),
            )
            .mount(&server)
            .await;

        let forwarder = forwarder_for(&server);
        forwarder.governor().observe(Some(Level::Error));

        let report = forwarder.ship(&[LogEvent::new(Level::Info, "quiet")]).await;

        assert_eq!(report.outcomes, vec![EventOutcome::Suppressed]);
        assert_eq!(report.payloads_sent, 1);
        // The empty refresh delivery lowered the minimum again
        assert_eq!(report.minimum_level, Some(Level::Debug));

        let bodies = received_bodies(&server.received_requests().await.unwrap());
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].is_empty());
    }
}
