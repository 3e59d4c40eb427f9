//! HTTP transport for delivering encoded payloads to the Seq server

use crate::config::Config;
use crate::errors::{Result, SinkError};
use crate::levels::{self, Level};
use reqwest::{Client, Proxy, Response, StatusCode};
use tracing::debug;

/// Content type of the compact log event format.
pub const CLEF_CONTENT_TYPE: &str = "application/vnd.serilog.clef; charset=utf-8";

/// Header carrying the API key that authenticates the client.
pub const API_KEY_HEADER: &str = "X-Seq-ApiKey";

/// HTTP client for the bulk-ingestion endpoint.
#[derive(Debug, Clone)]
pub struct SeqTransport {
    client: Client,
    ingestion_url: String,
    api_key: Option<String>,
    headers: Vec<(String, String)>,
}

impl SeqTransport {
    /// Create a transport from the sink configuration
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(format!("seq-sink/{}", env!("CARGO_PKG_VERSION")));

        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }

        if let Some(address) = &config.proxy_address {
            builder = builder.proxy(Proxy::all(address.as_str()).map_err(SinkError::Http)?);
        }

        let client = builder.build().map_err(SinkError::Http)?;

        Ok(Self {
            client,
            ingestion_url: config.ingestion_url(),
            api_key: config.api_key.clone(),
            headers: config.headers.clone(),
        })
    }

    /// Sends one newline-delimited payload.
    ///
    /// Returns the server's minimum-level directive when the response
    /// carried one; a missing or malformed directive is not an error.
    pub async fn send(&self, payload: String) -> Result<Option<Level>> {
        let mut request = self
            .client
            .post(&self.ingestion_url)
            .header(reqwest::header::CONTENT_TYPE, CLEF_CONTENT_TYPE)
            .body(payload);

        if let Some(api_key) = &self.api_key {
            request = request.header(API_KEY_HEADER, api_key);
        }

        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(SinkError::Http)?;
        self.handle_response(response).await
    }

    async fn handle_response(&self, response: Response) -> Result<Option<Level>> {
        let status = response.status();

        if status.as_u16() > 299 {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SinkError::Delivery {
                status: status.as_u16(),
                body,
            });
        }

        // Only a 201 carries the minimum-level directive
        if status == StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Ok(levels::read_minimum_accepted_level(&body));
        }

        debug!("Payload accepted by Seq server with status {}", status);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> Config {
        Config {
            server_url: server.uri(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_payload_is_posted_to_the_ingestion_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/events/raw"))
            .and(header("content-type", CLEF_CONTENT_TYPE))
            .and(body_string("{\"@t\":\"x\"}\n"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = SeqTransport::new(&config_for(&server)).unwrap();
        let directive = transport.send("{\"@t\":\"x\"}\n".to_string()).await.unwrap();

        assert_eq!(directive, None);
    }

    #[tokio::test]
    async fn test_api_key_header_is_attached_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header(API_KEY_HEADER, "secret-key"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = Config {
            api_key: Some("secret-key".to_string()),
            ..config_for(&server)
        };
        let transport = SeqTransport::new(&config).unwrap();
        transport.send(String::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_extra_headers_are_attached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-Tenant", "billing"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = Config {
            headers: vec![("X-Tenant".to_string(), "billing".to_string())],
            ..config_for(&server)
        };
        let transport = SeqTransport::new(&config).unwrap();
        transport.send(String::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_created_response_carries_the_level_directive() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_string(r#"{"MinimumLevelAccepted":"Warning"}"#),
            )
            .mount(&server)
            .await;

        let transport = SeqTransport::new(&config_for(&server)).unwrap();
        let directive = transport.send(String::new()).await.unwrap();

        assert_eq!(directive, Some(Level::Warn));
    }

    #[tokio::test]
    async fn test_malformed_directive_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"MinimumLevelAccepted":"Sideways"}"#))
            .mount(&server)
            .await;

        let transport = SeqTransport::new(&config_for(&server)).unwrap();
        let directive = transport.send(String::new()).await.unwrap();

        assert_eq!(directive, None);
    }

    #[tokio::test]
    async fn test_plain_success_carries_no_directive() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"MinimumLevelAccepted":"Warning"}"#),
            )
            .mount(&server)
            .await;

        let transport = SeqTransport::new(&config_for(&server)).unwrap();
        let directive = transport.send(String::new()).await.unwrap();

        // The directive only rides on a 201
        assert_eq!(directive, None);
    }

    #[tokio::test]
    async fn test_failure_status_surfaces_the_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid payload"))
            .mount(&server)
            .await;

        let transport = SeqTransport::new(&config_for(&server)).unwrap();
        let error = transport.send(String::new()).await.unwrap_err();

        match error {
            SinkError::Delivery { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "invalid payload");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_failure_is_a_transport_error() {
        // Nothing is listening on this port
        let config = Config {
            server_url: "http://127.0.0.1:1".to_string(),
            http_timeout: std::time::Duration::from_millis(500),
            ..Config::default()
        };
        let transport = SeqTransport::new(&config).unwrap();
        let error = transport.send(String::new()).await.unwrap_err();

        assert!(matches!(error, SinkError::Http(_)));
    }
}
