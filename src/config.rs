//! Configuration for the Seq sink

use crate::events::LogEvent;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Narrow render abstraction for configured properties: the host framework
/// supplies a layout, the sink only asks it for text per event.
pub trait EventLayout: Send + Sync {
    fn render(&self, event: &LogEvent) -> String;
}

impl<F> EventLayout for F
where
    F: Fn(&LogEvent) -> String + Send + Sync,
{
    fn render(&self, event: &LogEvent) -> String {
        self(event)
    }
}

struct FixedText(String);

impl EventLayout for FixedText {
    fn render(&self, _event: &LogEvent) -> String {
        self.0.clone()
    }
}

/// A property attached to every outgoing event.
#[derive(Clone)]
pub struct ExtraProperty {
    /// The name of the property
    pub name: String,

    /// The layout producing the property's text per event
    pub value: Arc<dyn EventLayout>,

    /// When set, text that parses as a number is stored as a number
    pub as_number: bool,
}

impl ExtraProperty {
    /// A property with a fixed string value.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::rendered(name, FixedText(value.into()))
    }

    /// A fixed-value property stored as a number when its text parses as
    /// one.
    pub fn number(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::rendered(name, FixedText(value.into())).numeric()
    }

    /// A property rendered per event through a layout.
    pub fn rendered(name: impl Into<String>, value: impl EventLayout + 'static) -> Self {
        Self {
            name: name.into(),
            value: Arc::new(value),
            as_number: false,
        }
    }

    /// Marks the rendered text for numeric storage.
    pub fn numeric(mut self) -> Self {
        self.as_number = true;
        self
    }
}

impl fmt::Debug for ExtraProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtraProperty")
            .field("name", &self.name)
            .field("as_number", &self.as_number)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The address of the Seq server to write to
    pub server_url: String,

    /// API key that authenticates the client to the Seq server
    pub api_key: Option<String>,

    /// Proxy address to route deliveries through; when absent the
    /// operating system's proxy configuration applies
    pub proxy_address: Option<String>,

    /// Set to false to bypass system proxy discovery entirely
    pub use_system_proxy: bool,

    /// Additional HTTP headers attached to every delivery
    pub headers: Vec<(String, String)>,

    /// Maximum size of one newline-delimited payload
    pub max_payload_bytes: usize,

    /// Maximum encoded size of a single event; larger events are dropped
    pub max_event_bytes: usize,

    /// Recursion depth for serialized object graphs; 0 stringifies
    /// composite values
    pub max_structure_depth: usize,

    /// HTTP timeout for deliveries
    pub http_timeout: Duration,

    /// Properties attached to every event
    #[serde(skip)]
    pub properties: Vec<ExtraProperty>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5341".to_string(),
            api_key: None,
            proxy_address: None,
            use_system_proxy: true,
            headers: Vec::new(),
            max_payload_bytes: 128 * 1024,
            max_event_bytes: 256 * 1024,
            max_structure_depth: 0,
            http_timeout: Duration::from_secs(30),
            properties: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(server_url) = env::var("SEQ_SERVER_URL") {
            config.server_url = server_url;
        }

        if let Ok(api_key) = env::var("SEQ_API_KEY") {
            if !api_key.is_empty() {
                config.api_key = Some(api_key);
            }
        }

        if let Ok(proxy_address) = env::var("SEQ_PROXY_ADDRESS") {
            if !proxy_address.is_empty() {
                config.proxy_address = Some(proxy_address);
            }
        }

        if let Ok(use_system_proxy) = env::var("SEQ_USE_SYSTEM_PROXY") {
            config.use_system_proxy = use_system_proxy.to_lowercase() != "false";
        }

        if let Ok(max_payload) = env::var("SEQ_MAX_PAYLOAD_BYTES") {
            if let Ok(bytes) = max_payload.parse() {
                config.max_payload_bytes = bytes;
            }
        }

        if let Ok(max_event) = env::var("SEQ_MAX_EVENT_BYTES") {
            if let Ok(bytes) = max_event.parse() {
                config.max_event_bytes = bytes;
            }
        }

        if let Ok(depth) = env::var("SEQ_STRUCTURE_DEPTH") {
            if let Ok(depth) = depth.parse() {
                config.max_structure_depth = depth;
            }
        }

        if let Ok(timeout) = env::var("SEQ_HTTP_TIMEOUT_SECONDS") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.http_timeout = Duration::from_secs(seconds);
            }
        }

        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.server_url.is_empty() {
            return Err("server_url cannot be empty".to_string());
        }

        if self.max_payload_bytes == 0 {
            return Err("max_payload_bytes must be greater than 0".to_string());
        }

        if self.max_event_bytes == 0 {
            return Err("max_event_bytes must be greater than 0".to_string());
        }

        for property in &self.properties {
            if property.name.is_empty() {
                return Err("property names cannot be empty".to_string());
            }
        }

        Ok(())
    }

    /// The bulk-ingestion endpoint derived from the server URL.
    pub fn ingestion_url(&self) -> String {
        let mut url = self.server_url.clone();
        if !url.ends_with('/') {
            url.push('/');
        }
        url.push_str("api/events/raw");
        url
    }
}
