//! Client configuration structures.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_IN_FLIGHT, DEFAULT_MAX_REBALANCE_RETRIES, DEFAULT_PORT};
use crate::error::{ConfigError, ConfigResult};

/// Client configuration.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use streamql_common::config::ClientConfig;
///
/// let config = ClientConfig::new()
///     .host("127.0.0.1")
///     .max_in_flight(4)
///     .request_timeout(Duration::from_secs(5));
/// assert_eq!(config.max_in_flight, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Engine host.
    pub host: String,

    /// Engine port.
    /// Default: 8088
    pub port: u16,

    /// Connect over HTTPS instead of plain HTTP.
    /// Default: false
    pub tls: bool,

    /// Time allowed to establish a connection.
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Deadline applied to a request when the caller supplies none.
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Ceiling of concurrent requests.
    /// Default: 10
    pub max_in_flight: usize,

    /// Rebalance retries allowed to a streaming read.
    /// Default: 5
    pub max_rebalance_retries: u32,

    /// Pause before a rebalanced streaming read is dispatched again.
    /// Default: 100ms
    #[serde(with = "humantime_serde")]
    pub rebalance_backoff: Duration,

    /// Username for basic authentication.
    pub username: Option<String>,

    /// Password for basic authentication (never serialized).
    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// Properties sent with every request.
    pub streams_properties: BTreeMap<String, String>,

    /// Relations declared up front.
    pub relations: Vec<RelationSettings>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            tls: false,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            max_rebalance_retries: DEFAULT_MAX_REBALANCE_RETRIES,
            rebalance_backoff: Duration::from_millis(100),
            username: None,
            password: None,
            streams_properties: BTreeMap::new(),
            relations: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Creates a new client configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Sets the host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enables or disables HTTPS.
    #[must_use]
    pub fn tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the default request deadline.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the in-flight ceiling.
    #[must_use]
    pub fn max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max;
        self
    }

    /// Sets the rebalance retry bound.
    #[must_use]
    pub fn max_rebalance_retries(mut self, retries: u32) -> Self {
        self.max_rebalance_retries = retries;
        self
    }

    /// Sets the pause before a rebalance retry.
    #[must_use]
    pub fn rebalance_backoff(mut self, backoff: Duration) -> Self {
        self.rebalance_backoff = backoff;
        self
    }

    /// Sets basic-auth credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Adds a property sent with every request.
    #[must_use]
    pub fn streams_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.streams_properties.insert(key.into(), value.into());
        self
    }

    /// Declares a relation.
    #[must_use]
    pub fn relation(mut self, settings: RelationSettings) -> Self {
        self.relations.push(settings);
        self
    }

    /// Returns `host:port`.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}", scheme, self.endpoint())
    }

    /// Looks up declared relation settings by name, ignoring case.
    #[must_use]
    pub fn relation_settings(&self, name: &str) -> Option<&RelationSettings> {
        self.relations
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "max_in_flight must be greater than 0".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than 0".to_string(),
            ));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(ConfigError::Invalid(
                "password given without username".to_string(),
            ));
        }
        for relation in &self.relations {
            relation.validate()?;
        }
        Ok(())
    }
}

/// Kind of a remote relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// An append-only stream.
    Stream,
    /// A changelog table keyed by its primary key.
    Table,
}

impl RelationKind {
    /// Returns the keyword used in statements.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            RelationKind::Stream => "STREAM",
            RelationKind::Table => "TABLE",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Settings for one relation, as declared by the surrounding tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSettings {
    /// Relation name.
    pub name: String,
    /// Stream or table.
    pub kind: RelationKind,
    /// Backing topic.
    #[serde(default)]
    pub topic: Option<String>,
    /// Topic partitions.
    #[serde(default)]
    pub partitions: Option<u32>,
    /// Topic replicas.
    #[serde(default)]
    pub replicas: Option<u16>,
    /// Value serialization format.
    #[serde(default)]
    pub value_format: Option<String>,
    /// Key serialization format.
    #[serde(default)]
    pub key_format: Option<String>,
    /// Column carrying the event time.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl RelationSettings {
    /// Creates settings with only a name and kind.
    pub fn new(name: impl Into<String>, kind: RelationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            topic: None,
            partitions: None,
            replicas: None,
            value_format: None,
            key_format: None,
            timestamp: None,
        }
    }

    /// Sets the backing topic.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Sets the partition count.
    #[must_use]
    pub fn partitions(mut self, partitions: u32) -> Self {
        self.partitions = Some(partitions);
        self
    }

    /// Sets the value format.
    #[must_use]
    pub fn value_format(mut self, format: impl Into<String>) -> Self {
        self.value_format = Some(format.into());
        self
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "relation name must not be empty".to_string(),
            ));
        }
        if self.partitions == Some(0) {
            return Err(ConfigError::Invalid(format!(
                "relation {} must have at least one partition",
                self.name
            )));
        }
        Ok(())
    }
}
