//! Driver option groups of `CassandraConfig`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use scylla::client::{Compression, PoolSize};
use scylla::policies::address_translator::AddressTranslator;
use scylla::statement::{Consistency, SerialConsistency};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::{Validate, ValidationError};

/// Transport compression
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CompressionSetting {
    #[default]
    None,
    Lz4,
    Snappy,
}

impl CompressionSetting {
    pub fn to_driver(self) -> Option<Compression> {
        match self {
            Self::None => None,
            Self::Lz4 => Some(Compression::Lz4),
            Self::Snappy => Some(Compression::Snappy),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ConsistencyLevel {
    Any,
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    LocalOne,
}

impl From<ConsistencyLevel> for Consistency {
    fn from(level: ConsistencyLevel) -> Self {
        match level {
            ConsistencyLevel::Any => Consistency::Any,
            ConsistencyLevel::One => Consistency::One,
            ConsistencyLevel::Two => Consistency::Two,
            ConsistencyLevel::Three => Consistency::Three,
            ConsistencyLevel::Quorum => Consistency::Quorum,
            ConsistencyLevel::All => Consistency::All,
            ConsistencyLevel::LocalQuorum => Consistency::LocalQuorum,
            ConsistencyLevel::EachQuorum => Consistency::EachQuorum,
            ConsistencyLevel::LocalOne => Consistency::LocalOne,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum SerialConsistencyLevel {
    Serial,
    LocalSerial,
}

impl From<SerialConsistencyLevel> for SerialConsistency {
    fn from(level: SerialConsistencyLevel) -> Self {
        match level {
            SerialConsistencyLevel::Serial => SerialConsistency::Serial,
            SerialConsistencyLevel::LocalSerial => SerialConsistency::LocalSerial,
        }
    }
}

/// Credentials sent during connection setup
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AuthProvider {
    PlainText { username: String, password: String },
}

impl fmt::Debug for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlainText { username, .. } => f
                .debug_struct("PlainText")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Connection pool sizing. At most one of the two may be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_pool_size"))]
pub struct PoolingOptions {
    #[serde(default)]
    pub connections_per_host: Option<usize>,
    /// Shard-aware pooling; only meaningful against ScyllaDB
    #[serde(default)]
    pub connections_per_shard: Option<usize>,
}

fn validate_pool_size(options: &PoolingOptions) -> Result<(), ValidationError> {
    match (options.connections_per_host, options.connections_per_shard) {
        (Some(_), Some(_)) => Err(ValidationError::new("pool_size_conflict").with_message(
            "connectionsPerHost and connectionsPerShard are mutually exclusive".into(),
        )),
        (Some(0), _) | (_, Some(0)) => Err(ValidationError::new("pool_size_zero")
            .with_message("pool size must be positive".into())),
        _ => Ok(()),
    }
}

impl PoolingOptions {
    /// The driver pool size; `None` keeps the driver default.
    pub fn pool_size(&self) -> Option<PoolSize> {
        if let Some(per_host) = self.connections_per_host.and_then(NonZeroUsize::new) {
            return Some(PoolSize::PerHost(per_host));
        }
        self.connections_per_shard
            .and_then(NonZeroUsize::new)
            .map(PoolSize::PerShard)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    #[serde(default)]
    pub consistency: Option<ConsistencyLevel>,
    #[serde(default)]
    pub serial_consistency: Option<SerialConsistencyLevel>,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub request_timeout_ms: Option<u64>,
}

impl QueryOptions {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SocketOptions {
    #[serde(default = "default_connect_timeout_ms")]
    #[validate(range(min = 1))]
    pub connect_timeout_ms: u64,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub keepalive_interval_ms: Option<u64>,
    #[serde(default = "default_tcp_nodelay")]
    pub tcp_nodelay: bool,
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_tcp_nodelay() -> bool {
    true
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            keepalive_interval_ms: None,
            tcp_nodelay: default_tcp_nodelay(),
        }
    }
}

impl SocketOptions {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn keepalive_interval(&self) -> Option<Duration> {
        self.keepalive_interval_ms.map(Duration::from_millis)
    }
}

/// Rewrites the addresses nodes advertise, e.g. private to public IPs.
///
/// ```json
/// { "type": "static", "addresses": { "10.0.0.1:9042": "203.0.113.1:9042" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AddressTranslatorFactory {
    /// Connect to the addresses nodes advertise
    #[default]
    Identity,
    /// Translate through a fixed table; peers missing from it fail translation
    Static { addresses: BTreeMap<String, String> },
}

impl AddressTranslatorFactory {
    /// The translation table; empty for `Identity`.
    pub fn address_map(&self) -> Result<HashMap<SocketAddr, SocketAddr>, ValidationError> {
        let Self::Static { addresses } = self else {
            return Ok(HashMap::new());
        };
        addresses
            .iter()
            .map(|(from, to)| Ok((socket_addr(from)?, socket_addr(to)?)))
            .collect()
    }

    /// The driver translator; `None` keeps the driver's identity behaviour.
    pub fn build(&self) -> Result<Option<Arc<dyn AddressTranslator>>, ValidationError> {
        match self {
            Self::Identity => Ok(None),
            Self::Static { .. } => {
                let translator: Arc<dyn AddressTranslator> = Arc::new(self.address_map()?);
                Ok(Some(translator))
            }
        }
    }
}

fn socket_addr(address: &str) -> Result<SocketAddr, ValidationError> {
    address.trim().parse().map_err(|_| {
        ValidationError::new("invalid_socket_address")
            .with_message(format!("`{address}` is not an ip:port address").into())
    })
}
