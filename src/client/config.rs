use std::iter;
use std::time::Duration;

use tokio_retry::strategy::{ExponentialBackoff, FixedInterval, jitter};
use tokio_timer::{self, Timer};

use client::KafkaVersion;

/// Freshness window of a cached metadata entry.
pub const DEFAULT_CACHE_EXPIRATION_MILLIS: u64 = 10;

/// Deadline of a single metadata round-trip.
pub const DEFAULT_REFRESH_TIMEOUT_MILLIS: u64 = 200_000;

/// Deadline of an ordinary correlated request.
pub const DEFAULT_REQUEST_TIMEOUT_MILLS: u64 = 30_000;

/// Ceiling on a single frame; anything larger fails the connection.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 32 * 1024 * 1024;

pub trait ToMilliseconds {
    fn as_millis(&self) -> u64;
}

impl ToMilliseconds for Duration {
    fn as_millis(&self) -> u64 {
        self.as_secs() * 1000 + u64::from(self.subsec_nanos()) / 1_000_000
    }
}

/// How often a failed operation is reattempted and with what delays.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// A single attempt, errors surface immediately.
    None,
    /// `attempts` total tries with a fixed `backoff` (ms) between them and
    /// no bound on the elapsed time.
    Fixed { attempts: usize, backoff: u64 },
    /// `attempts` total tries backed off exponentially from `base` (ms).
    Exponential { attempts: usize, base: u64 },
}

impl RetryPolicy {
    /// Delays to apply before the 2nd and later attempts.
    pub fn delays(&self) -> Box<Iterator<Item = Duration>> {
        match *self {
            RetryPolicy::None => Box::new(iter::empty()),
            RetryPolicy::Fixed { attempts, backoff } => {
                Box::new(FixedInterval::new(Duration::from_millis(backoff))
                             .take(attempts.saturating_sub(1)))
            }
            RetryPolicy::Exponential { attempts, base } => {
                Box::new(ExponentialBackoff::from_millis(base)
                             .map(jitter)
                             .take(attempts.saturating_sub(1)))
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Fixed {
            attempts: 3,
            backoff: 100,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Seed `host:port` pairs used to bootstrap the cluster topology.
    pub hosts: Vec<String>,

    /// An id string to pass to the server when making requests.
    pub client_id: Option<String>,

    /// How long a cached metadata entry counts as fresh, in milliseconds.
    pub cache_expiration: u64,

    /// Deadline of a single metadata fetch attempt, in milliseconds.
    pub refresh_timeout: u64,

    /// Retry schedule for metadata fetches.
    pub refresh_retry: RetryPolicy,

    /// Deadline of a correlated request, in milliseconds; 0 disables it.
    pub request_timeout: u64,

    /// Largest frame the connection will read or write.
    pub max_frame_size: usize,

    /// Broker version assumed when picking request versions.
    pub broker_version_fallback: KafkaVersion,

    /// Register prometheus metrics.
    pub metrics: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            hosts: Vec::new(),
            client_id: None,
            cache_expiration: DEFAULT_CACHE_EXPIRATION_MILLIS,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT_MILLIS,
            refresh_retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT_MILLS,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            broker_version_fallback: KafkaVersion::default(),
            metrics: false,
        }
    }
}

impl ClientConfig {
    pub fn from_hosts<I>(hosts: I) -> Self
        where I: IntoIterator<Item = String>
    {
        ClientConfig {
            hosts: hosts.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn cache_expiration(&self) -> Duration {
        Duration::from_millis(self.cache_expiration)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }

    pub fn timer(&self) -> Timer {
        tokio_timer::wheel()
            .tick_duration(Duration::from_millis(10))
            .build()
    }
}
