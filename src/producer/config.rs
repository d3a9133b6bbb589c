use std::time::Duration;

use compression::Compression;
use protocol::RequiredAcks;

/// Most records a batcher pass will pull off the queue.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// How long a partially filled batch may linger before it is flushed.
pub const DEFAULT_BATCH_MAX_DELAY_MILLIS: u64 = 100;

/// Produce requests allowed on the wire at once.
pub const DEFAULT_REQUEST_PARALLELIZATION: usize = 5;

/// How long `stop` waits for the batcher to drain.
pub const DEFAULT_STOP_TIMEOUT_MILLIS: u64 = 5_000;

/// Ack deadline handed to the broker inside each produce request.
pub const DEFAULT_ACK_TIMEOUT_MILLIS: u64 = 1_000;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub batch_size: usize,

    /// Milliseconds a partial batch may wait for more records.
    pub batch_max_delay: u64,

    /// Cap on concurrent produce requests; the batcher blocks past it.
    pub request_parallelization: usize,

    /// Milliseconds `stop` waits for the final drain.
    pub stop_timeout: u64,

    pub required_acks: RequiredAcks,

    /// Milliseconds the broker may spend collecting acknowledgements.
    pub ack_timeout: u64,

    pub compression: Compression,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        ProducerConfig {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_max_delay: DEFAULT_BATCH_MAX_DELAY_MILLIS,
            request_parallelization: DEFAULT_REQUEST_PARALLELIZATION,
            stop_timeout: DEFAULT_STOP_TIMEOUT_MILLIS,
            required_acks: RequiredAcks::default(),
            ack_timeout: DEFAULT_ACK_TIMEOUT_MILLIS,
            compression: Compression::default(),
        }
    }
}

impl ProducerConfig {
    pub fn batch_max_delay(&self) -> Duration {
        Duration::from_millis(self.batch_max_delay)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProducerConfig::default();

        assert_eq!(config.batch_size, 64);
        assert_eq!(config.batch_max_delay(), Duration::from_millis(100));
        assert_eq!(config.request_parallelization, 5);
        assert_eq!(config.required_acks, RequiredAcks::One);
        assert_eq!(config.compression, Compression::None);
    }
}
