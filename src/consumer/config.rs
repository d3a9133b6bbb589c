use std::cmp;
use std::time::Duration;

use protocol::FetchOffset;

/// Capacity of the bounded queue records are delivered through; a slow
/// consumer suspends the fetch loops once it fills.
pub const DEFAULT_CONSUMER_BUFFER_SIZE: usize = 50;

/// Pause after an empty or failed fetch.
pub const DEFAULT_BACKOFF_INTERVAL_MILLIS: u64 = 1_000;

/// Starting per-partition fetch buffer.
pub const DEFAULT_FETCH_BUFFER_SIZE: i32 = 4096;

/// Growth factor applied on a buffer underrun.
pub const DEFAULT_FETCH_BUFFER_MULTIPLIER: f32 = 1.5;

pub const DEFAULT_MIN_BYTES: i32 = 1;

/// How long the broker may hold a fetch waiting for `min_bytes`.
pub const DEFAULT_MAX_WAIT_TIME_MILLIS: u64 = 100;

/// Offset, size and header fields of a single message.
const MESSAGE_HEADER_OVERHEAD: i32 = 26;

/// Where a partition starts when no position is known yet.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoOffsetReset {
    Earliest,
    Latest,
}

impl Default for AutoOffsetReset {
    fn default() -> Self {
        AutoOffsetReset::Latest
    }
}

impl From<AutoOffsetReset> for FetchOffset {
    fn from(reset: AutoOffsetReset) -> Self {
        match reset {
            AutoOffsetReset::Earliest => FetchOffset::Earliest,
            AutoOffsetReset::Latest => FetchOffset::Latest,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Bounded capacity of the delivery queue.
    pub consumer_buffer_size: usize,

    /// Milliseconds to pause after an empty or failed fetch.
    pub backoff_interval: u64,

    /// Initial `max_bytes` of a partition fetch.
    pub fetch_buffer_size: i32,

    /// Factor the fetch buffer grows by on underrun.
    pub fetch_buffer_multiplier: f32,

    /// Minimum bytes the broker should accumulate before answering.
    pub min_bytes: i32,

    /// Milliseconds the broker may wait for `min_bytes`.
    pub max_wait_time_for_min_bytes: u64,

    pub auto_offset_reset: AutoOffsetReset,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        ConsumerConfig {
            consumer_buffer_size: DEFAULT_CONSUMER_BUFFER_SIZE,
            backoff_interval: DEFAULT_BACKOFF_INTERVAL_MILLIS,
            fetch_buffer_size: DEFAULT_FETCH_BUFFER_SIZE,
            fetch_buffer_multiplier: DEFAULT_FETCH_BUFFER_MULTIPLIER,
            min_bytes: DEFAULT_MIN_BYTES,
            max_wait_time_for_min_bytes: DEFAULT_MAX_WAIT_TIME_MILLIS,
            auto_offset_reset: AutoOffsetReset::default(),
        }
    }
}

impl ConsumerConfig {
    pub fn backoff_interval(&self) -> Duration {
        Duration::from_millis(self.backoff_interval)
    }

    pub fn fallback_position(&self) -> FetchOffset {
        self.auto_offset_reset.into()
    }

    /// The buffer a retry should use after an underrun: the configured
    /// growth plus header overhead, or the size the broker said it needs,
    /// whichever is larger.
    pub fn grown_buffer(&self, current: i32, required: Option<usize>) -> i32 {
        let grown = (current as f32 * self.fetch_buffer_multiplier) as i32 +
                    MESSAGE_HEADER_OVERHEAD;

        cmp::max(grown, required.unwrap_or(0) as i32)
    }
}
