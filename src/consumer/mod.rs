mod config;
mod fetcher;
mod consumer;

pub use self::config::{AutoOffsetReset, ConsumerConfig, DEFAULT_BACKOFF_INTERVAL_MILLIS,
                       DEFAULT_CONSUMER_BUFFER_SIZE, DEFAULT_FETCH_BUFFER_MULTIPLIER,
                       DEFAULT_FETCH_BUFFER_SIZE, DEFAULT_MAX_WAIT_TIME_MILLIS,
                       DEFAULT_MIN_BYTES};
pub use self::consumer::{ConsumerBuilder, ConsumerStream, KafkaConsumer};
pub use self::fetcher::{ConsumerRecord, Fetcher};
