mod record;
mod config;
mod batch;
mod semaphore;
mod accumulator;
mod sender;
mod producer;
mod builder;

pub use self::accumulator::CollectBatch;
pub use self::batch::{BatchKey, ProduceOutcome, ProduceTask, ProducerCounters};
pub use self::builder::ProducerBuilder;
pub use self::config::{DEFAULT_ACK_TIMEOUT_MILLIS, DEFAULT_BATCH_MAX_DELAY_MILLIS,
                       DEFAULT_BATCH_SIZE, DEFAULT_REQUEST_PARALLELIZATION,
                       DEFAULT_STOP_TIMEOUT_MILLIS, ProducerConfig};
pub use self::producer::{KafkaProducer, Producer, SendRecords, Stop};
pub use self::record::{ProducerRecord, RecordMetadata};
pub use self::semaphore::Semaphore;
pub use self::sender::Sender;
