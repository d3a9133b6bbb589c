//! An asynchronous Kafka client.
//!
//! Speaks the Kafka wire protocol over per-broker connections that
//! multiplex many in-flight requests by correlation id, routes requests
//! through a lazily refreshed topology cache, batches produced records and
//! polls partitions for consumption.

#![recursion_limit = "128"]

#![cfg_attr(feature = "clippy", feature(plugin))]
#![cfg_attr(feature = "clippy", plugin(clippy))]

#[macro_use]
extern crate log;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate lazy_static;
extern crate bytes;
#[macro_use]
extern crate nom;
extern crate byteorder;
extern crate crc;
extern crate hexplay;
extern crate prometheus;
extern crate rand;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate time;
extern crate twox_hash;

extern crate futures;
extern crate tokio_core;
extern crate tokio_io;
extern crate tokio_retry;
extern crate tokio_service;
extern crate tokio_timer;

#[cfg(feature = "gzip")]
extern crate flate2;
#[cfg(feature = "snappy")]
extern crate snap;
#[cfg(feature = "lz4")]
extern crate lz4_compress;

#[cfg(feature = "encoding")]
extern crate encoding;
#[cfg(feature = "json")]
extern crate serde_json;

#[cfg(test)]
extern crate pretty_env_logger;

#[macro_use]
pub mod errors;
mod compression;
#[macro_use]
mod protocol;
mod network;
mod client;
mod producer;
mod consumer;
mod serialization;

pub mod consts {
    pub use client::{DEFAULT_CACHE_EXPIRATION_MILLIS, DEFAULT_MAX_FRAME_SIZE,
                     DEFAULT_REFRESH_TIMEOUT_MILLIS, DEFAULT_REQUEST_TIMEOUT_MILLS};
    pub use consumer::{DEFAULT_BACKOFF_INTERVAL_MILLIS, DEFAULT_CONSUMER_BUFFER_SIZE,
                       DEFAULT_FETCH_BUFFER_MULTIPLIER, DEFAULT_FETCH_BUFFER_SIZE,
                       DEFAULT_MAX_WAIT_TIME_MILLIS, DEFAULT_MIN_BYTES};
    pub use producer::{DEFAULT_ACK_TIMEOUT_MILLIS, DEFAULT_BATCH_MAX_DELAY_MILLIS,
                       DEFAULT_BATCH_SIZE, DEFAULT_REQUEST_PARALLELIZATION,
                       DEFAULT_STOP_TIMEOUT_MILLIS};
}

pub use client::{BrokerRef, BrokerRouter, ClientConfig, DefaultPartitionSelector, KafkaVersion,
                 Metrics, PartitionOffset, PartitionSelector, RequestDispatcher, RetryPolicy,
                 Route, StaticBoxFuture, ToMilliseconds, ToStaticBoxFuture};
pub use compression::Compression;
pub use consumer::{AutoOffsetReset, ConsumerBuilder, ConsumerConfig, ConsumerRecord,
                   ConsumerStream, KafkaConsumer};
pub use errors::{Error, ErrorKind};
pub use network::{Endpoint, KafkaConnection, KafkaConnector, SendRequest, TopicPartition};
pub use producer::{KafkaProducer, Producer, ProducerBuilder, ProducerConfig, ProducerRecord,
                   RecordMetadata, SendRecords};
pub use protocol::{ApiKeys, FetchOffset, FetchPartition, FetchRequest, FetchTopic, KafkaCode,
                   KafkaCodec, KafkaRequest, KafkaResponse, Message, MessageSet,
                   MessageSetEncoder, MessageTimestamp, Offset, PartitionId,
                   ProducePartitionData, ProduceRequest, ProduceTopicData, RequestHeader,
                   RequiredAcks, Timestamp};
pub use serialization::{BytesDeserializer, BytesSerializer, Deserializer, NoopDeserializer,
                        NoopSerializer, RawDeserializer, RawSerializer, Serializer,
                        StringDeserializer, StringSerializer};

#[cfg(feature = "encoding")]
pub use serialization::{StrEncodingDeserializer, StrEncodingSerializer};
#[cfg(feature = "json")]
pub use serialization::{JsonDeserializer, JsonSerializer};
