mod version;
mod config;
mod future;
mod metrics;
mod metadata;
mod selector;
mod router;
mod dispatcher;

pub use self::config::{ClientConfig, DEFAULT_CACHE_EXPIRATION_MILLIS,
                       DEFAULT_MAX_FRAME_SIZE, DEFAULT_REFRESH_TIMEOUT_MILLIS,
                       DEFAULT_REQUEST_TIMEOUT_MILLS, RetryPolicy, ToMilliseconds};
pub use self::dispatcher::{RequestDispatcher, SendOperation};
pub use self::future::{StaticBoxFuture, ToStaticBoxFuture, with_deadline};
pub use self::metadata::{BrokerRef, CachedGroup, CachedTopic};
pub use self::metrics::Metrics;
pub use self::router::{BrokerRouter, FetchOffsets, GroupRouteFuture, PartitionOffset,
                       RefreshMetadata, Route, RouteFuture};
pub use self::selector::{DefaultPartitionSelector, PartitionSelector};
pub use self::version::KafkaVersion;
