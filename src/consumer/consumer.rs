use std::rc::Rc;

use futures::unsync::mpsc;
use futures::{Async, Future, Poll, Stream};
use tokio_core::reactor::Handle;

use client::{BrokerRouter, ClientConfig, StaticBoxFuture, ToStaticBoxFuture};
use consumer::{ConsumerConfig, ConsumerRecord, Fetcher};
use errors::{Error, ErrorKind, Result};
use protocol::PartitionId;

/// A polling consumer: one fetch loop per subscribed partition, all
/// delivering into a single bounded stream.
#[derive(Clone)]
pub struct KafkaConsumer {
    inner: Rc<ConsumerInner>,
}

struct ConsumerInner {
    router: BrokerRouter,
    config: ConsumerConfig,
    fetcher: Fetcher,
}

impl KafkaConsumer {
    pub fn from_router(router: BrokerRouter) -> ConsumerBuilder {
        ConsumerBuilder {
            router: Some(router),
            handle: None,
            client_config: ClientConfig::default(),
            config: ConsumerConfig::default(),
        }
    }

    pub fn with_bootstrap_servers<I>(hosts: I, handle: Handle) -> ConsumerBuilder
        where I: IntoIterator<Item = String>
    {
        ConsumerBuilder {
            router: None,
            handle: Some(handle),
            client_config: ClientConfig::from_hosts(hosts),
            config: ConsumerConfig::default(),
        }
    }

    pub fn router(&self) -> &BrokerRouter {
        &self.inner.router
    }

    /// Consume an explicit set of partitions. Dropping the stream closes
    /// the delivery queue and winds the fetch loops down.
    pub fn partitions(&self, topic_name: &str, partitions: Vec<PartitionId>) -> ConsumerStream {
        let (tx, rx) = mpsc::channel(self.inner.config.consumer_buffer_size);

        for partition in partitions {
            self.inner
                .fetcher
                .spawn_partition(topic_name.to_owned(), partition, tx.clone());
        }

        ConsumerStream { rx: rx }
    }

    /// Consume every partition of a topic, refreshing metadata first to
    /// learn the layout.
    pub fn topic(&self, topic_name: &str) -> StaticBoxFuture<ConsumerStream> {
        let topic_name = topic_name.to_owned();
        let consumer = self.clone();

        self.inner
            .router
            .refresh_topic_metadata(vec![topic_name.clone()])
            .and_then(move |_| match consumer.inner.router.topic_partitions(&topic_name) {
                          Some(partitions) => Ok(consumer.partitions(&topic_name, partitions)),
                          None => {
                              bail!(ErrorKind::CachedMetadata(topic_name, None))
                          }
                      })
            .static_boxed()
    }
}

/// The record stream handed to the application; bounded, so a slow reader
/// back-pressures the fetch loops.
pub struct ConsumerStream {
    rx: mpsc::Receiver<ConsumerRecord>,
}

impl Stream for ConsumerStream {
    type Item = ConsumerRecord;
    type Error = Error;

    fn poll(&mut self) -> Poll<Option<Self::Item>, Self::Error> {
        match self.rx.poll() {
            Ok(Async::Ready(record)) => Ok(Async::Ready(record)),
            Ok(Async::NotReady) => Ok(Async::NotReady),
            Err(()) => Ok(Async::Ready(None)),
        }
    }
}

pub struct ConsumerBuilder {
    router: Option<BrokerRouter>,
    handle: Option<Handle>,
    client_config: ClientConfig,
    config: ConsumerConfig,
}

impl ConsumerBuilder {
    pub fn with_client_id<S: Into<String>>(mut self, client_id: S) -> Self {
        self.client_config.client_id = Some(client_id.into());
        self
    }

    pub fn with_consumer_buffer_size(mut self, size: usize) -> Self {
        self.config.consumer_buffer_size = size;
        self
    }

    pub fn with_backoff_interval(mut self, millis: u64) -> Self {
        self.config.backoff_interval = millis;
        self
    }

    pub fn with_fetch_buffer_size(mut self, bytes: i32) -> Self {
        self.config.fetch_buffer_size = bytes;
        self
    }

    pub fn with_min_bytes(mut self, min_bytes: i32) -> Self {
        self.config.min_bytes = min_bytes;
        self
    }

    pub fn with_max_wait_time(mut self, millis: u64) -> Self {
        self.config.max_wait_time_for_min_bytes = millis;
        self
    }

    pub fn with_auto_offset_reset(mut self, reset: ::consumer::AutoOffsetReset) -> Self {
        self.config.auto_offset_reset = reset;
        self
    }

    pub fn build(self) -> Result<KafkaConsumer> {
        let router = match self.router {
            Some(router) => router,
            None => {
                let handle = self.handle
                    .ok_or_else(|| ErrorKind::Msg("missing reactor handle".to_owned()))?;

                BrokerRouter::from_config(self.client_config, handle)?
            }
        };

        let fetcher = Fetcher::new(router.clone(), self.config.clone());

        Ok(KafkaConsumer {
               inner: Rc::new(ConsumerInner {
                                  router: router,
                                  config: self.config,
                                  fetcher: fetcher,
                              }),
           })
    }
}
