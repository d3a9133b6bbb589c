use tokio_core::reactor::Handle;

use client::{BrokerRouter, ClientConfig};
use compression::Compression;
use errors::{ErrorKind, Result};
use producer::{KafkaProducer, ProducerConfig};
use protocol::RequiredAcks;

/// Assembles a [`KafkaProducer`] over an existing router or a fresh one
/// bootstrapped from seed hosts.
pub struct ProducerBuilder {
    router: Option<BrokerRouter>,
    handle: Option<Handle>,
    client_config: ClientConfig,
    config: ProducerConfig,
}

impl ProducerBuilder {
    pub fn from_router(router: BrokerRouter) -> Self {
        ProducerBuilder {
            router: Some(router),
            handle: None,
            client_config: ClientConfig::default(),
            config: ProducerConfig::default(),
        }
    }

    pub fn with_bootstrap_servers<I>(hosts: I, handle: Handle) -> Self
        where I: IntoIterator<Item = String>
    {
        ProducerBuilder {
            router: None,
            handle: Some(handle),
            client_config: ClientConfig::from_hosts(hosts),
            config: ProducerConfig::default(),
        }
    }

    pub fn with_client_id<S: Into<String>>(mut self, client_id: S) -> Self {
        self.client_config.client_id = Some(client_id.into());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn with_batch_max_delay(mut self, millis: u64) -> Self {
        self.config.batch_max_delay = millis;
        self
    }

    pub fn with_request_parallelization(mut self, permits: usize) -> Self {
        self.config.request_parallelization = permits;
        self
    }

    pub fn with_stop_timeout(mut self, millis: u64) -> Self {
        self.config.stop_timeout = millis;
        self
    }

    pub fn with_required_acks(mut self, required_acks: RequiredAcks) -> Self {
        self.config.required_acks = required_acks;
        self
    }

    pub fn with_ack_timeout(mut self, millis: u64) -> Self {
        self.config.ack_timeout = millis;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.config.compression = compression;
        self
    }

    pub fn build(self) -> Result<KafkaProducer> {
        if self.config.request_parallelization == 0 {
            bail!(ErrorKind::Msg("request_parallelization must be positive".to_owned()));
        }

        let router = match self.router {
            Some(router) => router,
            None => {
                let handle = self.handle
                    .ok_or_else(|| ErrorKind::Msg("missing reactor handle".to_owned()))?;

                BrokerRouter::from_config(self.client_config, handle)?
            }
        };

        Ok(KafkaProducer::new(router, self.config))
    }
}
