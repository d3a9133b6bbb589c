use std::cell::RefCell;
use std::rc::Rc;

use futures::future::{self, Future};
use futures::unsync::mpsc::{self, UnboundedSender};
use futures::unsync::oneshot;

use client::{BrokerRouter, StaticBoxFuture, ToStaticBoxFuture, with_deadline};
use errors::{Error, ErrorKind};
use producer::{ProduceOutcome, ProduceTask, ProducerBuilder, ProducerConfig, ProducerCounters,
               ProducerRecord, Sender};

/// The per-call future: one outcome per record, in the order they were
/// handed in. Partial failures stay per-record.
pub type SendRecords = StaticBoxFuture<Vec<ProduceOutcome>>;

pub type Stop = StaticBoxFuture<()>;

pub trait Producer {
    /// Enqueue records for delivery; the future resolves once every record
    /// has an outcome.
    fn send(&self, records: Vec<ProducerRecord>) -> SendRecords;

    /// Close the queue and wait for the batcher to drain, bounded by
    /// `stop_timeout`. A second call is a no-op.
    fn stop(&self) -> Stop;
}

/// The batching producer: an unbounded record queue drained by one batcher
/// task, with per-record completion slots.
#[derive(Clone)]
pub struct KafkaProducer {
    inner: Rc<ProducerInner>,
}

struct ProducerInner {
    config: ProducerConfig,
    router: BrokerRouter,
    counters: Rc<ProducerCounters>,
    state: RefCell<ProducerState>,
}

struct ProducerState {
    tx: Option<UnboundedSender<ProduceTask>>,
    done: Option<oneshot::Receiver<()>>,
    stopped: bool,
}

impl KafkaProducer {
    pub fn from_router(router: BrokerRouter) -> ProducerBuilder {
        ProducerBuilder::from_router(router)
    }

    pub fn with_bootstrap_servers<I>(hosts: I,
                                     handle: ::tokio_core::reactor::Handle)
                                     -> ProducerBuilder
        where I: IntoIterator<Item = String>
    {
        ProducerBuilder::with_bootstrap_servers(hosts, handle)
    }

    pub(crate) fn new(router: BrokerRouter, config: ProducerConfig) -> Self {
        let counters = Rc::new(ProducerCounters::default());
        let (tx, rx) = mpsc::unbounded();

        let sender = Sender::new(router.clone(), config.clone(), Rc::clone(&counters));
        let done = sender.spawn(rx);

        KafkaProducer {
            inner: Rc::new(ProducerInner {
                               config: config,
                               router: router,
                               counters: counters,
                               state: RefCell::new(ProducerState {
                                                       tx: Some(tx),
                                                       done: Some(done),
                                                       stopped: false,
                                                   }),
                           }),
        }
    }

    pub fn router(&self) -> &BrokerRouter {
        &self.inner.router
    }

    /// Records between enqueue and completion.
    pub fn sending_count(&self) -> usize {
        self.inner.counters.sending()
    }

    /// Produce requests currently on the wire.
    pub fn in_flight_count(&self) -> usize {
        self.inner.counters.in_flight()
    }
}

impl Producer for KafkaProducer {
    fn send(&self, records: Vec<ProducerRecord>) -> SendRecords {
        let tx = match self.inner.state.borrow().tx {
            Some(ref tx) => tx.clone(),
            None => return StaticBoxFuture::err(ErrorKind::Canceled("producer stopped").into()),
        };

        let config = &self.inner.config;
        let mut receivers = Vec::with_capacity(records.len());

        for record in records {
            let (task, receiver) = ProduceTask::new(record,
                                                    config.required_acks,
                                                    config.ack_timeout,
                                                    config.compression);

            self.inner.counters.record_enqueued();

            if let Err(err) = tx.unbounded_send(task) {
                // the queue closed under us
                self.inner.counters.record_resolved();
                err.into_inner()
                    .complete(Err(ErrorKind::Canceled("producer stopped").into()));
            }

            receivers.push(receiver);
        }

        let outcomes = receivers
            .into_iter()
            .map(|receiver| {
                     receiver.then(|result| {
                                       Ok::<ProduceOutcome, Error>(match result {
                                           Ok(outcome) => outcome,
                                           Err(_canceled) => {
                                               Err(ErrorKind::Canceled("record dropped").into())
                                           }
                                       })
                                   })
                 });

        future::join_all(outcomes.collect::<Vec<_>>()).static_boxed()
    }

    fn stop(&self) -> Stop {
        let done = {
            let mut state = self.inner.state.borrow_mut();

            if state.stopped {
                return StaticBoxFuture::ok(());
            }

            state.stopped = true;

            // closing the queue lets the batcher drain one last batch
            drop(state.tx.take());

            state.done.take()
        };

        debug!("stopping producer");

        match done {
            Some(done) => {
                let drained = done.map_err(|_canceled| {
                    Error::from(ErrorKind::Canceled("batcher gone"))
                });

                with_deadline(drained,
                              self.inner.config.stop_timeout(),
                              self.inner.router.handle(),
                              "producer drain")
                        .then(|result| {
                                  if let Err(err) = result {
                                      warn!("producer stopped before draining, {}", err);
                                  }

                                  Ok(())
                              })
                        .static_boxed()
            }
            None => StaticBoxFuture::ok(()),
        }
    }
}
