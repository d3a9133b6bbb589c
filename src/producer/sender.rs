use std::borrow::Cow;
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::{self, Future, Loop};
use futures::unsync::mpsc::UnboundedReceiver;
use futures::unsync::oneshot;

use client::{BrokerRouter, StaticBoxFuture, ToStaticBoxFuture};
use compression::Compression;
use errors::{self, Error, ErrorKind};
use network::KafkaConnection;
use producer::{BatchKey, CollectBatch, ProduceOutcome, ProduceTask, ProducerConfig,
               ProducerCounters, RecordMetadata, Semaphore};
use producer::semaphore::Permit;
use protocol::{ApiKeys, ApiVersion, KafkaCode, KafkaRequest, KafkaResponse, Message, MessageSet,
               MessageTimestamp, Offset, PartitionId, ProducePartitionData, ProduceRequest,
               ProduceTopicData, RequestHeader};

/// The long-running batcher: collects queued records, fans them out by
/// codec, ack level and leader endpoint, and keeps at most
/// `request_parallelization` produce requests on the wire.
#[derive(Clone)]
pub struct Sender {
    inner: Rc<SenderInner>,
}

struct SenderInner {
    router: BrokerRouter,
    config: ProducerConfig,
    semaphore: Semaphore,
    counters: Rc<ProducerCounters>,
    message_version: ApiVersion,
    produce_api_version: ApiVersion,
    client_id: Option<Cow<'static, str>>,
}

struct EndpointBatch {
    connection: KafkaConnection,
    tasks_by_tp: HashMap<(String, PartitionId), Vec<ProduceTask>>,
}

impl Sender {
    pub fn new(router: BrokerRouter,
               config: ProducerConfig,
               counters: Rc<ProducerCounters>)
               -> Self {
        let fallback = router.config().broker_version_fallback;
        let client_id = router.config().client_id.clone().map(Cow::from);
        let semaphore = Semaphore::new(config.request_parallelization);

        Sender {
            inner: Rc::new(SenderInner {
                               router: router,
                               config: config,
                               semaphore: semaphore,
                               counters: counters,
                               message_version: fallback.message_version(),
                               produce_api_version: fallback.produce_api_version(),
                               client_id: client_id,
                           }),
        }
    }

    /// Start the batcher loop on the reactor; the returned receiver fires
    /// once the queue has closed and the final batch drained.
    pub fn spawn(&self, rx: UnboundedReceiver<ProduceTask>) -> oneshot::Receiver<()> {
        let (done_tx, done_rx) = oneshot::channel();

        let sender = self.clone();
        let handle = self.inner.router.handle().clone();
        let spawn_handle = handle.clone();

        let work = future::loop_fn((rx, done_tx), move |(rx, done_tx)| {
            let sender = sender.clone();
            let collect = CollectBatch::new(rx,
                                            handle.clone(),
                                            Rc::clone(&sender.inner.counters),
                                            sender.inner.config.batch_size,
                                            sender.inner.config.batch_max_delay());

            collect.and_then(move |(batch, rx, _closed)| {
                let flush = if batch.is_empty() {
                    StaticBoxFuture::ok(())
                } else {
                    sender.flush_batch(batch)
                };

                flush.then(move |result| {
                    if let Err(err) = result {
                        warn!("batch flush failed, {}", err);
                    }

                    match rx {
                        Some(rx) => Ok::<_, Error>(Loop::Continue((rx, done_tx))),
                        None => {
                            debug!("producer queue closed, batcher exiting");

                            let _ = done_tx.send(());

                            Ok(Loop::Break(()))
                        }
                    }
                })
            })
        });

        spawn_handle.spawn(work.map_err(|err| {
                                            warn!("batcher failed, {}", err);
                                        }));

        done_rx
    }

    /// One pass: refresh metadata for the touched topics (best effort, the
    /// cache absorbs repeats), then group and send.
    fn flush_batch(&self, tasks: Vec<ProduceTask>) -> StaticBoxFuture<()> {
        let mut topics: Vec<String> = tasks
            .iter()
            .map(|task| task.record.topic_name.clone())
            .collect();

        topics.sort();
        topics.dedup();

        debug!("flushing batch of {} record(s) across {} topic(s)",
               tasks.len(),
               topics.len());

        let inner = Rc::clone(&self.inner);

        self.inner
            .router
            .refresh_topic_metadata(topics)
            .then(move |result| {
                      if let Err(err) = result {
                          warn!("metadata refresh before flush failed, {}", err);
                      }

                      dispatch_batch(inner, tasks)
                  })
            .static_boxed()
    }
}

/// Resolve a route per record, group by `(codec, acks, timeout, endpoint)`,
/// then acquire one in-flight permit per group before the request leaves.
/// The returned future resolves once every group holds its permit, which is
/// what stalls the batcher when the wire is saturated.
fn dispatch_batch(inner: Rc<SenderInner>, tasks: Vec<ProduceTask>) -> StaticBoxFuture<()> {
    let mut groups: HashMap<BatchKey, EndpointBatch> = HashMap::new();

    for task in tasks {
        if task.is_canceled() {
            inner.resolve(task, Err(ErrorKind::Canceled("record canceled").into()));
            continue;
        }

        let route = match task.record.partition {
            Some(partition) => inner.router.topic_route(&task.record.topic_name, partition),
            None => {
                inner
                    .router
                    .topic_route_for_key(&task.record.topic_name,
                                         task.record.key.as_ref().map(|key| &key[..]))
            }
        };

        match route {
            Err(err) => {
                warn!("no route for record to topic `{}`, {}",
                      task.record.topic_name,
                      err);

                inner.resolve(task, Err(err));
            }
            Ok(route) => {
                let key = BatchKey {
                    compression: task.compression,
                    required_acks: task.required_acks as i16,
                    ack_timeout: task.ack_timeout,
                    endpoint: route.connection.endpoint().clone(),
                };

                groups
                    .entry(key)
                    .or_insert_with(|| {
                                        EndpointBatch {
                                            connection: route.connection.clone(),
                                            tasks_by_tp: HashMap::new(),
                                        }
                                    })
                    .tasks_by_tp
                    .entry((route.topic_name, route.partition))
                    .or_insert_with(Vec::new)
                    .push(task);
            }
        }
    }

    let acquires: Vec<_> = groups
        .into_iter()
        .map(|(key, group)| {
                 let send_inner = Rc::clone(&inner);

                 inner
                     .semaphore
                     .acquire()
                     .map(move |permit| spawn_send(send_inner, permit, key, group))
             })
        .collect();

    future::join_all(acquires).map(|_| ()).static_boxed()
}

fn spawn_send(inner: Rc<SenderInner>, permit: Permit, key: BatchKey, group: EndpointBatch) {
    let request = build_request(&inner, &key, &group.tasks_by_tp);

    debug!("sending produce request with {} payload(s) to {}",
           group.tasks_by_tp.len(),
           key.endpoint);

    inner.counters.request_started();

    if let Some(metrics) = inner.router.metrics() {
        metrics.produce_started();
    }

    let handle = inner.router.handle().clone();
    let tasks_by_tp = group.tasks_by_tp;

    let work = group
        .connection
        .send(KafkaRequest::Produce(request))
        .then(move |result| {
                  inner.counters.request_finished();

                  if let Some(metrics) = inner.router.metrics() {
                      metrics.produce_finished();
                  }

                  inner.complete_batch(tasks_by_tp, result);

                  drop(permit);

                  Ok::<(), ()>(())
              });

    handle.spawn(work);
}

fn build_request(inner: &SenderInner,
                 key: &BatchKey,
                 tasks_by_tp: &HashMap<(String, PartitionId), Vec<ProduceTask>>)
                 -> ProduceRequest<'static> {
    let mut topics: HashMap<String, Vec<ProducePartitionData>> = HashMap::new();

    for (&(ref topic_name, partition), tasks) in tasks_by_tp {
        let messages = tasks
            .iter()
            .enumerate()
            .map(|(i, task)| {
                Message {
                    offset: i as Offset,
                    timestamp: match task.record.timestamp {
                        Some(ts) => Some(MessageTimestamp::CreateTime(ts)),
                        None if inner.message_version > 0 => Some(MessageTimestamp::default()),
                        None => None,
                    },
                    compression: Compression::None,
                    key: task.record.key.clone(),
                    value: task.record.value.clone(),
                }
            })
            .collect();

        topics
            .entry(topic_name.clone())
            .or_insert_with(Vec::new)
            .push(ProducePartitionData {
                      partition_id: partition,
                      message_set: MessageSet { messages: messages },
                  });
    }

    ProduceRequest {
        header: RequestHeader {
            api_key: ApiKeys::Produce.key(),
            api_version: inner.produce_api_version,
            correlation_id: 0,
            client_id: inner.client_id.clone(),
        },
        required_acks: key.required_acks,
        ack_timeout: key.ack_timeout as i32,
        message_version: inner.message_version,
        compression: key.compression,
        topics: topics
            .into_iter()
            .map(|(topic_name, partitions)| {
                     ProduceTopicData {
                         topic_name: topic_name,
                         partitions: partitions,
                     }
                 })
            .collect(),
    }
}

impl SenderInner {
    fn resolve(&self, task: ProduceTask, outcome: ProduceOutcome) {
        self.counters.record_resolved();
        task.complete(outcome);
    }

    /// Join the response onto the batch by `(topic, partition)` and resolve
    /// every record slot exactly once, in enqueue order.
    fn complete_batch(&self,
                      mut tasks_by_tp: HashMap<(String, PartitionId), Vec<ProduceTask>>,
                      result: ::std::result::Result<Option<KafkaResponse>, Error>) {
        match result {
            Err(err) => {
                warn!("produce request failed, {}", err);

                for (_, tasks) in tasks_by_tp {
                    for task in tasks {
                        self.resolve(task, Err(errors::duplicate(&err)));
                    }
                }
            }
            Ok(None) => {
                // fire-and-forget: the broker never answers
                for ((topic_name, partition), tasks) in tasks_by_tp {
                    for task in tasks {
                        self.resolve(task,
                                     Ok(Some(RecordMetadata {
                                                 topic_name: topic_name.clone(),
                                                 partition: partition,
                                                 offset: -1,
                                                 error: None,
                                                 timestamp: None,
                                             })));
                    }
                }
            }
            Ok(Some(KafkaResponse::Produce(response))) => {
                for topic in response.topics {
                    for status in topic.partitions {
                        match tasks_by_tp.remove(&(topic.topic_name.clone(),
                                                   status.partition_id)) {
                            Some(tasks) => {
                                let error = match KafkaCode::from(status.error_code) {
                                    KafkaCode::None => None,
                                    code => Some(code),
                                };

                                for (i, task) in tasks.into_iter().enumerate() {
                                    self.resolve(task,
                                                 Ok(Some(RecordMetadata {
                                                     topic_name: topic.topic_name.clone(),
                                                     partition: status.partition_id,
                                                     offset: status.base_offset + i as Offset,
                                                     error: error,
                                                     timestamp: status.log_append_time,
                                                 })));
                                }
                            }
                            None => {
                                error!("unexpected {}#{} in produce response",
                                       topic.topic_name,
                                       status.partition_id)
                            }
                        }
                    }
                }

                for ((topic_name, partition), tasks) in tasks_by_tp {
                    warn!("no produce response for {}#{}", topic_name, partition);

                    for task in tasks {
                        self.resolve(task, Ok(None));
                    }
                }
            }
            Ok(Some(response)) => {
                let api_key = response.api_key();

                warn!("unexpected {:?} response to produce request", api_key);

                for (_, tasks) in tasks_by_tp {
                    for task in tasks {
                        self.resolve(task,
                                     Err(ErrorKind::UnexpectedResponse(api_key.key()).into()));
                    }
                }
            }
        }
    }
}
