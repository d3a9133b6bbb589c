use std::borrow::Cow;
use std::cmp;
use std::rc::Rc;

use bytes::Bytes;

use futures::future::{self, Future, Loop};
use futures::unsync::mpsc;
use futures::{Sink, stream};
use tokio_core::reactor::Handle;
use tokio_timer::Timer;

use client::{BrokerRouter, RequestDispatcher, RetryPolicy, StaticBoxFuture, ToStaticBoxFuture};
use consumer::ConsumerConfig;
use errors::{Error, ErrorKind};
use network::TopicPartition;
use protocol::{ApiKeys, ApiVersion, CONSUMER_REPLICA_ID, FetchOffset, FetchPartition,
               FetchRequest, FetchTopic, KafkaCode, KafkaRequest, KafkaResponse, Message, Offset,
               PartitionId, RequestHeader, Timestamp};

/// One message as the application sees it.
#[derive(Clone, Debug, PartialEq)]
pub struct ConsumerRecord {
    pub topic_name: String,
    pub partition: PartitionId,
    pub offset: Offset,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
    pub timestamp: Option<Timestamp>,
}

/// Spawns and owns the per-partition fetch loops.
#[derive(Clone)]
pub struct Fetcher {
    inner: Rc<FetcherInner>,
}

struct FetcherInner {
    router: BrokerRouter,
    dispatcher: RequestDispatcher,
    config: ConsumerConfig,
    timer: Timer,
    handle: Handle,
    client_id: Option<Cow<'static, str>>,
    fetch_api_version: ApiVersion,
}

struct FetchState {
    topic_name: String,
    partition: PartitionId,
    /// `None` until resolved from the configured fallback position.
    offset: Option<Offset>,
    max_bytes: i32,
    refresh_needed: bool,
    out: Option<mpsc::Sender<ConsumerRecord>>,
}

impl Fetcher {
    pub fn new(router: BrokerRouter, config: ConsumerConfig) -> Self {
        // fetch errors drive this loop's own recovery; the dispatcher must
        // surface them instead of retrying
        let dispatcher = RequestDispatcher::with_retry_policy(router.clone(), RetryPolicy::None);
        let timer = router.timer();
        let handle = router.handle().clone();
        let client_id = router.config().client_id.clone().map(Cow::from);
        let fetch_api_version = router.config().broker_version_fallback.fetch_api_version();

        Fetcher {
            inner: Rc::new(FetcherInner {
                               router: router,
                               dispatcher: dispatcher,
                               config: config,
                               timer: timer,
                               handle: handle,
                               client_id: client_id,
                               fetch_api_version: fetch_api_version,
                           }),
        }
    }

    /// Start the long-running poll loop for one partition, delivering into
    /// the bounded queue in offset order. The loop winds down when the
    /// receiving side is dropped.
    pub fn spawn_partition(&self,
                           topic_name: String,
                           partition: PartitionId,
                           out: mpsc::Sender<ConsumerRecord>) {
        debug!("starting fetch loop for {}#{}", topic_name, partition);

        let inner = Rc::clone(&self.inner);
        let state = FetchState {
            topic_name: topic_name,
            partition: partition,
            offset: None,
            max_bytes: self.inner.config.fetch_buffer_size,
            refresh_needed: false,
            out: Some(out),
        };

        let work = future::loop_fn(state, move |state| step(Rc::clone(&inner), state));

        self.inner
            .handle
            .spawn(work.then(|result| {
                                 if let Err(()) = result {
                                     warn!("fetch loop aborted");
                                 }

                                 Ok(())
                             }));
    }
}

fn step(inner: Rc<FetcherInner>, mut state: FetchState) -> StaticBoxFuture<Loop<(), FetchState>, ()> {
    let refresh: StaticBoxFuture<()> = if state.refresh_needed {
        state.refresh_needed = false;

        inner
            .router
            .refresh_topic_metadata(vec![state.topic_name.clone()])
            .then(|result| {
                      if let Err(err) = result {
                          warn!("metadata refresh failed, {}", err);
                      }

                      Ok(())
                  })
            .static_boxed()
    } else {
        StaticBoxFuture::ok(())
    };

    let next = Rc::clone(&inner);

    refresh
        .then(move |_| match state.offset {
                  None => initialize_offset(next, state),
                  Some(offset) => fetch_once(next, state, offset),
              })
        .static_boxed()
}

/// Resolve the starting offset from the fallback position (earliest or
/// latest) before the first fetch.
fn initialize_offset(inner: Rc<FetcherInner>,
                     mut state: FetchState)
                     -> StaticBoxFuture<Loop<(), FetchState>, ()> {
    let tp = TopicPartition::new(state.topic_name.clone(), state.partition);
    let position = inner.config.fallback_position();
    let next = Rc::clone(&inner);

    inner
        .router
        .fetch_offsets(vec![tp], position)
        .then(move |result| match result {
            Ok(offsets) => {
                let found = offsets
                    .get(&state.topic_name)
                    .and_then(|partitions| {
                                  partitions
                                      .iter()
                                      .find(|po| po.partition == state.partition)
                                  })
                    .map(|po| po.offset);

                match found {
                    Some(offset) => {
                        debug!("{}#{} starts at offset {}",
                               state.topic_name,
                               state.partition,
                               offset);

                        state.offset = Some(offset);

                        StaticBoxFuture::ok(Loop::Continue(state))
                    }
                    None => {
                        warn!("no starting offset for {}#{}",
                              state.topic_name,
                              state.partition);

                        state.refresh_needed = true;

                        backoff_continue(next, state)
                    }
                }
            }
            Err(err) => {
                warn!("fail to resolve starting offset, {}", err);

                state.refresh_needed = err.is_recoverable_by_refresh();

                backoff_continue(next, state)
            }
        })
        .static_boxed()
}

fn fetch_once(inner: Rc<FetcherInner>,
              state: FetchState,
              offset: Offset)
              -> StaticBoxFuture<Loop<(), FetchState>, ()> {
    let request = KafkaRequest::Fetch(FetchRequest {
        header: RequestHeader {
            api_key: ApiKeys::Fetch.key(),
            api_version: inner.fetch_api_version,
            correlation_id: 0,
            client_id: inner.client_id.clone(),
        },
        replica_id: CONSUMER_REPLICA_ID,
        max_wait_time: inner.config.max_wait_time_for_min_bytes as i32,
        min_bytes: inner.config.min_bytes,
        topics: vec![FetchTopic {
                         topic_name: state.topic_name.clone(),
                         partitions: vec![FetchPartition {
                                              partition_id: state.partition,
                                              fetch_offset: offset,
                                              max_bytes: state.max_bytes,
                                          }],
                     }],
    });

    let next = Rc::clone(&inner);

    inner
        .dispatcher
        .send(&state.topic_name, state.partition, request)
        .then(move |result| handle_fetch_result(next, state, offset, result))
        .static_boxed()
}

fn handle_fetch_result(inner: Rc<FetcherInner>,
                       mut state: FetchState,
                       offset: Offset,
                       result: ::std::result::Result<Option<KafkaResponse>, Error>)
                       -> StaticBoxFuture<Loop<(), FetchState>, ()> {
    match result {
        Ok(Some(KafkaResponse::Fetch(response))) => {
            let data = response
                .topics
                .into_iter()
                .find(|topic| topic.topic_name == state.topic_name)
                .and_then(|topic| {
                              topic
                                  .partitions
                                  .into_iter()
                                  .find(|partition| partition.partition_id == state.partition)
                          });

            match data {
                None => {
                    warn!("fetch response missing {}#{}",
                          state.topic_name,
                          state.partition);

                    backoff_continue(inner, state)
                }
                Some(data) => {
                    match data.error() {
                        KafkaCode::None => {
                            if data.message_set.messages.is_empty() {
                                if let Some(required) = data.required_buffer {
                                    let grown =
                                        inner.config.grown_buffer(state.max_bytes, Some(required));

                                    debug!("growing fetch buffer of {}#{} from {} to {}",
                                           state.topic_name,
                                           state.partition,
                                           state.max_bytes,
                                           grown);

                                    state.max_bytes = grown;

                                    return StaticBoxFuture::ok(Loop::Continue(state));
                                }

                                backoff_continue(inner, state)
                            } else {
                                deliver(state, offset, data.message_set.messages)
                            }
                        }
                        KafkaCode::OffsetOutOfRange => fix_offset(inner, state),
                        code => {
                            debug!("fetch for {}#{} failed, {:?}",
                                   state.topic_name,
                                   state.partition,
                                   code);

                            // never advance past a broker error; refresh and
                            // re-fetch the same offset
                            state.refresh_needed = true;

                            backoff_continue(inner, state)
                        }
                    }
                }
            }
        }
        Ok(response) => {
            warn!("unexpected response to fetch: {:?}",
                  response.map(|r| r.api_key()));

            backoff_continue(inner, state)
        }
        Err(err) => {
            match *err.kind() {
                ErrorKind::OffsetOutOfRange(..) => return fix_offset(inner, state),
                ErrorKind::BufferUnderrun(required) => {
                    let grown = inner.config.grown_buffer(state.max_bytes, Some(required));

                    debug!("growing fetch buffer of {}#{} from {} to {}",
                           state.topic_name,
                           state.partition,
                           state.max_bytes,
                           grown);

                    state.max_bytes = grown;

                    return StaticBoxFuture::ok(Loop::Continue(state));
                }
                _ => {}
            }

            if err.is_recoverable_by_refresh() {
                debug!("fetch failed, flagging refresh, {}", err);

                state.refresh_needed = true;
            } else {
                warn!("transient fetch failure for {}#{}, {}",
                      state.topic_name,
                      state.partition,
                      err);
            }

            backoff_continue(inner, state)
        }
    }
}

/// Push the fetched records into the bounded queue in order, then advance
/// the offset past the last delivered message. A closed queue ends the loop.
fn deliver(mut state: FetchState,
           fetch_offset: Offset,
           messages: Vec<Message>)
           -> StaticBoxFuture<Loop<(), FetchState>, ()> {
    let records: Vec<ConsumerRecord> = messages
        .into_iter()
        .filter(|message| message.offset >= fetch_offset)
        .map(|message| {
                 ConsumerRecord {
                     topic_name: state.topic_name.clone(),
                     partition: state.partition,
                     offset: message.offset,
                     key: message.key,
                     value: message.value,
                     timestamp: message.timestamp.map(|ts| ts.value()),
                 }
             })
        .collect();

    let last_offset = match records.last() {
        Some(record) => record.offset,
        None => return StaticBoxFuture::ok(Loop::Continue(state)),
    };

    trace!("delivering {} record(s) of {}#{}, next offset {}",
           records.len(),
           state.topic_name,
           state.partition,
           last_offset + 1);

    let out = state.out.take().expect("fetch loop lost its output");

    out.send_all(stream::iter_ok::<_, mpsc::SendError<ConsumerRecord>>(records))
        .then(move |result| match result {
                  Ok((out, _)) => {
                      state.out = Some(out);
                      state.offset = Some(last_offset + 1);

                      Ok(Loop::Continue(state))
                  }
                  Err(_) => {
                      debug!("consumer output closed, stopping fetch loop");

                      Ok(Loop::Break(()))
                  }
              })
        .static_boxed()
}

/// The broker no longer holds our offset: clamp it into the partition's
/// current log bounds.
fn fix_offset(inner: Rc<FetcherInner>,
              mut state: FetchState)
              -> StaticBoxFuture<Loop<(), FetchState>, ()> {
    info!("offset {:?} of {}#{} out of range, clamping to log bounds",
          state.offset,
          state.topic_name,
          state.partition);

    let earliest = inner
        .router
        .fetch_offsets(vec![TopicPartition::new(state.topic_name.clone(), state.partition)],
                       FetchOffset::Earliest);
    let latest = inner
        .router
        .fetch_offsets(vec![TopicPartition::new(state.topic_name.clone(), state.partition)],
                       FetchOffset::Latest);

    let next = Rc::clone(&inner);

    earliest
        .join(latest)
        .then(move |result| match result {
            Ok((earliest, latest)) => {
                let earliest = single_offset(&earliest, &state);
                let latest = single_offset(&latest, &state);

                match (earliest, latest) {
                    (Some(earliest), Some(latest)) => {
                        let current = state.offset.unwrap_or(earliest);
                        let clamped = cmp::min(cmp::max(current, earliest), latest);

                        info!("{}#{} clamped to offset {} (bounds [{}, {}])",
                              state.topic_name,
                              state.partition,
                              clamped,
                              earliest,
                              latest);

                        state.offset = Some(clamped);

                        StaticBoxFuture::ok(Loop::Continue(state))
                    }
                    _ => {
                        warn!("fail to read log bounds of {}#{}",
                              state.topic_name,
                              state.partition);

                        state.refresh_needed = true;

                        backoff_continue(next, state)
                    }
                }
            }
            Err(err) => {
                warn!("fail to read log bounds, {}", err);

                state.refresh_needed = err.is_recoverable_by_refresh();

                backoff_continue(next, state)
            }
        })
        .static_boxed()
}

fn single_offset(offsets: &::std::collections::HashMap<String, Vec<::client::PartitionOffset>>,
                 state: &FetchState)
                 -> Option<Offset> {
    offsets
        .get(&state.topic_name)
        .and_then(|partitions| {
                      partitions
                          .iter()
                          .find(|po| po.partition == state.partition)
                  })
        .map(|po| po.offset)
}

fn backoff_continue(inner: Rc<FetcherInner>,
                    state: FetchState)
                    -> StaticBoxFuture<Loop<(), FetchState>, ()> {
    inner
        .timer
        .sleep(inner.config.backoff_interval())
        .then(move |_| Ok(Loop::Continue(state)))
        .static_boxed()
}
