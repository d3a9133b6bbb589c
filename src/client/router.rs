use std::borrow::Cow;
use std::collections::HashMap;
use std::mem;
use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;

use futures::future::{self, Future};
use futures::unsync::oneshot;
use rand::{self, Rng};
use tokio_core::reactor::Handle;
use tokio_timer::Timer;

use client::{CachedGroup, CachedTopic, ClientConfig, DefaultPartitionSelector, Metrics,
             PartitionSelector, StaticBoxFuture, ToStaticBoxFuture, with_deadline};
use client::metadata::BrokerRef;
use errors::{self, Error, ErrorKind, Result};
use network::{Endpoint, KafkaConnection, KafkaConnector, TopicPartition};
use protocol::{ApiKeys, BrokerMetadata, FetchOffset, KafkaCode, KafkaRequest, KafkaResponse,
               ListOffsetsPartition, ListOffsetsRequest, ListOffsetsTopic, MetadataResponse,
               Offset, PartitionId, RequestHeader, TopicMetadata};

/// The transient product of a route lookup: where one request for this
/// topic/partition should go right now. The connection is pooled, the route
/// itself is not cached.
#[derive(Clone)]
pub struct Route {
    pub topic_name: String,
    pub partition: PartitionId,
    pub connection: KafkaConnection,
}

/// A retrieved offset for a particular partition in the context of an already known topic.
#[derive(Clone, Debug)]
pub struct PartitionOffset {
    pub partition: PartitionId,
    pub offset: Offset,
}

pub type RefreshMetadata = StaticBoxFuture<()>;

pub type RouteFuture = StaticBoxFuture<Route>;

pub type GroupRouteFuture = StaticBoxFuture<KafkaConnection>;

pub type FetchOffsets = StaticBoxFuture<HashMap<String, Vec<PartitionOffset>>>;

/// The topology cache: topics, partitions and groups mapped to broker
/// leaders, and the pool of per-broker connections. Refreshed lazily on
/// miss or on stale-metadata errors, never in the background.
#[derive(Clone)]
pub struct BrokerRouter {
    inner: Rc<RouterInner>,
}

struct RouterInner {
    config: ClientConfig,
    handle: Handle,
    timer: Timer,
    connector: KafkaConnector,
    selector: ::std::cell::RefCell<Box<PartitionSelector>>,
    metrics: Option<Rc<Metrics>>,
    state: ::std::cell::RefCell<RouterState>,
}

struct RouterState {
    conns_by_endpoint: HashMap<Endpoint, KafkaConnection>,
    conns_by_broker: HashMap<BrokerRef, KafkaConnection>,
    topics: Rc<HashMap<String, CachedTopic>>,
    groups: Rc<HashMap<String, CachedGroup>>,
    refresh: RefreshStatus,
}

/// The router-wide refresh lock. Metadata updates are rare and short;
/// serializing them keeps the two connection views consistent.
enum RefreshStatus {
    Idle,
    Busy(Vec<oneshot::Sender<::std::result::Result<(), Rc<Error>>>>),
}

enum RefreshWork {
    Topics(Vec<String>),
    Group(String),
}

impl BrokerRouter {
    pub fn from_hosts<I>(hosts: I, handle: Handle) -> Result<BrokerRouter>
        where I: IntoIterator<Item = String>
    {
        BrokerRouter::from_config(ClientConfig::from_hosts(hosts), handle)
    }

    /// Resolve the seed hosts and build one connection per distinct
    /// endpoint; unresolvable seeds are skipped with a warning, and
    /// construction fails only when none resolved.
    pub fn from_config(config: ClientConfig, handle: Handle) -> Result<BrokerRouter> {
        trace!("create router from config: {:?}", config);

        let metrics = if config.metrics {
            Some(Rc::new(Metrics::new()?))
        } else {
            None
        };

        let connector = KafkaConnector::new(handle.clone(),
                                            config.max_frame_size,
                                            config.request_timeout(),
                                            metrics.clone());

        let mut conns_by_endpoint = HashMap::new();

        for host in &config.hosts {
            match connector.resolve(host) {
                Ok(endpoint) => {
                    if !conns_by_endpoint.contains_key(&endpoint) {
                        let conn = connector.connect(endpoint.clone());

                        conns_by_endpoint.insert(endpoint, conn);
                    }
                }
                Err(err) => warn!("skipping seed host `{}`, {}", host, err),
            }
        }

        if conns_by_endpoint.is_empty() {
            bail!(ErrorKind::ConnectionError("no resolvable seed hosts".to_owned()));
        }

        let timer = config.timer();

        Ok(BrokerRouter {
               inner: Rc::new(RouterInner {
                                  config: config,
                                  handle: handle,
                                  timer: timer,
                                  connector: connector,
                                  selector:
                                      ::std::cell::RefCell::new(
                                          Box::new(DefaultPartitionSelector::new())),
                                  metrics: metrics,
                                  state: ::std::cell::RefCell::new(RouterState {
                                      conns_by_endpoint: conns_by_endpoint,
                                      conns_by_broker: HashMap::new(),
                                      topics: Rc::new(HashMap::new()),
                                      groups: Rc::new(HashMap::new()),
                                      refresh: RefreshStatus::Idle,
                                  }),
                              }),
           })
    }

    /// Swap in a different partition selection strategy.
    pub fn with_partition_selector(self, selector: Box<PartitionSelector>) -> Self {
        *self.inner.selector.borrow_mut() = selector;
        self
    }

    pub fn handle(&self) -> &Handle {
        &self.inner.handle
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn timer(&self) -> Timer {
        self.inner.timer.clone()
    }

    pub fn metrics(&self) -> Option<Rc<Metrics>> {
        self.inner.metrics.clone()
    }

    /// Route a request for an explicit partition through the cached topology.
    pub fn topic_route(&self, topic_name: &str, partition: PartitionId) -> Result<Route> {
        let topics = self.inner.state.borrow().topics.clone();

        let cached = topics
            .get(topic_name)
            .ok_or_else(|| no_route(topic_name, Some(partition)))?;

        let meta = cached
            .metadata
            .partition(partition)
            .ok_or_else(|| no_route(topic_name, Some(partition)))?;

        if meta.leader < 0 {
            bail!(no_route(topic_name, Some(partition)));
        }

        let connection = self.inner
            .connection_for_broker(BrokerRef(meta.leader))
            .ok_or_else(|| no_route(topic_name, Some(partition)))?;

        Ok(Route {
               topic_name: topic_name.to_owned(),
               partition: partition,
               connection: connection,
           })
    }

    /// Route by record key; the injected selector picks the partition.
    pub fn topic_route_for_key(&self, topic_name: &str, key: Option<&[u8]>) -> Result<Route> {
        let partition = {
            let topics = self.inner.state.borrow().topics.clone();

            let cached = topics
                .get(topic_name)
                .ok_or_else(|| no_route(topic_name, None))?;

            self.inner.selector.borrow_mut().select(&cached.metadata, key)?
        };

        self.topic_route(topic_name, partition)
    }

    /// The connection to a group's coordinator, from the group cache.
    pub fn group_route(&self, group_id: &str) -> Result<KafkaConnection> {
        let groups = self.inner.state.borrow().groups.clone();

        let cached = groups.get(group_id).ok_or_else(|| no_route(group_id, None))?;

        self.inner
            .connection_for_broker(cached.coordinator)
            .ok_or_else(|| no_route(group_id, None).into())
    }

    /// Cache-miss path: refresh the topic's metadata, then retry the lookup
    /// once. Still-missing entries fail with the cached-metadata error.
    pub fn topic_route_async(&self,
                             topic_name: String,
                             partition: Option<PartitionId>,
                             key: Option<Bytes>)
                             -> RouteFuture {
        match self.lookup(&topic_name, partition, key.as_ref()) {
            Ok(route) => StaticBoxFuture::ok(route),
            Err(ref err) if is_cache_miss(err) => {
                let router = self.clone();

                self.refresh_topic_metadata(vec![topic_name.clone()])
                    .and_then(move |_| router.lookup(&topic_name, partition, key.as_ref()))
                    .static_boxed()
            }
            Err(err) => StaticBoxFuture::err(err),
        }
    }

    /// Cache-miss path for group coordinators.
    pub fn group_route_async(&self, group_id: String) -> GroupRouteFuture {
        match self.group_route(&group_id) {
            Ok(conn) => StaticBoxFuture::ok(conn),
            Err(ref err) if is_cache_miss(err) => {
                let router = self.clone();

                self.refresh_group(group_id.clone())
                    .and_then(move |_| router.group_route(&group_id))
                    .static_boxed()
            }
            Err(err) => StaticBoxFuture::err(err),
        }
    }

    fn lookup(&self,
              topic_name: &str,
              partition: Option<PartitionId>,
              key: Option<&Bytes>)
              -> Result<Route> {
        match partition {
            Some(partition) => self.topic_route(topic_name, partition),
            None => self.topic_route_for_key(topic_name, key.map(|key| &key[..])),
        }
    }

    /// Refresh cached metadata for the named topics (all topics when empty),
    /// serialized on the router-wide refresh lock; concurrent callers for
    /// the same window share one wire request.
    pub fn refresh_topic_metadata(&self, topic_names: Vec<String>) -> RefreshMetadata {
        with_refresh_lock(Rc::clone(&self.inner), RefreshWork::Topics(topic_names))
    }

    /// Discover and cache the coordinator of a consumer group.
    pub fn refresh_group(&self, group_id: String) -> RefreshMetadata {
        with_refresh_lock(Rc::clone(&self.inner), RefreshWork::Group(group_id))
    }

    /// Read the log bounds of the given partitions, one ListOffsets request
    /// per leader carrying that leader's complete partition list.
    pub fn fetch_offsets(&self,
                         partitions: Vec<TopicPartition<'static>>,
                         position: FetchOffset)
                         -> FetchOffsets {
        let mut by_endpoint: HashMap<Endpoint,
                                     (KafkaConnection, HashMap<String, Vec<PartitionId>>)> =
            HashMap::new();

        for tp in partitions {
            match self.topic_route(&tp.topic_name, tp.partition) {
                Ok(route) => {
                    let endpoint = route.connection.endpoint().clone();

                    by_endpoint
                        .entry(endpoint)
                        .or_insert_with(|| (route.connection.clone(), HashMap::new()))
                        .1
                        .entry(route.topic_name)
                        .or_insert_with(Vec::new)
                        .push(route.partition);
                }
                Err(err) => return StaticBoxFuture::err(err),
            }
        }

        let client_id = self.inner.client_id();

        let requests: Vec<_> = by_endpoint
            .into_iter()
            .map(|(endpoint, (conn, topics))| {
                let request =
                    KafkaRequest::ListOffsets(ListOffsetsRequest {
                        header: RequestHeader {
                            api_key: ApiKeys::ListOffsets.key(),
                            api_version: 0,
                            correlation_id: 0,
                            client_id: client_id.clone(),
                        },
                        replica_id: ListOffsetsRequest::replica_id(),
                        topics: topics
                            .into_iter()
                            .map(|(topic_name, partitions)| {
                                ListOffsetsTopic {
                                    topic_name: topic_name,
                                    partitions: partitions
                                        .into_iter()
                                        .map(|id| ListOffsetsPartition::new(id, position))
                                        .collect(),
                                }
                            })
                            .collect(),
                    });

                let endpoint = endpoint.uri().to_owned();

                conn.send(request)
                    .and_then(move |response| match response {
                                  Some(KafkaResponse::ListOffsets(res)) => Ok(res),
                                  Some(res) => {
                                      bail!(ErrorKind::UnexpectedResponse(res.api_key().key()))
                                  }
                                  None => {
                                      bail!(ErrorKind::ConnectionError(
                                          format!("no offsets response from {}", endpoint)))
                                  }
                              })
            })
            .collect();

        future::join_all(requests)
            .map(|responses| {
                let mut offsets: HashMap<String, Vec<PartitionOffset>> = HashMap::new();

                for res in responses {
                    for topic in res.topics {
                        let entries = offsets
                            .entry(topic.topic_name.clone())
                            .or_insert_with(Vec::new);

                        for partition in topic.partitions {
                            if partition.error() == KafkaCode::None {
                                match partition.offsets.first() {
                                    Some(&offset) => {
                                        entries.push(PartitionOffset {
                                                         partition: partition.partition_id,
                                                         offset: offset,
                                                     })
                                    }
                                    None => {
                                        warn!("empty offsets for {}#{}",
                                              topic.topic_name,
                                              partition.partition_id)
                                    }
                                }
                            } else {
                                warn!("fail to fetch offsets of {}#{}, {:?}",
                                      topic.topic_name,
                                      partition.partition_id,
                                      partition.error());
                            }
                        }
                    }
                }

                offsets
            })
            .static_boxed()
    }

    /// Partition ids of a cached topic, sorted; `None` on a cache miss.
    pub fn topic_partitions(&self, topic_name: &str) -> Option<Vec<PartitionId>> {
        let topics = self.inner.state.borrow().topics.clone();

        topics
            .get(topic_name)
            .map(|cached| {
                     cached
                         .metadata
                         .sorted_partitions()
                         .iter()
                         .map(|partition| partition.partition_id)
                         .collect()
                 })
    }

    /// Close every pooled connection and drop the caches.
    pub fn shutdown(&self) {
        debug!("shutting down router");

        let mut state = self.inner.state.borrow_mut();

        for (_, conn) in state.conns_by_endpoint.drain() {
            conn.shutdown();
        }

        state.conns_by_broker.clear();
        state.topics = Rc::new(HashMap::new());
        state.groups = Rc::new(HashMap::new());
    }
}

fn no_route(topic_name: &str, partition: Option<PartitionId>) -> Error {
    ErrorKind::CachedMetadata(topic_name.to_owned(), partition).into()
}

fn is_cache_miss(err: &Error) -> bool {
    match *err.kind() {
        ErrorKind::CachedMetadata(..) => true,
        _ => false,
    }
}

impl RouterInner {
    fn client_id(&self) -> Option<Cow<'static, str>> {
        self.config.client_id.clone().map(Cow::from)
    }

    /// The pooled connection for a broker, transparently replacing one whose
    /// socket already failed; `None` when the broker id is unmapped.
    fn connection_for_broker(&self, broker: BrokerRef) -> Option<KafkaConnection> {
        let mut state = self.state.borrow_mut();

        let (endpoint, closed) = match state.conns_by_broker.get(&broker) {
            Some(conn) => (conn.endpoint().clone(), conn.is_closed()),
            None => return None,
        };

        if !closed {
            return state.conns_by_broker.get(&broker).cloned();
        }

        debug!("reconnecting {} at {}", broker, endpoint);

        let conn = self.connector.connect(endpoint.clone());

        state.conns_by_endpoint.insert(endpoint, conn.clone());
        state.conns_by_broker.insert(broker, conn.clone());

        Some(conn)
    }

    /// Every pooled connection, failed ones replaced in place, in random
    /// order for metadata attempts.
    fn candidate_connections(&self) -> Vec<KafkaConnection> {
        let mut state = self.state.borrow_mut();

        let endpoints: Vec<Endpoint> = state.conns_by_endpoint.keys().cloned().collect();
        let mut conns = Vec::with_capacity(endpoints.len());

        for endpoint in endpoints {
            let (old_id, closed) = {
                let conn = &state.conns_by_endpoint[&endpoint];

                (conn.id(), conn.is_closed())
            };

            if closed {
                debug!("reconnecting {}", endpoint);

                let conn = self.connector.connect(endpoint.clone());

                state.conns_by_endpoint.insert(endpoint, conn.clone());

                let brokers: Vec<BrokerRef> = state
                    .conns_by_broker
                    .iter()
                    .filter(|&(_, c)| c.id() == old_id)
                    .map(|(broker, _)| *broker)
                    .collect();

                for broker in brokers {
                    state.conns_by_broker.insert(broker, conn.clone());
                }

                conns.push(conn);
            } else {
                conns.push(state.conns_by_endpoint[&endpoint].clone());
            }
        }

        rand::thread_rng().shuffle(&mut conns);

        conns
    }

    fn topics_fresh(&self, topic_names: &[String]) -> bool {
        if topic_names.is_empty() {
            return false;
        }

        let expiration = self.config.cache_expiration();
        let topics = self.state.borrow().topics.clone();

        topic_names
            .iter()
            .all(|name| {
                     topics
                         .get(name)
                         .map(|cached| cached.is_fresh(expiration))
                         .unwrap_or(false)
                 })
    }

    fn group_fresh(&self, group_id: &str) -> bool {
        let expiration = self.config.cache_expiration();
        let groups = self.state.borrow().groups.clone();

        groups
            .get(group_id)
            .map(|cached| cached.is_fresh(expiration))
            .unwrap_or(false)
    }

    /// Apply a validated metadata response: update the connection pool, swap
    /// the topic cache, and raise the leader-election condition when any
    /// partition has no leader.
    fn apply_metadata(&self, response: MetadataResponse) -> Result<()> {
        for broker in &response.brokers {
            if broker.host.is_empty() || broker.port <= 0 {
                bail!(ErrorKind::CodecError("broker metadata with invalid host or port"));
            }
        }

        if let Some(code) = response
               .topics
               .iter()
               .map(|topic| topic.error())
               .find(|code| *code != KafkaCode::None) {
            bail!(ErrorKind::KafkaError(code));
        }

        self.update_connections(&response.brokers);

        let electing = self.update_topic_cache(response.topics);

        match electing.split_first() {
            None => Ok(()),
            Some((&(ref topic_name, partition), rest)) => {
                let mut err: Error =
                    ErrorKind::CachedMetadata(topic_name.clone(), Some(partition)).into();

                for &(ref topic_name, partition) in rest {
                    err = Error::with_chain(err,
                                            ErrorKind::CachedMetadata(topic_name.clone(),
                                                                      Some(partition)));
                }

                Err(err)
            }
        }
    }

    /// For each broker in the response: reuse the connection when the
    /// endpoint is unchanged, otherwise open a new one and dispose of the
    /// old only after both maps are swapped.
    fn update_connections(&self, brokers: &[BrokerMetadata]) {
        let mut state = self.state.borrow_mut();

        for broker in brokers {
            let endpoint = match Endpoint::from_host_port(&broker.host, broker.port as u16) {
                Ok(endpoint) => endpoint,
                Err(err) => {
                    warn!("skipping broker #{}, {}", broker.node_id, err);
                    continue;
                }
            };

            let broker_ref = BrokerRef(broker.node_id);

            let replaced = match state.conns_by_broker.get(&broker_ref) {
                Some(conn) if *conn.endpoint() == endpoint => continue,
                Some(conn) => {
                    info!("{} moved from {} to {}",
                          broker_ref,
                          conn.endpoint(),
                          endpoint);

                    Some(conn.clone())
                }
                None => None,
            };

            let conn = match state.conns_by_endpoint.get(&endpoint).cloned() {
                Some(conn) => conn,
                None => {
                    let conn = self.connector.connect(endpoint.clone());

                    state.conns_by_endpoint.insert(endpoint.clone(), conn.clone());

                    conn
                }
            };

            state.conns_by_broker.insert(broker_ref, conn);

            if let Some(old) = replaced {
                let old_endpoint = old.endpoint().clone();
                let still_mapped = state
                    .conns_by_broker
                    .values()
                    .any(|conn| conn.id() == old.id());

                if !still_mapped {
                    if state
                           .conns_by_endpoint
                           .get(&old_endpoint)
                           .map(|conn| conn.id()) == Some(old.id()) {
                        state.conns_by_endpoint.remove(&old_endpoint);
                    }

                    old.shutdown();
                }
            }
        }
    }

    /// Swap the topic cache. Topics with a partition mid-election keep their
    /// previous entry; a first sighting is cached as-is so its healthy
    /// partitions stay routable.
    fn update_topic_cache(&self, topics: Vec<TopicMetadata>) -> Vec<(String, PartitionId)> {
        let mut state = self.state.borrow_mut();
        let mut cache: HashMap<String, CachedTopic> = (*state.topics).clone();
        let mut electing = Vec::new();

        for topic in topics {
            let stale: Vec<PartitionId> = topic
                .partitions
                .iter()
                .filter(|partition| partition.leader < 0)
                .map(|partition| partition.partition_id)
                .collect();

            if stale.is_empty() {
                cache.insert(topic.topic_name.clone(), CachedTopic::new(topic));
            } else {
                warn!("leader election in progress for topic `{}`, partitions {:?}",
                      topic.topic_name,
                      stale);

                for partition in &stale {
                    electing.push((topic.topic_name.clone(), *partition));
                }

                if !cache.contains_key(&topic.topic_name) {
                    cache.insert(topic.topic_name.clone(), CachedTopic::new(topic));
                }
            }
        }

        state.topics = Rc::new(cache);

        electing
    }

    /// Record a discovered group coordinator, treating it as a broker
    /// sighting for the connection pool.
    fn apply_group(&self, group_id: &str, response: ::protocol::GroupCoordinatorResponse)
                   -> Result<()> {
        match response.error() {
            KafkaCode::None => {}
            code => bail!(ErrorKind::KafkaError(code)),
        }

        let broker = BrokerMetadata {
            node_id: response.coordinator_id,
            host: response.coordinator_host.clone(),
            port: response.coordinator_port,
        };

        if broker.host.is_empty() || broker.port <= 0 {
            bail!(ErrorKind::CodecError("coordinator metadata with invalid host or port"));
        }

        self.update_connections(&[broker]);

        let mut state = self.state.borrow_mut();
        let mut groups = (*state.groups).clone();

        groups.insert(group_id.to_owned(),
                      CachedGroup::new(BrokerRef(response.coordinator_id)));

        state.groups = Rc::new(groups);

        Ok(())
    }
}

/// Acquire the refresh lock or wait behind the holder. Waiters re-check
/// their cache once notified, so concurrent misses for one topic share a
/// single wire request.
fn with_refresh_lock(inner: Rc<RouterInner>, work: RefreshWork) -> RefreshMetadata {
    let waiter = {
        let mut state = inner.state.borrow_mut();

        match state.refresh {
            RefreshStatus::Busy(ref mut waiters) => {
                let (tx, rx) = oneshot::channel();

                waiters.push(tx);

                Some(rx)
            }
            RefreshStatus::Idle => {
                state.refresh = RefreshStatus::Busy(Vec::new());

                None
            }
        }
    };

    match waiter {
        Some(rx) => {
            trace!("waiting behind an in-progress refresh");

            rx.then(move |result| match result {
                        Ok(Ok(())) => with_refresh_lock(inner, work),
                        Ok(Err(err)) => StaticBoxFuture::err(errors::duplicate(&err)),
                        Err(_canceled) => {
                            StaticBoxFuture::err(ErrorKind::Canceled("refresh canceled").into())
                        }
                    })
                .static_boxed()
        }
        None => {
            let done = Rc::clone(&inner);

            run_refresh(inner, work)
                .then(move |result| {
                    let waiters = {
                        let mut state = done.state.borrow_mut();

                        match mem::replace(&mut state.refresh, RefreshStatus::Idle) {
                            RefreshStatus::Busy(waiters) => waiters,
                            RefreshStatus::Idle => Vec::new(),
                        }
                    };

                    match result {
                        Ok(()) => {
                            for waiter in waiters {
                                let _ = waiter.send(Ok(()));
                            }

                            Ok(())
                        }
                        Err(err) => {
                            let err = Rc::new(err);

                            for waiter in waiters {
                                let _ = waiter.send(Err(Rc::clone(&err)));
                            }

                            Err(errors::duplicate(&err))
                        }
                    }
                })
                .static_boxed()
        }
    }
}

fn run_refresh(inner: Rc<RouterInner>, work: RefreshWork) -> RefreshMetadata {
    match work {
        RefreshWork::Topics(topic_names) => {
            // entries fetched while we queued for the lock count as a hit
            if inner.topics_fresh(&topic_names) {
                trace!("requested topics are fresh: {:?}", topic_names);

                return StaticBoxFuture::ok(());
            }

            let delays = inner.config.refresh_retry.delays();

            fetch_topics_attempt(inner, Rc::new(topic_names), delays)
        }
        RefreshWork::Group(group_id) => {
            if inner.group_fresh(&group_id) {
                return StaticBoxFuture::ok(());
            }

            let delays = inner.config.refresh_retry.delays();

            fetch_group_attempt(inner, group_id, delays)
        }
    }
}

fn retryable_refresh_failure(err: &Error) -> bool {
    match *err.kind() {
        ErrorKind::KafkaError(code) => errors::is_retryable(code),
        ErrorKind::ConnectionError(_) |
        ErrorKind::RequestTimeout(_) |
        ErrorKind::IoError(_) => true,
        _ => false,
    }
}

fn fetch_topics_attempt(inner: Rc<RouterInner>,
                        topic_names: Rc<Vec<String>>,
                        mut delays: Box<Iterator<Item = Duration>>)
                        -> RefreshMetadata {
    let conns = inner.candidate_connections();
    let apply = Rc::clone(&inner);
    let retry = Rc::clone(&inner);
    let retry_topics = Rc::clone(&topic_names);

    try_metadata(Rc::clone(&inner), conns, topic_names, Vec::new())
        .and_then(move |response| apply.apply_metadata(response))
        .or_else(move |err| {
            if retryable_refresh_failure(&err) {
                if let Some(delay) = delays.next() {
                    debug!("retrying metadata fetch in {:?}, {}", delay, err);

                    let timer = retry.timer.clone();

                    return timer
                               .sleep(delay)
                               .map_err(|err| {
                                            Error::from(ErrorKind::Msg(format!("timer error, {}",
                                                                               err)))
                                        })
                               .and_then(move |_| {
                                             fetch_topics_attempt(retry, retry_topics, delays)
                                         })
                               .static_boxed();
                }
            }

            StaticBoxFuture::err(err)
        })
        .static_boxed()
}

/// One metadata round-trip per candidate connection, in turn; the first
/// success wins and the last failure aggregates the attempts.
fn try_metadata(inner: Rc<RouterInner>,
                mut conns: Vec<KafkaConnection>,
                topic_names: Rc<Vec<String>>,
                mut failures: Vec<String>)
                -> StaticBoxFuture<MetadataResponse> {
    let conn = match conns.pop() {
        Some(conn) => conn,
        None => {
            return StaticBoxFuture::err(ErrorKind::ConnectionError(
                format!("metadata refresh failed on every broker: [{}]", failures.join("; ")))
                .into());
        }
    };

    let request = KafkaRequest::fetch_metadata(0, 0, inner.client_id(), &topic_names[..]);
    let endpoint = conn.endpoint().uri().to_owned();

    debug!("fetching metadata for {:?} from {}", topic_names, endpoint);

    let response = conn.send(request)
        .and_then(|response| match response {
                      Some(KafkaResponse::Metadata(res)) => Ok(res),
                      Some(res) => bail!(ErrorKind::UnexpectedResponse(res.api_key().key())),
                      None => bail!(ErrorKind::CodecError("missing metadata response")),
                  });

    let response = with_deadline(response,
                                 inner.config.refresh_timeout(),
                                 &inner.handle,
                                 "metadata refresh");

    response
        .or_else(move |err| {
                     warn!("metadata request to {} failed, {}", endpoint, err);

                     failures.push(format!("{}: {}", endpoint, err));

                     try_metadata(inner, conns, topic_names, failures)
                 })
        .static_boxed()
}

fn fetch_group_attempt(inner: Rc<RouterInner>,
                       group_id: String,
                       mut delays: Box<Iterator<Item = Duration>>)
                       -> RefreshMetadata {
    let conns = inner.candidate_connections();
    let apply = Rc::clone(&inner);
    let apply_group_id = group_id.clone();
    let retry = Rc::clone(&inner);
    let retry_group_id = group_id.clone();

    try_group_coordinator(Rc::clone(&inner), conns, group_id, Vec::new())
        .and_then(move |response| apply.apply_group(&apply_group_id, response))
        .or_else(move |err| {
            if retryable_refresh_failure(&err) {
                if let Some(delay) = delays.next() {
                    debug!("retrying group discovery in {:?}, {}", delay, err);

                    let timer = retry.timer.clone();

                    return timer
                               .sleep(delay)
                               .map_err(|err| {
                                            Error::from(ErrorKind::Msg(format!("timer error, {}",
                                                                               err)))
                                        })
                               .and_then(move |_| {
                                             fetch_group_attempt(retry, retry_group_id, delays)
                                         })
                               .static_boxed();
                }
            }

            StaticBoxFuture::err(err)
        })
        .static_boxed()
}

fn try_group_coordinator(inner: Rc<RouterInner>,
                         mut conns: Vec<KafkaConnection>,
                         group_id: String,
                         mut failures: Vec<String>)
                         -> StaticBoxFuture<::protocol::GroupCoordinatorResponse> {
    let conn = match conns.pop() {
        Some(conn) => conn,
        None => {
            return StaticBoxFuture::err(ErrorKind::ConnectionError(
                format!("group discovery failed on every broker: [{}]", failures.join("; ")))
                .into());
        }
    };

    let request = KafkaRequest::group_coordinator(0,
                                                  0,
                                                  inner.client_id(),
                                                  Cow::from(group_id.clone()));
    let endpoint = conn.endpoint().uri().to_owned();

    debug!("discovering coordinator of group `{}` via {}", group_id, endpoint);

    let response = conn.send(request)
        .and_then(|response| match response {
                      Some(KafkaResponse::GroupCoordinator(res)) => Ok(res),
                      Some(res) => bail!(ErrorKind::UnexpectedResponse(res.api_key().key())),
                      None => bail!(ErrorKind::CodecError("missing coordinator response")),
                  });

    let response = with_deadline(response,
                                 inner.config.refresh_timeout(),
                                 &inner.handle,
                                 "group discovery");

    response
        .or_else(move |err| {
                     warn!("coordinator request to {} failed, {}", endpoint, err);

                     failures.push(format!("{}: {}", endpoint, err));

                     try_group_coordinator(inner, conns, group_id, failures)
                 })
        .static_boxed()
}
